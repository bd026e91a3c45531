//! Identity types for the session core
//!
//! Peer identifiers are 64-bit for wire efficiency. The hub assigns them
//! sequentially when a connection authenticates; they are never reused
//! within a session.

use std::fmt;

/// Peer identity - assigned by the hub, unique within a session
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl PeerId {
    pub const ZERO: PeerId = PeerId(0);

    #[inline]
    pub fn new(id: u64) -> Self {
        PeerId(id)
    }

    #[inline]
    pub fn to_bytes(self) -> [u8; 8] {
        self.0.to_le_bytes()
    }

    #[inline]
    pub fn from_bytes(bytes: [u8; 8]) -> Self {
        PeerId(u64::from_le_bytes(bytes))
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({:016x})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_roundtrip() {
        let id = PeerId::new(0xDEADBEEF_CAFEBABE);
        let bytes = id.to_bytes();
        let recovered = PeerId::from_bytes(bytes);
        assert_eq!(id, recovered);
    }

    #[test]
    fn test_peer_id_display() {
        let id = PeerId::new(0x1234);
        assert_eq!(format!("{}", id), "0000000000001234");
    }
}
