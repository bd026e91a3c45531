//! Payload codecs for each message type
//!
//! All multi-byte integers are little-endian. Strings are
//! `[len: u16][utf-8 bytes]`. Every codec is an `encode`/`decode` pair that
//! fails with `BufferTooShort` on truncation rather than panicking.

use bytes::{Buf, BufMut, BytesMut};

use parallax_core::{
    ConnectionStatus, DataKind, DisconnectReason, ParallaxError, ParallaxResult, StoreKey,
    ViewStatus, PROTOCOL_VERSION,
};

fn put_string(buf: &mut BytesMut, s: &str) -> ParallaxResult<()> {
    if s.len() > u16::MAX as usize {
        return Err(ParallaxError::MalformedFrame(format!(
            "string field too long: {} bytes",
            s.len()
        )));
    }
    buf.put_u16_le(s.len() as u16);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn get_string(cursor: &mut &[u8]) -> ParallaxResult<String> {
    if cursor.remaining() < 2 {
        return Err(ParallaxError::BufferTooShort {
            expected: 2,
            actual: cursor.remaining(),
        });
    }
    let len = cursor.get_u16_le() as usize;
    if cursor.remaining() < len {
        return Err(ParallaxError::BufferTooShort {
            expected: len,
            actual: cursor.remaining(),
        });
    }
    let mut bytes = vec![0u8; len];
    cursor.copy_to_slice(&mut bytes);
    String::from_utf8(bytes)
        .map_err(|_| ParallaxError::MalformedFrame("invalid utf-8 in string field".into()))
}

/// Handshake payload: `[version: u32][name][password]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticationPayload {
    pub version: u32,
    pub name: String,
    pub password: String,
}

impl AuthenticationPayload {
    pub fn new(name: impl Into<String>, password: impl Into<String>) -> Self {
        AuthenticationPayload {
            version: PROTOCOL_VERSION,
            name: name.into(),
            password: password.into(),
        }
    }

    pub fn encode(&self) -> ParallaxResult<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(4 + 2 + self.name.len() + 2 + self.password.len());
        buf.put_u32_le(self.version);
        put_string(&mut buf, &self.name)?;
        put_string(&mut buf, &self.password)?;
        Ok(buf.to_vec())
    }

    /// Parse and check the protocol version. The version check happens
    /// after the full parse so the error can report both sides.
    pub fn decode(buf: &[u8]) -> ParallaxResult<Self> {
        let mut cursor = buf;
        if cursor.remaining() < 4 {
            return Err(ParallaxError::BufferTooShort {
                expected: 4,
                actual: cursor.remaining(),
            });
        }
        let version = cursor.get_u32_le();
        let name = get_string(&mut cursor)?;
        let password = get_string(&mut cursor)?;

        if version != PROTOCOL_VERSION {
            return Err(ParallaxError::ProtocolVersionMismatch {
                local: PROTOCOL_VERSION,
                remote: version,
            });
        }

        Ok(AuthenticationPayload {
            version,
            name,
            password,
        })
    }
}

/// Data payload: `[timestamp: f64][kind: u8][bytes]`
///
/// The timestamp is the host's simulation time for the tick the payload
/// belongs to, prefixed before the opaque bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPayload {
    pub kind: DataKind,
    pub timestamp: f64,
    pub payload: Vec<u8>,
}

impl DataPayload {
    pub fn new(kind: DataKind, timestamp: f64, payload: Vec<u8>) -> Self {
        DataPayload {
            kind,
            timestamp,
            payload,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(9 + self.payload.len());
        buf.put_f64_le(self.timestamp);
        buf.put_u8(self.kind.to_byte());
        buf.put_slice(&self.payload);
        buf.to_vec()
    }

    pub fn decode(buf: &[u8]) -> ParallaxResult<Self> {
        if buf.len() < 9 {
            return Err(ParallaxError::BufferTooShort {
                expected: 9,
                actual: buf.len(),
            });
        }
        let mut cursor = buf;
        let timestamp = cursor.get_f64_le();
        let kind = DataKind::from_byte(cursor.get_u8())?;
        Ok(DataPayload {
            kind,
            timestamp,
            payload: cursor.to_vec(),
        })
    }

    /// Read only the kind byte, without copying the payload. The hub uses
    /// this to route frames it relays untouched.
    pub fn peek_kind(buf: &[u8]) -> ParallaxResult<DataKind> {
        if buf.len() < 9 {
            return Err(ParallaxError::BufferTooShort {
                expected: 9,
                actual: buf.len(),
            });
        }
        DataKind::from_byte(buf[8])
    }
}

/// Role assignment payload: `[status: u8]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusPayload {
    pub status: ConnectionStatus,
}

impl StatusPayload {
    pub fn encode(&self) -> Vec<u8> {
        vec![self.status.to_byte()]
    }

    pub fn decode(buf: &[u8]) -> ParallaxResult<Self> {
        if buf.is_empty() {
            return Err(ParallaxError::BufferTooShort {
                expected: 1,
                actual: 0,
            });
        }
        Ok(StatusPayload {
            status: ConnectionStatus::from_byte(buf[0])?,
        })
    }
}

/// View assignment payload: `[view: u8]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewPayload {
    pub view: ViewStatus,
}

impl ViewPayload {
    pub fn encode(&self) -> Vec<u8> {
        vec![self.view.to_byte()]
    }

    pub fn decode(buf: &[u8]) -> ParallaxResult<Self> {
        if buf.is_empty() {
            return Err(ParallaxError::BufferTooShort {
                expected: 1,
                actual: 0,
            });
        }
        Ok(ViewPayload {
            view: ViewStatus::from_byte(buf[0])?,
        })
    }
}

/// Member count payload: `[count: u32]`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountPayload {
    pub n_connections: u32,
}

impl CountPayload {
    pub fn encode(&self) -> Vec<u8> {
        self.n_connections.to_le_bytes().to_vec()
    }

    pub fn decode(buf: &[u8]) -> ParallaxResult<Self> {
        if buf.len() < 4 {
            return Err(ParallaxError::BufferTooShort {
                expected: 4,
                actual: buf.len(),
            });
        }
        Ok(CountPayload {
            n_connections: u32::from_le_bytes(buf[..4].try_into().unwrap()),
        })
    }
}

/// Keyed dataset payload: `[identifier][key: u8][bytes]`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorePayload {
    pub identifier: String,
    pub key: StoreKey,
    pub bytes: Vec<u8>,
}

impl StorePayload {
    pub fn new(identifier: impl Into<String>, key: StoreKey, bytes: Vec<u8>) -> Self {
        StorePayload {
            identifier: identifier.into(),
            key,
            bytes,
        }
    }

    pub fn encode(&self) -> ParallaxResult<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(2 + self.identifier.len() + 1 + self.bytes.len());
        put_string(&mut buf, &self.identifier)?;
        buf.put_u8(self.key.to_byte());
        buf.put_slice(&self.bytes);
        Ok(buf.to_vec())
    }

    pub fn decode(buf: &[u8]) -> ParallaxResult<Self> {
        let mut cursor = buf;
        let identifier = get_string(&mut cursor)?;
        if cursor.remaining() < 1 {
            return Err(ParallaxError::BufferTooShort {
                expected: 1,
                actual: 0,
            });
        }
        let key = StoreKey::from_byte(cursor.get_u8())?;
        Ok(StorePayload {
            identifier,
            key,
            bytes: cursor.to_vec(),
        })
    }
}

/// Disconnection payload: `[reason: u8][message]`, empty decodes as Bye
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisconnectPayload {
    pub reason: DisconnectReason,
    pub message: String,
}

impl DisconnectPayload {
    pub fn new(reason: DisconnectReason, message: impl Into<String>) -> Self {
        DisconnectPayload {
            reason,
            message: message.into(),
        }
    }

    pub fn bye() -> Self {
        DisconnectPayload::new(DisconnectReason::Bye, "")
    }

    pub fn encode(&self) -> ParallaxResult<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(1 + 2 + self.message.len());
        buf.put_u8(self.reason.to_byte());
        put_string(&mut buf, &self.message)?;
        Ok(buf.to_vec())
    }

    pub fn decode(buf: &[u8]) -> ParallaxResult<Self> {
        if buf.is_empty() {
            return Ok(DisconnectPayload::bye());
        }
        let mut cursor = buf;
        let reason = DisconnectReason::from_byte(cursor.get_u8())?;
        let message = if cursor.remaining() >= 2 {
            get_string(&mut cursor)?
        } else {
            String::new()
        };
        Ok(DisconnectPayload { reason, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_auth_roundtrip() {
        let auth = AuthenticationPayload::new("observer-3", "orion");
        let bytes = auth.encode().unwrap();
        let parsed = AuthenticationPayload::decode(&bytes).unwrap();
        assert_eq!(parsed, auth);
    }

    #[test]
    fn test_auth_version_mismatch() {
        let mut auth = AuthenticationPayload::new("observer-3", "orion");
        auth.version = PROTOCOL_VERSION + 7;
        let bytes = auth.encode().unwrap();

        let err = AuthenticationPayload::decode(&bytes).unwrap_err();
        match err {
            ParallaxError::ProtocolVersionMismatch { local, remote } => {
                assert_eq!(local, PROTOCOL_VERSION);
                assert_eq!(remote, PROTOCOL_VERSION + 7);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_auth_truncated() {
        let auth = AuthenticationPayload::new("observer-3", "orion");
        let bytes = auth.encode().unwrap();
        assert!(matches!(
            AuthenticationPayload::decode(&bytes[..bytes.len() - 2]),
            Err(ParallaxError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_data_roundtrip() {
        let data = DataPayload::new(DataKind::Snapshot, 8_516_131.25, vec![9, 8, 7]);
        let bytes = data.encode();
        let parsed = DataPayload::decode(&bytes).unwrap();
        assert_eq!(parsed, data);
        assert_eq!(parsed.timestamp.to_bits(), data.timestamp.to_bits());
    }

    #[test]
    fn test_peek_kind_matches_decode() {
        let data = DataPayload::new(DataKind::Script, 0.0, vec![0xAA; 32]);
        let bytes = data.encode();
        assert_eq!(DataPayload::peek_kind(&bytes).unwrap(), DataKind::Script);
        assert!(DataPayload::peek_kind(&bytes[..5]).is_err());
    }

    #[test]
    fn test_data_timestamp_prefix_is_eight_bytes() {
        let data = DataPayload::new(DataKind::Camera, 1.0, Vec::new());
        assert_eq!(data.encode().len(), 9);
    }

    #[test]
    fn test_status_and_view_roundtrip() {
        let status = StatusPayload {
            status: ConnectionStatus::ClientWithHost,
        };
        assert_eq!(StatusPayload::decode(&status.encode()).unwrap(), status);

        let view = ViewPayload {
            view: ViewStatus::IndependentView,
        };
        assert_eq!(ViewPayload::decode(&view.encode()).unwrap(), view);
    }

    #[test]
    fn test_count_roundtrip() {
        let count = CountPayload { n_connections: 42 };
        assert_eq!(CountPayload::decode(&count.encode()).unwrap(), count);
    }

    #[test]
    fn test_store_roundtrip() {
        let store = StorePayload::new("dataset1", StoreKey::Positions, vec![1, 2, 3, 4]);
        let bytes = store.encode().unwrap();
        assert_eq!(StorePayload::decode(&bytes).unwrap(), store);
    }

    #[test]
    fn test_disconnect_roundtrip_and_empty() {
        let payload = DisconnectPayload::new(DisconnectReason::InvalidPassword, "bad password");
        let bytes = payload.encode().unwrap();
        assert_eq!(DisconnectPayload::decode(&bytes).unwrap(), payload);

        assert_eq!(
            DisconnectPayload::decode(&[]).unwrap().reason,
            DisconnectReason::Bye
        );
    }

    proptest! {
        #[test]
        fn prop_auth_roundtrip(name in ".{0,64}", password in ".{0,64}") {
            let auth = AuthenticationPayload::new(name, password);
            let bytes = auth.encode().unwrap();
            prop_assert_eq!(AuthenticationPayload::decode(&bytes).unwrap(), auth);
        }

        #[test]
        fn prop_store_roundtrip(
            identifier in "[a-zA-Z0-9_-]{1,32}",
            key in 0u8..=3,
            bytes in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let store = StorePayload::new(identifier, StoreKey::from_byte(key).unwrap(), bytes);
            let encoded = store.encode().unwrap();
            prop_assert_eq!(StorePayload::decode(&encoded).unwrap(), store);
        }
    }
}
