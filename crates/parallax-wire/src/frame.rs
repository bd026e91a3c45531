//! Frame structure for the session wire protocol
//!
//! Frame = `[type: u32 LE][length: u32 LE][payload: length bytes]`

use bytes::{Buf, BufMut, BytesMut};

use parallax_core::{MessageType, ParallaxError, ParallaxResult};

/// Fixed frame header size in bytes (type + length)
pub const FRAME_HEADER_SIZE: usize = 8;

/// Sanity cap on a declared payload length. Dataset pushes can be large,
/// but a length beyond this is a malformed frame, rejected before any
/// allocation happens.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024 * 1024;

/// One typed, length-delimited message on the wire
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WireFrame {
    pub message_type: MessageType,
    pub payload: Vec<u8>,
}

impl WireFrame {
    pub fn new(message_type: MessageType, payload: Vec<u8>) -> Self {
        WireFrame {
            message_type,
            payload,
        }
    }

    /// A frame with no payload (pure control message)
    pub fn control(message_type: MessageType) -> Self {
        WireFrame::new(message_type, Vec::new())
    }

    /// Serialize the frame to bytes
    pub fn encode(&self) -> ParallaxResult<Vec<u8>> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ParallaxError::FrameTooLarge(self.payload.len()));
        }

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_u32_le(self.message_type.to_u32());
        buf.put_u32_le(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        Ok(buf.to_vec())
    }

    /// Parse the fixed header, returning the message type and payload length
    pub fn parse_header(buf: &[u8; FRAME_HEADER_SIZE]) -> ParallaxResult<(MessageType, usize)> {
        let mut cursor = &buf[..];
        let message_type = MessageType::from_u32(cursor.get_u32_le())?;
        let length = cursor.get_u32_le() as usize;

        if length > MAX_PAYLOAD_SIZE {
            return Err(ParallaxError::FrameTooLarge(length));
        }

        Ok((message_type, length))
    }

    /// Parse one frame from a buffer, returning the frame and the bytes
    /// consumed
    pub fn parse(buf: &[u8]) -> ParallaxResult<(Self, usize)> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Err(ParallaxError::BufferTooShort {
                expected: FRAME_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let header: [u8; FRAME_HEADER_SIZE] = buf[..FRAME_HEADER_SIZE].try_into().unwrap();
        let (message_type, length) = Self::parse_header(&header)?;

        let total = FRAME_HEADER_SIZE + length;
        if buf.len() < total {
            return Err(ParallaxError::BufferTooShort {
                expected: total,
                actual: buf.len(),
            });
        }

        let payload = buf[FRAME_HEADER_SIZE..total].to_vec();
        Ok((
            WireFrame {
                message_type,
                payload,
            },
            total,
        ))
    }

    /// Total size on the wire
    pub fn size(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = WireFrame::new(MessageType::Data, vec![1, 2, 3, 4, 5]);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), frame.size());

        let (parsed, consumed) = WireFrame::parse(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_control_frame_has_empty_payload() {
        let frame = WireFrame::control(MessageType::HostshipRequest);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), FRAME_HEADER_SIZE);

        let (parsed, _) = WireFrame::parse(&bytes).unwrap();
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn test_truncated_frame() {
        let frame = WireFrame::new(MessageType::NConnections, vec![0; 4]);
        let bytes = frame.encode().unwrap();

        let result = WireFrame::parse(&bytes[..bytes.len() - 1]);
        assert!(matches!(
            result,
            Err(ParallaxError::BufferTooShort { .. })
        ));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut bytes = WireFrame::control(MessageType::Data).encode().unwrap();
        bytes[0] = 0xFF;
        assert!(matches!(
            WireFrame::parse(&bytes),
            Err(ParallaxError::UnknownMessageType(_))
        ));
    }

    #[test]
    fn test_absurd_length_rejected() {
        let mut bytes = WireFrame::control(MessageType::Data).encode().unwrap();
        bytes[4..8].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            WireFrame::parse(&bytes),
            Err(ParallaxError::FrameTooLarge(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_frame_roundtrip(tag in 0u32..=12, payload in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let frame = WireFrame::new(MessageType::from_u32(tag).unwrap(), payload);
            let bytes = frame.encode().unwrap();
            let (parsed, consumed) = WireFrame::parse(&bytes).unwrap();
            prop_assert_eq!(consumed, bytes.len());
            prop_assert_eq!(parsed, frame);
        }
    }
}
