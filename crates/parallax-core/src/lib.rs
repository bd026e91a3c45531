//! Parallax Core - Fundamental types and primitives
//!
//! This crate defines the types shared by every layer of the session
//! synchronization core:
//! - Identifiers (PeerId)
//! - Message model (MessageType, DataKind, StoreKey, DisconnectReason)
//! - Connection and view status with the legal transition set
//! - Protocol constants and the error taxonomy

pub mod id;
pub mod message;
pub mod status;
pub mod error;

pub use id::*;
pub use message::*;
pub use status::*;
pub use error::*;

/// Wire protocol version, embedded in the Authentication message and
/// compared during the handshake. A mismatch is a hard handshake failure.
pub const PROTOCOL_VERSION: u32 = 1;
