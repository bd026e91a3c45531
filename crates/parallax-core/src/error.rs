//! Error types for the session core

use thiserror::Error;

use crate::{ConnectionStatus, MessageType, StoreKey};

/// Core session errors
#[derive(Error, Debug)]
pub enum ParallaxError {
    // Wire errors
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Buffer too short: expected {expected}, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Frame too large: {0} bytes")]
    FrameTooLarge(usize),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(u32),

    #[error("Unknown data kind: {0}")]
    UnknownDataKind(u8),

    #[error("Unknown store key: {0}")]
    UnknownStoreKey(u8),

    #[error("Unknown status: {0}")]
    UnknownStatus(u8),

    #[error("Unknown disconnect reason: {0}")]
    UnknownReason(u8),

    // Transport errors
    #[error("Connection lost")]
    ConnectionLost,

    #[error("Transport error: {0}")]
    Transport(String),

    // Handshake errors
    #[error("Protocol version mismatch: local {local}, remote {remote}")]
    ProtocolVersionMismatch { local: u32, remote: u32 },

    #[error("Invalid session password")]
    InvalidPassword,

    #[error("Session full")]
    SessionFull,

    // Protocol-state errors
    #[error("Illegal status transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: ConnectionStatus,
        to: ConnectionStatus,
    },

    #[error("Hostship request while already host")]
    AlreadyHost,

    #[error("Snapshot order mismatch at entry {index}: expected tag {expected}, got {actual}")]
    SyncOrderMismatch {
        index: usize,
        expected: u8,
        actual: u8,
    },

    #[error("Snapshot left {remaining} undecoded bytes")]
    TrailingSnapshotBytes { remaining: usize },

    #[error("Unexpected message: {0:?}")]
    UnexpectedMessage(MessageType),

    // Store errors
    #[error("No data stored for ({identifier}, {key:?})")]
    NotFound { identifier: String, key: StoreKey },

    // Queue errors
    #[error("Ingress queue closed")]
    QueueClosed,
}

/// Result type for session operations
pub type ParallaxResult<T> = Result<T, ParallaxError>;
