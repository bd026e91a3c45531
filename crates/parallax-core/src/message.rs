//! Message model for the session protocol
//!
//! Every frame on the wire carries one of these type tags. Control messages
//! (status, hostship, view) have small fixed payloads; Data carries the
//! per-tick replication snapshot or a client interaction request; and
//! IndependentData carries one-shot dataset pushes for the keyed store.

use crate::{ParallaxError, ParallaxResult};

/// Message type tag, 4 bytes on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageType {
    /// Handshake: protocol version, peer name, session password
    Authentication = 0,
    /// Replication snapshot (host) or interaction request (client)
    Data = 1,
    /// Dataset push for the keyed store, outside the per-tick snapshot
    IndependentData = 2,
    /// Role assignment pushed by the hub
    ConnectionStatus = 3,
    /// Client asks to become host
    HostshipRequest = 4,
    /// Host gives the role up
    HostshipResignation = 5,
    /// Client asks to render its own camera view
    ViewRequest = 6,
    /// Client returns to the host's view
    ViewResignation = 7,
    /// View assignment pushed by the hub
    ViewStatus = 8,
    /// Peer stops consuming host snapshots entirely
    IndependentSessionOn = 9,
    /// Peer resumes consuming host snapshots
    IndependentSessionOff = 10,
    /// Member count broadcast
    NConnections = 11,
    /// Clean departure, or a reasoned close pushed by the hub
    Disconnection = 12,
}

impl MessageType {
    /// Parse from the 4-byte wire tag
    pub fn from_u32(v: u32) -> ParallaxResult<Self> {
        match v {
            0 => Ok(MessageType::Authentication),
            1 => Ok(MessageType::Data),
            2 => Ok(MessageType::IndependentData),
            3 => Ok(MessageType::ConnectionStatus),
            4 => Ok(MessageType::HostshipRequest),
            5 => Ok(MessageType::HostshipResignation),
            6 => Ok(MessageType::ViewRequest),
            7 => Ok(MessageType::ViewResignation),
            8 => Ok(MessageType::ViewStatus),
            9 => Ok(MessageType::IndependentSessionOn),
            10 => Ok(MessageType::IndependentSessionOff),
            11 => Ok(MessageType::NConnections),
            12 => Ok(MessageType::Disconnection),
            other => Err(ParallaxError::UnknownMessageType(other)),
        }
    }

    #[inline]
    pub fn to_u32(self) -> u32 {
        self as u32
    }
}

/// Kind of a Data payload, 1 byte on the wire
///
/// Only the host emits Snapshot. Camera, Time, and Script flow from clients
/// to the host as interaction requests, never as authoritative state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataKind {
    Camera = 0,
    Time = 1,
    Script = 2,
    /// The full per-tick replication buffer
    Snapshot = 3,
}

impl DataKind {
    pub fn from_byte(b: u8) -> ParallaxResult<Self> {
        match b {
            0 => Ok(DataKind::Camera),
            1 => Ok(DataKind::Time),
            2 => Ok(DataKind::Script),
            3 => Ok(DataKind::Snapshot),
            other => Err(ParallaxError::UnknownDataKind(other)),
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Semantic key of a keyed-store entry, 1 byte on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StoreKey {
    Positions = 0,
    Colors = 1,
    Attributes = 2,
    Indices = 3,
}

impl StoreKey {
    pub fn from_byte(b: u8) -> ParallaxResult<Self> {
        match b {
            0 => Ok(StoreKey::Positions),
            1 => Ok(StoreKey::Colors),
            2 => Ok(StoreKey::Attributes),
            3 => Ok(StoreKey::Indices),
            other => Err(ParallaxError::UnknownStoreKey(other)),
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}

/// Why a connection closed, carried in Disconnection payloads
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DisconnectReason {
    /// The sender is leaving cleanly
    #[default]
    Bye = 0,
    /// Broadcast by the hub: another member left
    MemberLeft = 1,
    /// Handshake failed: protocol versions differ
    ProtocolVersionMismatch = 2,
    /// Handshake failed: wrong session password
    InvalidPassword = 3,
    /// Handshake failed: session is at capacity
    SessionFull = 4,
    /// The peer broke the protocol and was removed
    ProtocolViolation = 5,
}

impl DisconnectReason {
    pub fn from_byte(b: u8) -> ParallaxResult<Self> {
        match b {
            0 => Ok(DisconnectReason::Bye),
            1 => Ok(DisconnectReason::MemberLeft),
            2 => Ok(DisconnectReason::ProtocolVersionMismatch),
            3 => Ok(DisconnectReason::InvalidPassword),
            4 => Ok(DisconnectReason::SessionFull),
            5 => Ok(DisconnectReason::ProtocolViolation),
            other => Err(ParallaxError::UnknownReason(other)),
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Does receiving this reason end the receiver's own session?
    pub fn is_fatal(self) -> bool {
        !matches!(self, DisconnectReason::MemberLeft)
    }
}
