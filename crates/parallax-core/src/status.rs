//! Connection and view status
//!
//! A connection moves only along the legal edges below. Skipping an edge
//! (e.g. Disconnected straight to Host) is a protocol-state error and is
//! fatal to the connection.

use crate::{ParallaxError, ParallaxResult};

/// Role of a connection within the session, 1 byte on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ConnectionStatus {
    /// Not part of any session
    #[default]
    Disconnected = 0,
    /// Socket open, handshake not yet confirmed
    Connecting = 1,
    /// Authenticated, session currently has no host
    ClientWithoutHost = 2,
    /// Authenticated, following the host's state
    ClientWithHost = 3,
    /// The single authoritative peer
    Host = 4,
}

impl ConnectionStatus {
    pub fn from_byte(b: u8) -> ParallaxResult<Self> {
        match b {
            0 => Ok(ConnectionStatus::Disconnected),
            1 => Ok(ConnectionStatus::Connecting),
            2 => Ok(ConnectionStatus::ClientWithoutHost),
            3 => Ok(ConnectionStatus::ClientWithHost),
            4 => Ok(ConnectionStatus::Host),
            other => Err(ParallaxError::UnknownStatus(other)),
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// Is this edge in the legal transition set?
    ///
    /// - Disconnected → Connecting (socket opened)
    /// - Connecting → ClientWithoutHost | ClientWithHost (handshake)
    /// - ClientWithoutHost → Host (granted request)
    /// - ClientWithoutHost ↔ ClientWithHost (host elected / host left)
    /// - Host → ClientWithHost | ClientWithoutHost (resignation, host loss)
    /// - any → Disconnected (teardown)
    pub fn transition_allowed(self, to: ConnectionStatus) -> bool {
        use ConnectionStatus::*;
        if to == Disconnected {
            return true;
        }
        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Connecting, ClientWithoutHost)
                | (Connecting, ClientWithHost)
                | (ClientWithoutHost, Host)
                | (ClientWithoutHost, ClientWithHost)
                | (ClientWithHost, ClientWithoutHost)
                | (Host, ClientWithHost)
                | (Host, ClientWithoutHost)
        )
    }

    /// Validate an edge, producing the protocol-state error on violation
    pub fn transition(self, to: ConnectionStatus) -> ParallaxResult<ConnectionStatus> {
        if self.transition_allowed(to) {
            Ok(to)
        } else {
            Err(ParallaxError::IllegalTransition { from: self, to })
        }
    }

    /// Connected in any role (handshake complete, socket alive)
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            ConnectionStatus::ClientWithoutHost
                | ConnectionStatus::ClientWithHost
                | ConnectionStatus::Host
        )
    }
}

/// Whose camera a peer's screen shows, 1 byte on the wire
///
/// Decoupled from the role: an IndependentView peer still consumes host
/// state for everything but its own camera.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum ViewStatus {
    /// Render the host's camera
    #[default]
    HostView = 0,
    /// Render a locally driven camera
    IndependentView = 1,
}

impl ViewStatus {
    pub fn from_byte(b: u8) -> ParallaxResult<Self> {
        match b {
            0 => Ok(ViewStatus::HostView),
            1 => Ok(ViewStatus::IndependentView),
            other => Err(ParallaxError::UnknownStatus(other)),
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        self as u8
    }
}
