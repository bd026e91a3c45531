//! Events surfaced to the application by [`crate::SessionPeer::pre_sync`]

use parallax_core::{ConnectionStatus, DisconnectReason, StoreKey, ViewStatus};

/// One application-visible change drained from the ingress queue
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// The hub assigned this peer a new role
    StatusChanged(ConnectionStatus),
    /// The hub assigned this peer a new view
    ViewChanged(ViewStatus),
    /// Session member count changed
    MemberCount(u32),
    /// Another member left the session
    PeerLeft,
    /// A dataset arrived in the keyed store; the renderer should check the
    /// dirty flag on its next pass
    DataStored {
        identifier: String,
        key: StoreKey,
    },
    /// This peer's connection ended with a reasoned Disconnection
    Disconnected(DisconnectReason),
    /// This peer's socket closed without a reason; equivalent to an
    /// explicit disconnection
    ConnectionLost,
}
