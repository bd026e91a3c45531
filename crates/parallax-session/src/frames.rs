//! Frame constructors shared by hub and peer

use parallax_core::{ConnectionStatus, DisconnectReason, MessageType, ViewStatus};
use parallax_wire::{CountPayload, DisconnectPayload, StatusPayload, ViewPayload, WireFrame};

pub(crate) fn status_frame(status: ConnectionStatus) -> WireFrame {
    WireFrame::new(
        MessageType::ConnectionStatus,
        StatusPayload { status }.encode(),
    )
}

pub(crate) fn view_frame(view: ViewStatus) -> WireFrame {
    WireFrame::new(MessageType::ViewStatus, ViewPayload { view }.encode())
}

pub(crate) fn count_frame(n_connections: u32) -> WireFrame {
    WireFrame::new(
        MessageType::NConnections,
        CountPayload { n_connections }.encode(),
    )
}

pub(crate) fn disconnect_frame(reason: DisconnectReason, message: &str) -> WireFrame {
    // Bounded message: put_string's u16 length prefix must always fit
    let message: String = message.chars().take(256).collect();
    match DisconnectPayload::new(reason, message).encode() {
        Ok(payload) => WireFrame::new(MessageType::Disconnection, payload),
        Err(_) => WireFrame::new(MessageType::Disconnection, vec![reason.to_byte()]),
    }
}
