//! Session hub - hostship arbitration and snapshot relay
//!
//! The hub owns every connection in the session. One reader task per peer
//! handles frames in receipt order; one writer task per peer drains an
//! unbounded outbox so a slow peer never blocks a broadcast. All shared
//! state sits behind a single mutex whose critical sections are
//! insert/lookup/route only.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use parallax_core::{
    ConnectionStatus, DataKind, DisconnectReason, MessageType, ParallaxError, ParallaxResult,
    PeerId, ViewStatus,
};
use parallax_transport::{listen, read_frame, send_frame};
use parallax_wire::{AuthenticationPayload, DataPayload, StorePayload, WireFrame};

use crate::frames::{count_frame, disconnect_frame, status_frame, view_frame};
use crate::HubConfig;

/// One connected peer, hub side
struct PeerHandle {
    name: String,
    status: ConnectionStatus,
    view: ViewStatus,
    independent_session: bool,
    outbox: mpsc::UnboundedSender<WireFrame>,
}

impl PeerHandle {
    /// Queue a frame for the writer task. A failed send means the peer is
    /// already tearing down; the reader task handles the removal.
    fn send(&self, frame: WireFrame) {
        let _ = self.outbox.send(frame);
    }
}

#[derive(Default)]
struct HubState {
    peers: HashMap<PeerId, PeerHandle>,
    host: Option<PeerId>,
    next_peer_id: u64,
    /// Last Data(Snapshot) frame payload from the host, replayed to
    /// newcomers so they catch up in a single tick
    latest_snapshot: Option<Vec<u8>>,
}

impl HubState {
    fn broadcast(&self, frame: &WireFrame) {
        for peer in self.peers.values() {
            peer.send(frame.clone());
        }
    }

    fn broadcast_count(&self) {
        self.broadcast(&count_frame(self.peers.len() as u32));
    }

    /// Make `id` the host and retarget every other peer
    fn grant_hostship(&mut self, id: PeerId) -> ParallaxResult<()> {
        self.host = Some(id);
        for (pid, peer) in self.peers.iter_mut() {
            let target = if *pid == id {
                ConnectionStatus::Host
            } else {
                ConnectionStatus::ClientWithHost
            };
            peer.status = peer.status.transition(target)?;
            peer.send(status_frame(peer.status));
        }
        self.broadcast_count();
        Ok(())
    }

    /// The session becomes hostless until the next successful request
    fn drop_hostship(&mut self) -> ParallaxResult<()> {
        self.host = None;
        self.latest_snapshot = None;
        for peer in self.peers.values_mut() {
            peer.status = peer.status.transition(ConnectionStatus::ClientWithoutHost)?;
            peer.send(status_frame(peer.status));
        }
        self.broadcast_count();
        Ok(())
    }

    /// Remove a peer and notify the rest of the session
    fn remove_peer(&mut self, id: PeerId) {
        let Some(peer) = self.peers.remove(&id) else {
            return;
        };
        info!(%id, name = %peer.name, "peer left");
        drop(peer);

        if self.host == Some(id) {
            self.host = None;
            self.latest_snapshot = None;
            for remaining in self.peers.values_mut() {
                match remaining.status.transition(ConnectionStatus::ClientWithoutHost) {
                    Ok(next) => {
                        remaining.status = next;
                        remaining.send(status_frame(next));
                    }
                    Err(e) => warn!("status update after host loss failed: {e}"),
                }
            }
        }

        self.broadcast(&disconnect_frame(DisconnectReason::MemberLeft, ""));
        self.broadcast_count();
    }

    /// Fan the host's data out to every following client
    fn relay_to_clients(&self, from: PeerId, frame: WireFrame) {
        for (pid, peer) in self.peers.iter() {
            if *pid == from
                || peer.status != ConnectionStatus::ClientWithHost
                || peer.independent_session
            {
                continue;
            }
            peer.send(frame.clone());
        }
    }

    /// Relay a dataset push to every other peer
    fn relay_to_others(&self, from: PeerId, frame: WireFrame) {
        for (pid, peer) in self.peers.iter() {
            if *pid != from {
                peer.send(frame.clone());
            }
        }
    }
}

/// The arbitration and relay server
pub struct SessionHub {
    listener: TcpListener,
    config: Arc<HubConfig>,
    state: Arc<Mutex<HubState>>,
}

impl SessionHub {
    /// Bind the hub's listening socket
    pub async fn bind(addr: SocketAddr, config: HubConfig) -> ParallaxResult<Self> {
        let listener = listen(addr).await?;
        Ok(SessionHub {
            listener,
            config: Arc::new(config),
            state: Arc::new(Mutex::new(HubState::default())),
        })
    }

    pub fn local_addr(&self) -> ParallaxResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| ParallaxError::Transport(e.to_string()))
    }

    /// Current member count (diagnostics)
    pub fn n_connections(&self) -> usize {
        self.state.lock().peers.len()
    }

    /// Current host, if any (diagnostics)
    pub fn host_id(&self) -> Option<PeerId> {
        self.state.lock().host
    }

    /// Snapshot of every peer's role (diagnostics)
    pub fn statuses(&self) -> Vec<(PeerId, ConnectionStatus)> {
        let state = self.state.lock();
        state.peers.iter().map(|(id, p)| (*id, p.status)).collect()
    }

    /// Accept connections until the listener fails
    pub async fn run(&self) -> ParallaxResult<()> {
        loop {
            let (stream, addr) = self
                .listener
                .accept()
                .await
                .map_err(|e| ParallaxError::Transport(e.to_string()))?;
            if let Err(e) = stream.set_nodelay(true) {
                debug!(%addr, "set_nodelay failed: {e}");
            }
            let state = Arc::clone(&self.state);
            let config = Arc::clone(&self.config);
            tokio::spawn(async move {
                handle_connection(state, config, stream, addr).await;
            });
        }
    }
}

async fn reject(writer: &mut OwnedWriteHalf, reason: DisconnectReason, message: &str) {
    let _ = send_frame(writer, &disconnect_frame(reason, message)).await;
}

async fn handle_connection(
    state: Arc<Mutex<HubState>>,
    config: Arc<HubConfig>,
    stream: TcpStream,
    addr: SocketAddr,
) {
    let (mut reader, mut writer) = stream.into_split();

    // Handshake: the first frame must authenticate, before any state is
    // shared. Failures are reported with a reasoned Disconnection so the
    // peer can surface them at connect time.
    let first = match read_frame(&mut reader).await {
        Ok(frame) => frame,
        Err(_) => return,
    };
    if first.message_type != MessageType::Authentication {
        reject(
            &mut writer,
            DisconnectReason::ProtocolViolation,
            "expected authentication",
        )
        .await;
        return;
    }
    let auth = match AuthenticationPayload::decode(&first.payload) {
        Ok(auth) => auth,
        Err(e @ ParallaxError::ProtocolVersionMismatch { .. }) => {
            warn!(%addr, "handshake failed: {e}");
            reject(
                &mut writer,
                DisconnectReason::ProtocolVersionMismatch,
                &e.to_string(),
            )
            .await;
            return;
        }
        Err(e) => {
            reject(&mut writer, DisconnectReason::ProtocolViolation, &e.to_string()).await;
            return;
        }
    };
    if auth.password != config.password {
        warn!(%addr, name = %auth.name, "handshake failed: wrong password");
        reject(
            &mut writer,
            DisconnectReason::InvalidPassword,
            "wrong session password",
        )
        .await;
        return;
    }

    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    let peer_id = {
        let mut st = state.lock();
        if st.peers.len() >= config.max_peers {
            None
        } else {
            st.next_peer_id += 1;
            let id = PeerId::new(st.next_peer_id);
            let status = if st.host.is_some() {
                ConnectionStatus::ClientWithHost
            } else {
                ConnectionStatus::ClientWithoutHost
            };
            st.peers.insert(
                id,
                PeerHandle {
                    name: auth.name.clone(),
                    status,
                    view: ViewStatus::HostView,
                    independent_session: false,
                    outbox: outbox_tx.clone(),
                },
            );

            // Status first, then the catch-up snapshot for a session that
            // already has a host, so the newcomer can resync before it is
            // asked to render
            let peer = &st.peers[&id];
            peer.send(status_frame(status));
            if status == ConnectionStatus::ClientWithHost {
                if let Some(snapshot) = &st.latest_snapshot {
                    peer.send(WireFrame::new(MessageType::Data, snapshot.clone()));
                }
            }
            st.broadcast_count();
            Some(id)
        }
    };
    let Some(peer_id) = peer_id else {
        reject(&mut writer, DisconnectReason::SessionFull, "session full").await;
        return;
    };
    info!(%peer_id, name = %auth.name, %addr, "peer joined");

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = outbox_rx.recv().await {
            if send_frame(&mut writer, &frame).await.is_err() {
                break;
            }
        }
    });

    loop {
        match read_frame(&mut reader).await {
            Ok(frame) => match handle_frame(&state, peer_id, frame) {
                Ok(true) => {}
                Ok(false) => {
                    // Clean departure
                    state.lock().remove_peer(peer_id);
                    break;
                }
                Err(e) => {
                    warn!(%peer_id, "protocol violation: {e}");
                    let mut st = state.lock();
                    if let Some(peer) = st.peers.get(&peer_id) {
                        peer.send(disconnect_frame(
                            DisconnectReason::ProtocolViolation,
                            &e.to_string(),
                        ));
                    }
                    st.remove_peer(peer_id);
                    break;
                }
            },
            Err(ParallaxError::ConnectionLost) => {
                debug!(%peer_id, "connection lost");
                state.lock().remove_peer(peer_id);
                break;
            }
            Err(e) => {
                // Malformed frame: fatal to this connection
                warn!(%peer_id, "framing error: {e}");
                let mut st = state.lock();
                if let Some(peer) = st.peers.get(&peer_id) {
                    peer.send(disconnect_frame(
                        DisconnectReason::ProtocolViolation,
                        &e.to_string(),
                    ));
                }
                st.remove_peer(peer_id);
                break;
            }
        }
    }

    drop(outbox_tx);
    let _ = writer_task.await;
}

/// Handle one frame from a peer. `Ok(false)` ends the connection cleanly;
/// an error ends it as a protocol violation.
fn handle_frame(
    state: &Arc<Mutex<HubState>>,
    peer_id: PeerId,
    frame: WireFrame,
) -> ParallaxResult<bool> {
    let mut st = state.lock();
    if !st.peers.contains_key(&peer_id) {
        return Ok(false);
    }

    match frame.message_type {
        MessageType::HostshipRequest => {
            if st.host == Some(peer_id) {
                return Err(ParallaxError::AlreadyHost);
            }
            if st.host.is_some() {
                // First request wins. The loser learns its request went
                // nowhere from its unchanged status.
                if let Some(peer) = st.peers.get(&peer_id) {
                    debug!(%peer_id, "hostship denied, host already elected");
                    peer.send(status_frame(peer.status));
                }
            } else {
                st.grant_hostship(peer_id)?;
                info!(%peer_id, "hostship granted");
            }
            Ok(true)
        }

        MessageType::HostshipResignation => {
            if st.host != Some(peer_id) {
                return Err(ParallaxError::UnexpectedMessage(
                    MessageType::HostshipResignation,
                ));
            }
            st.drop_hostship()?;
            info!(%peer_id, "host resigned");
            Ok(true)
        }

        MessageType::Data => {
            let kind = DataPayload::peek_kind(&frame.payload)?;
            if st.host == Some(peer_id) {
                if kind == DataKind::Snapshot {
                    st.latest_snapshot = Some(frame.payload.clone());
                }
                st.relay_to_clients(peer_id, frame);
            } else {
                if kind == DataKind::Snapshot {
                    // Only the host emits authoritative state
                    return Err(ParallaxError::UnexpectedMessage(MessageType::Data));
                }
                match st.host.and_then(|id| st.peers.get(&id)) {
                    Some(host) => host.send(frame),
                    None => debug!(%peer_id, "dropping interaction request, no host"),
                }
            }
            Ok(true)
        }

        MessageType::IndependentData => {
            // Must parse before it is relayed session-wide
            StorePayload::decode(&frame.payload)?;
            st.relay_to_others(peer_id, frame);
            Ok(true)
        }

        MessageType::ViewRequest => {
            if let Some(peer) = st.peers.get_mut(&peer_id) {
                peer.view = ViewStatus::IndependentView;
                peer.send(view_frame(peer.view));
            }
            Ok(true)
        }

        MessageType::ViewResignation => {
            if let Some(peer) = st.peers.get_mut(&peer_id) {
                peer.view = ViewStatus::HostView;
                peer.send(view_frame(peer.view));
            }
            Ok(true)
        }

        MessageType::IndependentSessionOn => {
            if let Some(peer) = st.peers.get_mut(&peer_id) {
                peer.independent_session = true;
            }
            Ok(true)
        }

        MessageType::IndependentSessionOff => {
            let snapshot = st.latest_snapshot.clone();
            if let Some(peer) = st.peers.get_mut(&peer_id) {
                peer.independent_session = false;
                // Resync in a single tick
                if peer.status == ConnectionStatus::ClientWithHost {
                    if let Some(snapshot) = snapshot {
                        peer.send(WireFrame::new(MessageType::Data, snapshot));
                    }
                }
            }
            Ok(true)
        }

        MessageType::Disconnection => Ok(false),

        other => Err(ParallaxError::UnexpectedMessage(other)),
    }
}
