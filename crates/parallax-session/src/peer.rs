//! Session peer - the per-instance client
//!
//! One receive task reads frames into the ingress queue; one writer task
//! drains outgoing frames. The simulation thread calls
//! [`SessionPeer::pre_sync`] once per frame, before any rendering or logic
//! for that tick runs: that is the only point where network state touches
//! the registry and the keyed store.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use parallax_core::{
    ConnectionStatus, DataKind, DisconnectReason, MessageType, ParallaxError, ParallaxResult,
    StoreKey, ViewStatus,
};
use parallax_store::DataStore;
use parallax_sync::{CameraState, SyncBuffer, SyncRegistry, TimeState};
use parallax_transport::{
    connect, ingress_channel, send_frame, start_receive_loop, IngressReceiver, TransportEvent,
};
use parallax_wire::{
    AuthenticationPayload, CountPayload, DataPayload, DisconnectPayload, StatusPayload,
    StorePayload, ViewPayload, WireFrame,
};

use crate::frames::disconnect_frame;
use crate::{PeerConfig, SessionEvent};

/// One application instance's connection to the session
pub struct SessionPeer {
    name: String,
    status: ConnectionStatus,
    view: ViewStatus,
    independent_session: bool,
    n_connections: u32,
    store: Arc<DataStore>,
    ingress: IngressReceiver<TransportEvent>,
    outbox: mpsc::UnboundedSender<WireFrame>,
}

impl SessionPeer {
    /// Connect to a hub and send the handshake. The returned peer is
    /// `Connecting` until the hub's first ConnectionStatus is applied by
    /// [`SessionPeer::pre_sync`].
    pub async fn connect(
        addr: SocketAddr,
        config: PeerConfig,
        store: Arc<DataStore>,
    ) -> ParallaxResult<Self> {
        let stream = connect(addr).await?;
        let (read_half, mut write_half) = stream.into_split();

        let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<WireFrame>();
        tokio::spawn(async move {
            while let Some(frame) = outbox_rx.recv().await {
                if send_frame(&mut write_half, &frame).await.is_err() {
                    break;
                }
            }
        });

        let (ingress_tx, ingress) = ingress_channel();
        start_receive_loop(read_half, ingress_tx);

        let auth = AuthenticationPayload::new(config.name.clone(), config.password);
        let frame = WireFrame::new(MessageType::Authentication, auth.encode()?);
        outbox
            .send(frame)
            .map_err(|_| ParallaxError::ConnectionLost)?;
        info!(name = %config.name, %addr, "connecting to session hub");

        Ok(SessionPeer {
            name: config.name,
            status: ConnectionStatus::Disconnected.transition(ConnectionStatus::Connecting)?,
            view: ViewStatus::HostView,
            independent_session: false,
            n_connections: 0,
            store,
            ingress,
            outbox,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn view_status(&self) -> ViewStatus {
        self.view
    }

    /// Member count from the last NConnections broadcast
    pub fn n_connections(&self) -> u32 {
        self.n_connections
    }

    pub fn is_host(&self) -> bool {
        self.status == ConnectionStatus::Host
    }

    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    fn send(&self, frame: WireFrame) -> ParallaxResult<()> {
        self.outbox
            .send(frame)
            .map_err(|_| ParallaxError::ConnectionLost)
    }

    /// Ask the hub for hostship. Granted only if no peer holds it; denial
    /// arrives as an unchanged ConnectionStatus.
    pub fn request_hostship(&self) -> ParallaxResult<()> {
        if self.status == ConnectionStatus::Host {
            return Err(ParallaxError::AlreadyHost);
        }
        self.send(WireFrame::control(MessageType::HostshipRequest))
    }

    /// Give hostship up; the session becomes hostless
    pub fn resign_hostship(&self) -> ParallaxResult<()> {
        if self.status != ConnectionStatus::Host {
            return Err(ParallaxError::UnexpectedMessage(
                MessageType::HostshipResignation,
            ));
        }
        self.send(WireFrame::control(MessageType::HostshipResignation))
    }

    /// Render a locally driven camera while still consuming host state
    pub fn request_independent_view(&self) -> ParallaxResult<()> {
        self.send(WireFrame::control(MessageType::ViewRequest))
    }

    pub fn resign_independent_view(&self) -> ParallaxResult<()> {
        self.send(WireFrame::control(MessageType::ViewResignation))
    }

    /// Stop or resume consuming host snapshots entirely. Turning the
    /// independent session off makes the hub replay its cached snapshot so
    /// this peer resynchronizes in a single tick.
    pub fn set_independent_session(&mut self, independent: bool) -> ParallaxResult<()> {
        self.independent_session = independent;
        let ty = if independent {
            MessageType::IndependentSessionOn
        } else {
            MessageType::IndependentSessionOff
        };
        self.send(WireFrame::control(ty))
    }

    /// Forward a local camera nudge to the host as a request, never as
    /// authoritative state
    pub fn send_camera_request(&self, camera: &CameraState, now: f64) -> ParallaxResult<()> {
        let mut buf = SyncBuffer::new();
        camera.encode(&mut buf);
        let data = DataPayload::new(DataKind::Camera, now, buf.into_bytes());
        self.send(WireFrame::new(MessageType::Data, data.encode()))
    }

    /// Forward a local clock change to the host as a request
    pub fn send_time_request(&self, time: &TimeState, now: f64) -> ParallaxResult<()> {
        let mut buf = SyncBuffer::new();
        time.encode(&mut buf);
        let data = DataPayload::new(DataKind::Time, now, buf.into_bytes());
        self.send(WireFrame::new(MessageType::Data, data.encode()))
    }

    /// Queue a script on the host
    pub fn queue_script(&self, script: &str, now: f64) -> ParallaxResult<()> {
        let mut buf = SyncBuffer::new();
        buf.write_u32(1);
        buf.write_string(script);
        let data = DataPayload::new(DataKind::Script, now, buf.into_bytes());
        self.send(WireFrame::new(MessageType::Data, data.encode()))
    }

    /// Push a dataset to every instance in the session (and into the local
    /// store), outside the per-tick snapshot
    pub fn push_data(
        &self,
        identifier: &str,
        key: StoreKey,
        bytes: Vec<u8>,
    ) -> ParallaxResult<()> {
        let payload = StorePayload::new(identifier, key, bytes.clone());
        self.send(WireFrame::new(
            MessageType::IndependentData,
            payload.encode()?,
        ))?;
        self.store.store(identifier, key, bytes);
        Ok(())
    }

    /// Leave the session cleanly
    pub fn disconnect(&mut self) {
        if self.status == ConnectionStatus::Disconnected {
            return;
        }
        let _ = self.send(disconnect_frame(DisconnectReason::Bye, ""));
        self.teardown();
    }

    fn teardown(&mut self) {
        // Teardown is legal from every state
        self.status = ConnectionStatus::Disconnected;
        self.ingress.close();
    }

    /// Apply everything the network received since the last tick, in
    /// receipt order, then (as host) send this tick's snapshot. Call once
    /// per frame before any rendering or logic runs. `now` is the current
    /// simulation time, stamped on outgoing data.
    ///
    /// A protocol error tears the connection down and is returned: the
    /// caller must not render from the registry afterwards.
    pub fn pre_sync(
        &mut self,
        registry: &mut SyncRegistry,
        now: f64,
    ) -> ParallaxResult<Vec<SessionEvent>> {
        let mut events = Vec::new();

        while self.status != ConnectionStatus::Disconnected {
            let item = match self.ingress.try_pop() {
                Ok(Some(item)) => item,
                Ok(None) => break,
                Err(_) => {
                    self.teardown();
                    events.push(SessionEvent::ConnectionLost);
                    break;
                }
            };
            match item {
                TransportEvent::Frame(frame) => {
                    if let Err(e) = self.apply_frame(frame, registry, &mut events) {
                        let _ = self.send(disconnect_frame(
                            DisconnectReason::ProtocolViolation,
                            &e.to_string(),
                        ));
                        self.teardown();
                        return Err(e);
                    }
                }
                TransportEvent::Closed(e) => {
                    debug!(name = %self.name, "connection closed: {e}");
                    self.teardown();
                    events.push(SessionEvent::ConnectionLost);
                    break;
                }
            }
        }

        // Only the host emits authoritative state: one full snapshot per
        // tick, no diffing
        if self.status == ConnectionStatus::Host {
            let snapshot = registry.encode_snapshot();
            let data = DataPayload::new(DataKind::Snapshot, now, snapshot.into_bytes());
            if self
                .send(WireFrame::new(MessageType::Data, data.encode()))
                .is_err()
            {
                self.teardown();
                events.push(SessionEvent::ConnectionLost);
                return Err(ParallaxError::ConnectionLost);
            }
        }

        Ok(events)
    }

    fn apply_frame(
        &mut self,
        frame: WireFrame,
        registry: &mut SyncRegistry,
        events: &mut Vec<SessionEvent>,
    ) -> ParallaxResult<()> {
        match frame.message_type {
            MessageType::ConnectionStatus => {
                let status = StatusPayload::decode(&frame.payload)?.status;
                // A re-sent unchanged status (hostship denial) is a no-op
                if status != self.status {
                    self.status = self.status.transition(status)?;
                    events.push(SessionEvent::StatusChanged(status));
                }
                Ok(())
            }

            MessageType::Data => {
                let data = DataPayload::decode(&frame.payload)?;
                self.apply_data(data, registry)
            }

            MessageType::IndependentData => {
                let payload = StorePayload::decode(&frame.payload)?;
                self.store
                    .store(payload.identifier.clone(), payload.key, payload.bytes);
                events.push(SessionEvent::DataStored {
                    identifier: payload.identifier,
                    key: payload.key,
                });
                Ok(())
            }

            MessageType::ViewStatus => {
                let view = ViewPayload::decode(&frame.payload)?.view;
                self.view = view;
                events.push(SessionEvent::ViewChanged(view));
                Ok(())
            }

            MessageType::NConnections => {
                let count = CountPayload::decode(&frame.payload)?.n_connections;
                self.n_connections = count;
                events.push(SessionEvent::MemberCount(count));
                Ok(())
            }

            MessageType::Disconnection => {
                let payload = DisconnectPayload::decode(&frame.payload)?;
                if payload.reason.is_fatal() {
                    info!(name = %self.name, reason = ?payload.reason, "disconnected by hub");
                    self.teardown();
                    events.push(SessionEvent::Disconnected(payload.reason));
                } else {
                    events.push(SessionEvent::PeerLeft);
                }
                Ok(())
            }

            other => Err(ParallaxError::UnexpectedMessage(other)),
        }
    }

    fn apply_data(&mut self, data: DataPayload, registry: &mut SyncRegistry) -> ParallaxResult<()> {
        match data.kind {
            DataKind::Snapshot => {
                if self.status == ConnectionStatus::Host {
                    // The host's own state is the authority
                    return Err(ParallaxError::UnexpectedMessage(MessageType::Data));
                }
                if self.independent_session {
                    return Ok(());
                }
                let mut buf = SyncBuffer::from_bytes(data.payload);
                registry.apply_snapshot(&mut buf)
            }

            // Interaction requests are only meaningful on the host; the
            // hub routes them there, so anything else is a protocol error
            DataKind::Camera if self.status == ConnectionStatus::Host => {
                if let Some(camera) = registry.camera_mut() {
                    let mut buf = SyncBuffer::from_bytes(data.payload);
                    camera.decode(&mut buf)?;
                }
                Ok(())
            }

            DataKind::Time if self.status == ConnectionStatus::Host => {
                if let Some(time) = registry.time_mut() {
                    let mut buf = SyncBuffer::from_bytes(data.payload);
                    time.decode(&mut buf)?;
                }
                Ok(())
            }

            DataKind::Script if self.status == ConnectionStatus::Host => {
                if let Some(scripts) = registry.script_mut() {
                    let mut buf = SyncBuffer::from_bytes(data.payload);
                    scripts.decode(&mut buf)?;
                }
                Ok(())
            }

            _ => Err(ParallaxError::UnexpectedMessage(MessageType::Data)),
        }
    }
}
