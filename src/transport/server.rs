//! GATT server (peripheral) role (C5, §4.5).

use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    ble::GattServerBackend,
    codec::{AdminMessage, FiraConnectorCapabilities, FiraConnectorDataPacket, FiraConnectorMessage},
    error::{Error, ErrorKind, Result},
    events::TransportEvent,
    fragmentation::{InboundReassembly, OutboundQueue, ReassemblyOutcome},
    readiness::{Readiness, ReadinessEvent},
    uuids::{CCCD, CP_CAPABILITIES, CP_IN, CP_OUT},
};

const CONNECTED: usize = 0;
const CAPABILITIES_RECEIVED: usize = 1;
const NOTIFICATION_ENABLED: usize = 2;
const PRECONDITION_COUNT: usize = 3;

/// Outcome delivered to the upper layer by a running [`TransportServer`]
/// (§6 "Emitted by the core").
#[derive(Clone, Debug)]
pub enum ServerEvent {
    /// The connected client wrote new capabilities to `CP_CAPABILITIES`.
    CapabilitiesUpdated(FiraConnectorCapabilities),
    /// A fully reassembled message arrived from the client.
    MessageReceived {
        /// SECID the message was addressed to.
        secid: u8,
        /// The reassembled message.
        message: FiraConnectorMessage,
    },
    /// A reassembled message was recognised as an administrative message
    /// (§4.6).
    Admin {
        /// SECID the message was addressed to.
        secid: u8,
        /// The classified administrative message.
        message: AdminMessage,
    },
    /// The readiness conjunction became true (§4.7).
    ProcessingStarted,
    /// The readiness conjunction stopped being true (§4.7).
    ProcessingStopped,
}

enum Command {
    Start { reply: oneshot::Sender<Result<()>> },
    Stop { reply: oneshot::Sender<Result<()>> },
    SendMessage { secid: u8, message: FiraConnectorMessage, reply: oneshot::Sender<Result<()>> },
    SetCapabilities { caps: FiraConnectorCapabilities, reply: oneshot::Sender<Result<()>> },
    Backend(TransportEvent),
}

/// Hosts the FiRa Connector Primary GATT service for one connected client
/// (§4.5).
#[derive(Clone)]
pub struct TransportServer {
    commands: mpsc::UnboundedSender<Command>,
}

impl TransportServer {
    /// Spawns the reducer task for a server session, returning the handle
    /// and the stream of [`ServerEvent`]s it emits.
    pub fn new(
        backend: Arc<dyn GattServerBackend>, local_caps: FiraConnectorCapabilities,
    ) -> (Self, impl Stream<Item = ServerEvent>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = State {
            backend,
            readiness: Readiness::new(PRECONDITION_COUNT),
            outbound: OutboundQueue::new(),
            inbound: InboundReassembly::default(),
            local_caps,
            remote_caps: None,
            out_value: Vec::new(),
            events: events_tx,
            commands: commands_tx.clone(),
        };
        tokio::spawn(state.run(commands_rx));
        (Self { commands: commands_tx }, UnboundedReceiverStream::new(events_rx))
    }

    /// Begins hosting the service and accepting a client connection.
    pub async fn start(&self) -> Result<()> {
        self.call(|reply| Command::Start { reply }).await
    }

    /// Stops hosting the service, disconnecting any connected client and
    /// clearing both fragmentation queues.
    pub async fn stop(&self) -> Result<()> {
        self.call(|reply| Command::Stop { reply }).await
    }

    /// Validates readiness and size against the connected client's
    /// capabilities, then enqueues `message` for `secid`; if the outbound
    /// queue was empty, the first packet is loaded and notified immediately.
    pub async fn send_message(&self, secid: u8, message: FiraConnectorMessage) -> Result<()> {
        self.call(|reply| Command::SendMessage { secid, message, reply }).await
    }

    /// Updates the capabilities this endpoint uses to size its own outbound
    /// packets.
    pub async fn set_capabilities(&self, caps: FiraConnectorCapabilities) -> Result<()> {
        self.call(|reply| Command::SetCapabilities { caps, reply }).await
    }

    /// Feeds a BLE-originated event into the reducer. Called by the
    /// [`GattServerBackend`] via the channel given to
    /// [`GattServerBackend::serve`] — not normally called directly by
    /// application code.
    pub fn post_backend_event(&self, event: TransportEvent) {
        let _ = self.commands.send(Command::Backend(event));
    }

    async fn call(&self, make: impl FnOnce(oneshot::Sender<Result<()>>) -> Command) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .map_err(|_| Error::new(ErrorKind::RemoteDisconnected))?;
        reply_rx.await.map_err(|_| Error::new(ErrorKind::RemoteDisconnected))?
    }
}

struct State {
    backend: Arc<dyn GattServerBackend>,
    readiness: Readiness,
    outbound: OutboundQueue,
    inbound: InboundReassembly,
    local_caps: FiraConnectorCapabilities,
    remote_caps: Option<FiraConnectorCapabilities>,
    out_value: Vec<u8>,
    events: mpsc::UnboundedSender<ServerEvent>,
    commands: mpsc::UnboundedSender<Command>,
}

impl State {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Start { reply } => {
                    let _ = reply.send(self.handle_start().await);
                }
                Command::Stop { reply } => {
                    let _ = reply.send(self.handle_stop().await);
                }
                Command::SendMessage { secid, message, reply } => {
                    let _ = reply.send(self.handle_send_message(secid, message).await);
                }
                Command::SetCapabilities { caps, reply } => {
                    self.local_caps = caps;
                    let _ = reply.send(Ok(()));
                }
                Command::Backend(event) => self.handle_backend_event(event).await,
            }
        }
    }

    async fn handle_start(&mut self) -> Result<()> {
        let events = forwarding_channel(self.commands.clone());
        self.backend.serve(events).await.map_err(|e| Error::with_message(ErrorKind::RemoteDisconnected, e.0))
    }

    async fn handle_stop(&mut self) -> Result<()> {
        self.reset_session().await;
        self.backend.stop().await.map_err(|e| Error::with_message(ErrorKind::RemoteDisconnected, e.0))
    }

    async fn handle_send_message(&mut self, secid: u8, message: FiraConnectorMessage) -> Result<()> {
        if !self.readiness.is_ready() {
            return Err(Error::new(ErrorKind::NotReady));
        }
        let remote_limit = self
            .remote_caps
            .as_ref()
            .map(|c| c.max_message_buffer_size)
            .unwrap_or(self.local_caps.max_message_buffer_size);
        let bytes = message.encode();
        if bytes.len() as u32 > remote_limit as u32 {
            return Err(Error::new(ErrorKind::MessageTooLarge));
        }
        let was_empty = self.outbound.is_empty();
        self.outbound.push(secid, bytes);
        if was_empty {
            self.advance_outbound().await;
        }
        Ok(())
    }

    async fn handle_backend_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionStateChanged { connected: true } => {
                if let Some(e) = self.readiness.set(CONNECTED, true) {
                    self.deliver_readiness_event(e);
                }
            }
            TransportEvent::ConnectionStateChanged { connected: false } => {
                self.reset_session().await;
            }
            TransportEvent::IncomingWrite { uuid, value } if uuid == CP_CAPABILITIES => {
                match FiraConnectorCapabilities::decode(&value) {
                    Ok(caps) => {
                        self.remote_caps = Some(caps.clone());
                        if let Some(e) = self.readiness.set(CAPABILITIES_RECEIVED, true) {
                            self.deliver_readiness_event(e);
                        }
                        let _ = self.events.send(ServerEvent::CapabilitiesUpdated(caps));
                        let _ = self.backend.respond_write(CP_CAPABILITIES, true).await;
                    }
                    Err(err) => {
                        log::warn!("rejecting malformed capabilities write: {err}");
                        let _ = self.backend.respond_write(CP_CAPABILITIES, false).await;
                    }
                }
            }
            TransportEvent::IncomingWrite { uuid, value } if uuid == CP_IN => {
                let succeeded = self.accept_inbound_packet(&value);
                let _ = self.backend.respond_write(CP_IN, succeeded).await;
            }
            TransportEvent::IncomingWrite { .. } => {}
            TransportEvent::IncomingReadRequest { uuid } if uuid == CP_OUT => {
                let _ = self.backend.respond_read(CP_OUT, self.out_value.clone()).await;
                self.advance_outbound().await;
            }
            TransportEvent::IncomingReadRequest { .. } => {}
            TransportEvent::NotificationsEnabled { uuid, enabled } if uuid == CCCD => {
                if let Some(e) = self.readiness.set(NOTIFICATION_ENABLED, enabled) {
                    self.deliver_readiness_event(e);
                }
                if !enabled {
                    self.reset_session().await;
                }
            }
            TransportEvent::NotificationsEnabled { .. } => {}
            // Client-only variants; a server backend never emits these.
            TransportEvent::ServicesDiscovered
            | TransportEvent::ServiceDiscoveryFailed
            | TransportEvent::CharacteristicWritten { .. }
            | TransportEvent::CharacteristicWriteFailed { .. }
            | TransportEvent::DescriptorWritten { .. }
            | TransportEvent::DescriptorWriteFailed { .. }
            | TransportEvent::NotificationReceived { .. }
            | TransportEvent::MtuChanged { .. } => {}
        }
    }

    /// Feeds an incoming `CP_IN` write into the fragmentation engine.
    /// Returns whether the GATT response should report success.
    fn accept_inbound_packet(&mut self, packet_bytes: &[u8]) -> bool {
        let packet = match FiraConnectorDataPacket::decode(packet_bytes) {
            Ok(p) => p,
            Err(err) => {
                log::warn!("rejecting malformed data packet: {err}");
                return false;
            }
        };
        match self.inbound.accept(packet) {
            ReassemblyOutcome::Complete { secid, message } => {
                let event = match message.classify() {
                    Some(admin) => ServerEvent::Admin { secid, message: admin },
                    None => ServerEvent::MessageReceived { secid, message },
                };
                let _ = self.events.send(event);
                true
            }
            ReassemblyOutcome::Pending => true,
            ReassemblyOutcome::Dropped => false,
            ReassemblyOutcome::DecodeFailed(err) => {
                log::warn!("reassembled message failed to decode: {err}");
                false
            }
        }
    }

    async fn advance_outbound(&mut self) {
        let Some(packet) = self.outbound.next_packet(self.local_caps.optimized_data_packet_size) else { return };
        self.out_value = packet.encode();
        let _ = self.backend.notify(self.out_value.clone()).await;
    }

    async fn reset_session(&mut self) {
        self.outbound.clear();
        self.inbound.clear();
        self.remote_caps = None;
        self.out_value.clear();
        if let Some(e) = self.readiness.reset() {
            self.deliver_readiness_event(e);
        }
    }

    fn deliver_readiness_event(&self, event: ReadinessEvent) {
        let server_event = match event {
            ReadinessEvent::ProcessingStarted => ServerEvent::ProcessingStarted,
            ReadinessEvent::ProcessingStopped => ServerEvent::ProcessingStopped,
        };
        let _ = self.events.send(server_event);
    }
}

/// Adapts the command channel so it can be handed to a [`GattServerBackend`]
/// as a [`TransportEvent`] sink.
fn forwarding_channel(commands: mpsc::UnboundedSender<Command>) -> mpsc::UnboundedSender<TransportEvent> {
    let (tx, mut rx) = mpsc::unbounded_channel::<TransportEvent>();
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if commands.send(Command::Backend(event)).is_err() {
                break;
            }
        }
    });
    tx
}
