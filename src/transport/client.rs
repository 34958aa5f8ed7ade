//! GATT client (central) role (C4, §4.4).

use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{
    address::PeerAddress,
    ble::GattClientBackend,
    codec::{AdminMessage, FiraConnectorCapabilities, FiraConnectorMessage},
    error::{Error, ErrorKind, Result},
    events::TransportEvent,
    fragmentation::{InboundReassembly, OutboundQueue, ReassemblyOutcome},
    readiness::{Readiness, ReadinessEvent, TerminationLatch, TerminationReason},
    uuids::{CCCD, CP_CAPABILITIES, CP_IN, CP_OUT},
};

const CONNECTED: usize = 0;
const SERVICE_DISCOVERED: usize = 1;
const CAPABILITIES_WRITTEN: usize = 2;
const NOTIFICATION_ENABLED: usize = 3;
const PRECONDITION_COUNT: usize = 4;

/// Value written to the CCCD to enable notifications (§4.4).
const CCCD_NOTIFICATIONS_ENABLED: [u8; 2] = [0x01, 0x00];

/// Outcome delivered to the upper layer by a running [`TransportClient`]
/// (§6 "Emitted by the core").
#[derive(Clone, Debug)]
pub enum ClientEvent {
    /// A fully reassembled message arrived from the server.
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
    /// The session was torn down; a fresh `start()` is required (§4.7, §5).
    Terminated(TerminationReason),
}

enum Command {
    Start { reply: oneshot::Sender<Result<()>> },
    Stop { reply: oneshot::Sender<Result<()>> },
    SendMessage { secid: u8, message: FiraConnectorMessage, reply: oneshot::Sender<Result<()>> },
    SetCapabilities { caps: FiraConnectorCapabilities, reply: oneshot::Sender<Result<()>> },
    Backend(TransportEvent),
}

/// Drives the GATT client role against one FiRa Connector server (§4.4).
///
/// Cloning shares the same underlying session: every clone enqueues onto the
/// same reducer task, which is the sole mutator of readiness and the
/// fragmentation queues (§5).
#[derive(Clone)]
pub struct TransportClient {
    commands: mpsc::UnboundedSender<Command>,
}

impl TransportClient {
    /// Spawns the reducer task for a session against `peer`, returning the
    /// handle and the stream of [`ClientEvent`]s it emits.
    pub fn new(
        backend: Arc<dyn GattClientBackend>, peer: PeerAddress, local_caps: FiraConnectorCapabilities,
    ) -> (Self, impl Stream<Item = ClientEvent>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = State {
            backend,
            peer,
            readiness: Readiness::new(PRECONDITION_COUNT),
            termination: TerminationLatch::new(),
            outbound: OutboundQueue::new(),
            inbound: InboundReassembly::new(local_caps.max_concurrent_fragmented_sessions),
            local_caps,
            events: events_tx,
            commands: commands_tx.clone(),
        };
        tokio::spawn(state.run(commands_rx));
        (Self { commands: commands_tx }, UnboundedReceiverStream::new(events_rx))
    }

    /// Opens a GATT connection to the peer. Idempotent if already connected.
    pub async fn start(&self) -> Result<()> {
        self.call(|reply| Command::Start { reply }).await
    }

    /// Disconnects, clears both fragmentation queues, and transitions to
    /// not-processing.
    pub async fn stop(&self) -> Result<()> {
        self.call(|reply| Command::Stop { reply }).await
    }

    /// Validates readiness and size, then enqueues `message` for `secid`;
    /// if the outbound queue was empty, transmission begins immediately.
    pub async fn send_message(&self, secid: u8, message: FiraConnectorMessage) -> Result<()> {
        self.call(|reply| Command::SendMessage { secid, message, reply }).await
    }

    /// Updates the locally advertised capabilities; if ready, writes them to
    /// the peer's capabilities characteristic immediately.
    pub async fn set_capabilities(&self, caps: FiraConnectorCapabilities) -> Result<()> {
        self.call(|reply| Command::SetCapabilities { caps, reply }).await
    }

    /// Feeds a BLE-originated event into the reducer. Called by the
    /// [`GattClientBackend`] via the channel given at connect time — not
    /// normally called directly by application code.
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
    backend: Arc<dyn GattClientBackend>,
    peer: PeerAddress,
    readiness: Readiness,
    termination: TerminationLatch,
    outbound: OutboundQueue,
    inbound: InboundReassembly,
    local_caps: FiraConnectorCapabilities,
    events: mpsc::UnboundedSender<ClientEvent>,
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
                    let _ = reply.send(self.handle_set_capabilities(caps).await);
                }
                Command::Backend(event) => self.handle_backend_event(event).await,
            }
        }
    }

    async fn handle_start(&mut self) -> Result<()> {
        if self.readiness.precondition(CONNECTED) {
            // Idempotent: reuse the existing handle.
            return Ok(());
        }
        let events = forwarding_channel(self.commands.clone());
        self.backend.connect(self.peer, events).await.map_err(|e| Error::with_message(ErrorKind::RemoteDisconnected, e.0))
    }

    async fn handle_stop(&mut self) -> Result<()> {
        self.outbound.clear();
        self.inbound.clear();
        if let Some(event) = self.readiness.reset() {
            self.deliver_readiness_event(event);
        }
        self.backend.disconnect().await.map_err(|e| Error::with_message(ErrorKind::RemoteDisconnected, e.0))
    }

    async fn handle_send_message(&mut self, secid: u8, message: FiraConnectorMessage) -> Result<()> {
        if !self.readiness.is_ready() {
            return Err(Error::new(ErrorKind::NotReady));
        }
        let bytes = message.encode();
        // The server never pushes its own capabilities back to the client
        // (`CP_CAPABILITIES` is write-only, §4.5), so the client has no
        // remote bound to check against and validates against its own.
        if bytes.len() as u32 > self.local_caps.max_message_buffer_size as u32 {
            return Err(Error::new(ErrorKind::MessageTooLarge));
        }
        let was_empty = self.outbound.is_empty();
        self.outbound.push(secid, bytes);
        if was_empty {
            self.advance_outbound().await;
        }
        Ok(())
    }

    async fn handle_set_capabilities(&mut self, caps: FiraConnectorCapabilities) -> Result<()> {
        self.local_caps = caps;
        if self.readiness.is_ready() {
            self.write_capabilities().await;
        }
        Ok(())
    }

    async fn handle_backend_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionStateChanged { connected: true } => {
                if let Some(e) = self.readiness.set(CONNECTED, true) {
                    self.deliver_readiness_event(e);
                }
                if let Err(err) = self.backend.discover_services().await {
                    log::warn!("discover_services failed immediately: {}", err.0);
                    self.terminate(TerminationReason::ServiceDiscoveryFailure).await;
                }
            }
            TransportEvent::ConnectionStateChanged { connected: false } => {
                self.terminate(TerminationReason::RemoteDisconnected).await;
            }
            TransportEvent::ServicesDiscovered => {
                if let Some(e) = self.readiness.set(SERVICE_DISCOVERED, true) {
                    self.deliver_readiness_event(e);
                }
                self.write_capabilities().await;
            }
            TransportEvent::ServiceDiscoveryFailed => {
                self.terminate(TerminationReason::ServiceDiscoveryFailure).await;
            }
            TransportEvent::CharacteristicWritten { uuid } if uuid == CP_CAPABILITIES => {
                if let Some(e) = self.readiness.set(CAPABILITIES_WRITTEN, true) {
                    self.deliver_readiness_event(e);
                }
                if let Err(err) = self.backend.write_descriptor(CCCD, CCCD_NOTIFICATIONS_ENABLED.to_vec()).await {
                    log::warn!("enabling CP_OUT notifications failed immediately: {}", err.0);
                    self.terminate(TerminationReason::DescriptorWriteFailure).await;
                }
            }
            TransportEvent::CharacteristicWritten { uuid } if uuid == CP_IN => {
                self.advance_outbound().await;
            }
            TransportEvent::CharacteristicWritten { .. } => {}
            TransportEvent::CharacteristicWriteFailed { .. } => {
                self.terminate(TerminationReason::CharacteristicWriteFailure).await;
            }
            TransportEvent::DescriptorWritten { uuid } if uuid == CCCD => {
                if let Some(e) = self.readiness.set(NOTIFICATION_ENABLED, true) {
                    self.deliver_readiness_event(e);
                }
            }
            TransportEvent::DescriptorWritten { .. } => {}
            TransportEvent::DescriptorWriteFailed { .. } => {
                self.terminate(TerminationReason::DescriptorWriteFailure).await;
            }
            TransportEvent::NotificationReceived { uuid, value } if uuid == CP_OUT => {
                self.accept_inbound_packet(&value);
            }
            TransportEvent::NotificationReceived { .. } => {}
            TransportEvent::MtuChanged { mtu } => {
                self.handle_mtu_changed(mtu).await;
            }
            // Server-only variants; a client backend never emits these.
            TransportEvent::IncomingWrite { .. }
            | TransportEvent::IncomingReadRequest { .. }
            | TransportEvent::NotificationsEnabled { .. } => {}
        }
    }

    fn accept_inbound_packet(&mut self, packet_bytes: &[u8]) {
        let packet = match crate::codec::FiraConnectorDataPacket::decode(packet_bytes) {
            Ok(p) => p,
            Err(err) => {
                log::warn!("dropping malformed data packet: {err}");
                return;
            }
        };
        match self.inbound.accept(packet) {
            ReassemblyOutcome::Complete { secid, message } => {
                let event = match message.classify() {
                    Some(admin) => ClientEvent::Admin { secid, message: admin },
                    None => ClientEvent::MessageReceived { secid, message },
                };
                let _ = self.events.send(event);
            }
            ReassemblyOutcome::DecodeFailed(err) => {
                log::warn!("reassembled message failed to decode: {err}");
            }
            ReassemblyOutcome::Pending | ReassemblyOutcome::Dropped => {}
        }
    }

    async fn handle_mtu_changed(&mut self, mtu: u16) {
        let new_packet_size = mtu.saturating_sub(3);
        if new_packet_size != self.local_caps.optimized_data_packet_size {
            self.local_caps = self.local_caps.with_mtu(mtu);
            if self.readiness.is_ready() {
                self.write_capabilities().await;
            }
        }
    }

    async fn write_capabilities(&mut self) {
        if let Err(err) = self.backend.write_characteristic(CP_CAPABILITIES, self.local_caps.encode()).await {
            log::warn!("writing capabilities failed immediately: {}", err.0);
            self.terminate(TerminationReason::CharacteristicWriteFailure).await;
        }
    }

    async fn advance_outbound(&mut self) {
        let Some(packet) = self.outbound.next_packet(self.local_caps.optimized_data_packet_size) else { return };
        if let Err(err) = self.backend.write_characteristic(CP_IN, packet.encode()).await {
            log::warn!("writing CP_IN failed immediately: {}", err.0);
            self.terminate(TerminationReason::CharacteristicWriteFailure).await;
        }
    }

    async fn terminate(&mut self, reason: TerminationReason) {
        if let Some(reason) = self.termination.terminate(reason) {
            self.outbound.clear();
            self.inbound.clear();
            if let Some(e) = self.readiness.reset() {
                self.deliver_readiness_event(e);
            }
            let _ = self.backend.disconnect().await;
            let _ = self.events.send(ClientEvent::Terminated(reason));
        }
    }

    fn deliver_readiness_event(&self, event: ReadinessEvent) {
        let client_event = match event {
            ReadinessEvent::ProcessingStarted => ClientEvent::ProcessingStarted,
            ReadinessEvent::ProcessingStopped => ClientEvent::ProcessingStopped,
        };
        let _ = self.events.send(client_event);
    }
}

/// Adapts the command channel so it can be handed to a [`GattClientBackend`]
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

#[cfg(test)]
mod tests {
    use std::{
        pin::Pin,
        sync::{
            atomic::{AtomicU16, Ordering},
            Mutex,
        },
    };

    use futures::StreamExt;
    use uuid::Uuid;

    use super::*;
    use crate::codec::{FiraConnectorDataPacket, InstructionCode, MessageType};

    /// Records every characteristic/descriptor write so a test can inspect
    /// what the reducer asked the backend to do, without a real GATT stack.
    struct FakeGattClientBackend {
        writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
        disconnects: Mutex<u32>,
        mtu: AtomicU16,
    }

    impl FakeGattClientBackend {
        fn new() -> Self {
            Self { writes: Mutex::new(Vec::new()), disconnects: Mutex::new(0), mtu: AtomicU16::new(23) }
        }

        fn writes_to(&self, uuid: Uuid) -> Vec<Vec<u8>> {
            self.writes.lock().unwrap().iter().filter(|(u, _)| *u == uuid).map(|(_, v)| v.clone()).collect()
        }
    }

    impl GattClientBackend for FakeGattClientBackend {
        fn connect(&self, _peer: PeerAddress, _events: mpsc::UnboundedSender<TransportEvent>) -> crate::ble::BoxFuture<'_, crate::ble::BackendResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn disconnect(&self) -> crate::ble::BoxFuture<'_, crate::ble::BackendResult<()>> {
            *self.disconnects.lock().unwrap() += 1;
            Box::pin(async { Ok(()) })
        }

        fn discover_services(&self) -> crate::ble::BoxFuture<'_, crate::ble::BackendResult<()>> {
            Box::pin(async { Ok(()) })
        }

        fn write_characteristic(&self, uuid: Uuid, value: Vec<u8>) -> crate::ble::BoxFuture<'_, crate::ble::BackendResult<()>> {
            self.writes.lock().unwrap().push((uuid, value));
            Box::pin(async { Ok(()) })
        }

        fn write_descriptor(&self, uuid: Uuid, value: Vec<u8>) -> crate::ble::BoxFuture<'_, crate::ble::BackendResult<()>> {
            self.writes.lock().unwrap().push((uuid, value));
            Box::pin(async { Ok(()) })
        }

        fn current_mtu(&self) -> u16 {
            self.mtu.load(Ordering::SeqCst)
        }
    }

    /// Drives a fresh client through the full startup sequence (§4.4) up to
    /// `ProcessingStarted`, simulating the backend's completion callbacks by
    /// hand since no real GATT stack is present.
    async fn ready_client() -> (TransportClient, Arc<FakeGattClientBackend>, Pin<Box<dyn Stream<Item = ClientEvent>>>) {
        let backend = Arc::new(FakeGattClientBackend::new());
        let (client, events) = TransportClient::new(backend.clone(), PeerAddress::any(), FiraConnectorCapabilities::default());
        let mut events: Pin<Box<dyn Stream<Item = ClientEvent>>> = Box::pin(events);

        client.start().await.unwrap();
        client.post_backend_event(TransportEvent::ConnectionStateChanged { connected: true });
        client.post_backend_event(TransportEvent::ServicesDiscovered);
        client.post_backend_event(TransportEvent::CharacteristicWritten { uuid: CP_CAPABILITIES });
        client.post_backend_event(TransportEvent::DescriptorWritten { uuid: CCCD });

        assert!(matches!(events.next().await, Some(ClientEvent::ProcessingStarted)));
        (client, backend, events)
    }

    #[tokio::test]
    async fn startup_sequence_writes_capabilities_then_enables_notifications() {
        let (_client, backend, _events) = ready_client().await;
        assert_eq!(backend.writes_to(CP_CAPABILITIES), vec![FiraConnectorCapabilities::default().encode()]);
        assert_eq!(backend.writes_to(CCCD), vec![CCCD_NOTIFICATIONS_ENABLED.to_vec()]);
    }

    #[tokio::test]
    async fn disconnect_stops_processing_and_terminates() {
        let (client, backend, mut events) = ready_client().await;

        client.post_backend_event(TransportEvent::ConnectionStateChanged { connected: false });

        assert!(matches!(events.next().await, Some(ClientEvent::ProcessingStopped)));
        assert!(matches!(events.next().await, Some(ClientEvent::Terminated(TerminationReason::RemoteDisconnected))));
        assert_eq!(*backend.disconnects.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn send_message_round_trips_through_a_single_data_packet() {
        let (client, backend, _events) = ready_client().await;
        let message =
            FiraConnectorMessage { message_type: MessageType::Command, instruction_code: InstructionCode::DataExchange, payload: vec![0xAA, 0xBB] };

        client.send_message(7, message.clone()).await.unwrap();

        let expected = FiraConnectorDataPacket::new(7, true, message.encode()).unwrap().encode();
        assert_eq!(backend.writes_to(CP_IN), vec![expected]);
    }

    #[tokio::test]
    async fn send_message_rejects_oversized_payload() {
        let (client, _backend, _events) = ready_client().await;
        let oversized = vec![0u8; FiraConnectorCapabilities::default().max_message_buffer_size as usize + 1];
        let message = FiraConnectorMessage { message_type: MessageType::Command, instruction_code: InstructionCode::DataExchange, payload: oversized };

        let err = client.send_message(7, message).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MessageTooLarge);
    }

    #[tokio::test]
    async fn mtu_change_rewrites_capabilities_with_the_new_packet_size() {
        let (client, backend, _events) = ready_client().await;
        backend.mtu.store(247, Ordering::SeqCst);

        client.post_backend_event(TransportEvent::MtuChanged { mtu: 247 });

        let rewritten = backend.writes_to(CP_CAPABILITIES);
        let last = rewritten.last().expect("capabilities rewritten after MTU change");
        let decoded = FiraConnectorCapabilities::decode(last).unwrap();
        assert_eq!(decoded.optimized_data_packet_size, 244);
    }
}
