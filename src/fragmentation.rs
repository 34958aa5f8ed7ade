//! Fragmentation and reassembly engine (§4.6, C6).
//!
//! Each transport endpoint owns one [`OutboundQueue`] and one
//! [`InboundReassembly`]; neither is shared, so there is no locking here —
//! whichever reducer task owns the endpoint is the only thing that ever
//! touches these queues (§5).

use std::collections::VecDeque;

use crate::codec::{DecodeError, FiraConnectorDataPacket, FiraConnectorMessage};

/// A message queued for outbound transmission, alongside the cursor marking
/// how much of it has already been packetized.
struct PendingMessage {
    secid: u8,
    bytes: Vec<u8>,
    cursor: usize,
}

/// Per-endpoint FIFO of messages awaiting packetization (§4.6 outbound).
#[derive(Default)]
pub struct OutboundQueue {
    pending: VecDeque<PendingMessage>,
}

impl OutboundQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` if there is no message waiting to be sent.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Enqueues a fully-encoded message addressed to `secid`.
    pub fn push(&mut self, secid: u8, bytes: Vec<u8>) {
        self.pending.push_back(PendingMessage { secid, bytes, cursor: 0 });
    }

    /// Dequeues the next data packet to submit to the transport, consuming
    /// up to `packet_size - 1` octets of payload from the head of the queue.
    /// Pops the head once it is fully consumed. Returns `None` if the queue
    /// is empty.
    ///
    /// `packet_size` is `optimizedDataPacketSize`; the packet header itself
    /// accounts for one of those octets.
    pub fn next_packet(&mut self, packet_size: u16) -> Option<FiraConnectorDataPacket> {
        let max_payload = (packet_size as usize).saturating_sub(crate::codec::HEADER_SIZE).max(1);
        let head = self.pending.front_mut()?;
        let remaining = head.bytes.len() - head.cursor;
        let take = remaining.min(max_payload);
        let payload = head.bytes[head.cursor..head.cursor + take].to_vec();
        head.cursor += take;
        let last_chaining_packet = head.cursor == head.bytes.len();
        let secid = head.secid;
        if last_chaining_packet {
            self.pending.pop_front();
        }
        // SECID is only ever populated by send_message after validating the
        // range (§4.4/§4.5), so this cannot fail in practice.
        FiraConnectorDataPacket::new(secid, last_chaining_packet, payload).ok()
    }

    /// Discards every queued message (`stop()`, §5).
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Per-endpoint inbound reassembly state, keyed by SECID (§4.6 inbound).
///
/// With the default `maxConcurrentFragmentedMessageSessionSupported = 1`
/// exactly one SECID may have an incomplete chain in flight; packets for any
/// other SECID are dropped while that chain is open.
pub struct InboundReassembly {
    max_concurrent_sessions: u8,
    sessions: Vec<(u8, Vec<FiraConnectorDataPacket>)>,
}

/// Outcome of feeding a single packet into [`InboundReassembly::accept`].
#[derive(Debug, Eq, PartialEq)]
pub enum ReassemblyOutcome {
    /// The chain for this SECID is still open; nothing to deliver yet.
    Pending,
    /// The chain completed and `secid`'s message is ready for delivery.
    Complete { secid: u8, message: FiraConnectorMessage },
    /// The packet's SECID conflicts with an in-flight chain (or would exceed
    /// `max_concurrent_sessions`) and was dropped; the existing queue is
    /// untouched.
    Dropped,
    /// The completed chain failed to decode as a [`FiraConnectorMessage`].
    DecodeFailed(DecodeError),
}

impl InboundReassembly {
    /// Creates a new reassembly state bounded to `max_concurrent_sessions`
    /// concurrent SECID chains.
    pub fn new(max_concurrent_sessions: u8) -> Self {
        Self { max_concurrent_sessions: max_concurrent_sessions.max(1), sessions: Vec::new() }
    }

    /// Feeds one newly-arrived data packet into the reassembly engine.
    pub fn accept(&mut self, packet: FiraConnectorDataPacket) -> ReassemblyOutcome {
        let existing = self.sessions.iter_mut().find(|(secid, _)| *secid == packet.secid);

        let queue = match existing {
            Some((_, queue)) => queue,
            None => {
                if self.sessions.len() >= self.max_concurrent_sessions as usize {
                    return ReassemblyOutcome::Dropped;
                }
                self.sessions.push((packet.secid, Vec::new()));
                &mut self.sessions.last_mut().unwrap().1
            }
        };

        let last = packet.last_chaining_packet;
        let secid = packet.secid;
        queue.push(packet);

        if !last {
            return ReassemblyOutcome::Pending;
        }

        let idx = self.sessions.iter().position(|(s, _)| *s == secid).unwrap();
        let (_, packets) = self.sessions.remove(idx);
        let bytes: Vec<u8> = packets.into_iter().flat_map(|p| p.payload).collect();
        match FiraConnectorMessage::decode(&bytes) {
            Ok(message) => ReassemblyOutcome::Complete { secid, message },
            Err(e) => ReassemblyOutcome::DecodeFailed(e),
        }
    }

    /// Discards every in-flight chain (`stop()`, §5).
    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

impl Default for InboundReassembly {
    fn default() -> Self {
        Self::new(1)
    }
}

/// Splits `message_bytes` into a chain of data packets addressed to `secid`,
/// each at most `packet_size` octets on the wire (§4.6, §8 fragmentation law).
pub fn fragment(secid: u8, message_bytes: &[u8], packet_size: u16) -> Vec<FiraConnectorDataPacket> {
    let mut queue = OutboundQueue::new();
    queue.push(secid, message_bytes.to_vec());
    let mut packets = Vec::new();
    while let Some(packet) = queue.next_packet(packet_size) {
        packets.push(packet);
    }
    packets
}
