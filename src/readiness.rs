//! Readiness state machine (§4.7, C7).
//!
//! `ready` is the conjunction of a small, fixed set of boolean preconditions
//! that differs between the client and server role (§4.4, §4.5). This module
//! captures the conjunction logic and the edge-triggered
//! `processing_started`/`processing_stopped` events once; [`TransportClient`]
//! and [`TransportServer`] each feed it their own preconditions.
//!
//! [`TransportClient`]: crate::transport::client::TransportClient
//! [`TransportServer`]: crate::transport::server::TransportServer

use strum::{Display, EnumString};

/// Reason a client transport session was torn down (§4.4).
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, EnumString)]
pub enum TerminationReason {
    /// The remote peer disconnected.
    RemoteDisconnected,
    /// GATT service discovery failed.
    ServiceDiscoveryFailure,
    /// Reading a GATT characteristic failed.
    CharacteristicReadFailure,
    /// Writing a GATT characteristic failed.
    CharacteristicWriteFailure,
    /// Writing a GATT descriptor failed.
    DescriptorWriteFailure,
}

/// Event emitted by [`Readiness`] on a precondition-set transition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReadinessEvent {
    /// The precondition set became fully true (false → true edge).
    ProcessingStarted,
    /// The precondition set stopped being fully true (true → false edge).
    ProcessingStopped,
}

/// Tracks the conjunction of an endpoint's readiness preconditions and
/// raises edge-triggered events as they change (§4.7).
///
/// Preconditions are identified by index rather than by name so that the
/// client (4 preconditions: connected, service discovered, capabilities
/// written, notifications enabled) and the server (3 preconditions:
/// connected, capabilities received, notifications enabled) can share one
/// implementation despite having a different precondition count.
#[derive(Debug)]
pub struct Readiness {
    preconditions: Vec<bool>,
    ready: bool,
}

impl Readiness {
    /// Creates a readiness tracker with `count` preconditions, all initially
    /// false.
    pub fn new(count: usize) -> Self {
        Self { preconditions: vec![false; count], ready: false }
    }

    /// `true` once every precondition is true.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Reads back a single precondition by the index passed to
    /// [`set`](Self::set).
    ///
    /// # Panics
    ///
    /// Panics if `index >= count` as passed to [`new`](Self::new).
    pub fn precondition(&self, index: usize) -> bool {
        self.preconditions[index]
    }

    /// Sets precondition `index` to `value`, returning the
    /// [`ReadinessEvent`] raised, if any.
    ///
    /// # Panics
    ///
    /// Panics if `index >= count` as passed to [`new`](Self::new) — this is
    /// a programming error in the caller, not a runtime condition.
    pub fn set(&mut self, index: usize, value: bool) -> Option<ReadinessEvent> {
        self.preconditions[index] = value;
        let now_ready = self.preconditions.iter().all(|p| *p);
        let event = match (self.ready, now_ready) {
            (false, true) => Some(ReadinessEvent::ProcessingStarted),
            (true, false) => Some(ReadinessEvent::ProcessingStopped),
            _ => None,
        };
        self.ready = now_ready;
        event
    }

    /// Resets every precondition to false, as if freshly constructed.
    /// Returns [`ReadinessEvent::ProcessingStopped`] if the endpoint was
    /// ready before the reset.
    pub fn reset(&mut self) -> Option<ReadinessEvent> {
        let was_ready = self.ready;
        self.preconditions.iter_mut().for_each(|p| *p = false);
        self.ready = false;
        was_ready.then_some(ReadinessEvent::ProcessingStopped)
    }
}

/// Tracks whether [`TerminationReason`] has already been reported for an
/// endpoint, making repeated `terminate()` calls idempotent (§4.7, §8
/// termination idempotence).
#[derive(Debug, Default)]
pub struct TerminationLatch {
    terminated: bool,
}

impl TerminationLatch {
    /// Creates a fresh, untripped latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Trips the latch and returns `Some(reason)` the first time it is
    /// called; every subsequent call returns `None` regardless of `reason`.
    pub fn terminate(&mut self, reason: TerminationReason) -> Option<TerminationReason> {
        if self.terminated {
            return None;
        }
        self.terminated = true;
        Some(reason)
    }

    /// `true` once [`terminate`](Self::terminate) has fired.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Client precondition indices: connected, serviceDiscovered,
    /// capabilitiesWritten, notificationEnabled.
    const CONNECTED: usize = 0;
    const SERVICE_DISCOVERED: usize = 1;
    const CAPABILITIES_WRITTEN: usize = 2;
    const NOTIFICATION_ENABLED: usize = 3;

    #[test]
    fn client_readiness_progression_emits_one_started_event() {
        let mut readiness = Readiness::new(4);
        assert_eq!(readiness.set(CONNECTED, true), None);
        assert_eq!(readiness.set(SERVICE_DISCOVERED, true), None);
        assert_eq!(readiness.set(CAPABILITIES_WRITTEN, true), None);
        assert_eq!(readiness.set(NOTIFICATION_ENABLED, true), Some(ReadinessEvent::ProcessingStarted));
        assert!(readiness.is_ready());

        assert_eq!(readiness.set(CONNECTED, false), Some(ReadinessEvent::ProcessingStopped));
        assert!(!readiness.is_ready());
    }

    #[test]
    fn redundant_transitions_emit_no_event() {
        let mut readiness = Readiness::new(1);
        assert_eq!(readiness.set(0, true), Some(ReadinessEvent::ProcessingStarted));
        assert_eq!(readiness.set(0, true), None);
        assert_eq!(readiness.set(0, false), Some(ReadinessEvent::ProcessingStopped));
        assert_eq!(readiness.set(0, false), None);
    }

    #[test]
    fn reset_stops_processing_exactly_once() {
        let mut readiness = Readiness::new(2);
        readiness.set(0, true);
        assert_eq!(readiness.set(1, true), Some(ReadinessEvent::ProcessingStarted));
        assert_eq!(readiness.reset(), Some(ReadinessEvent::ProcessingStopped));
        assert_eq!(readiness.reset(), None);
    }

    #[test]
    fn termination_is_idempotent() {
        let mut latch = TerminationLatch::new();
        assert_eq!(latch.terminate(TerminationReason::RemoteDisconnected), Some(TerminationReason::RemoteDisconnected));
        assert_eq!(latch.terminate(TerminationReason::ServiceDiscoveryFailure), None);
        assert!(latch.is_terminated());
    }
}
