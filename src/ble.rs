//! External collaborator contracts (§1, §6): the concrete BLE stack.
//!
//! This crate implements none of these traits. Doing so would mean binding
//! to one specific platform's Bluetooth stack — BlueZ, BlueDroid,
//! CoreBluetooth, or a vendor SoC's host controller interface — which §1
//! explicitly excludes. A consuming application supplies implementations
//! that talk to its platform's advertising, scanning and GATT APIs; the
//! `advertise`, `scan` and `transport` modules only drive them and reduce
//! over the [`TransportEvent`](crate::events::TransportEvent)s they report.

use std::{fmt, future::Future, pin::Pin};

use uuid::Uuid;

use crate::{address::PeerAddress, events::TransportEvent};

/// A future returned by a backend method, boxed because these traits are
/// used as `dyn` trait objects supplied by the caller.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque failure reported by a BLE backend operation.
///
/// The concrete BLE stack's own error type is not interpreted by this
/// crate beyond being logged and surfaced to the caller (§7) — only the
/// backend author knows what e.g. a BlueZ D-Bus error or a BlueDroid status
/// code actually means.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BackendError(pub String);

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BLE backend failure: {}", self.0)
    }
}

impl std::error::Error for BackendError {}

/// Result type returned by backend trait methods.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// One field of an advertising or scan response payload (§4.1, §4.2).
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdField {
    /// A 16-bit service UUID, complete list.
    ServiceUuid16(u16),
    /// Service data keyed by a 16-bit service UUID.
    ServiceData16 {
        /// The service UUID the data belongs to.
        uuid: u16,
        /// The service data octets.
        data: Vec<u8>,
    },
    /// Bluetooth SIG manufacturer-specific data.
    ManufacturerData {
        /// The assigned company identifier.
        company_id: u16,
        /// The manufacturer-specific octets.
        data: Vec<u8>,
    },
}

/// The advertising and scan response payloads an [`AdvertiseBackend`] should
/// broadcast (§4.1 Discovery Advertisement).
#[derive(Clone, Debug, Default)]
pub struct AdvertisingSet {
    /// Fields carried in the primary advertising payload.
    pub advertising_data: Vec<AdField>,
    /// Fields carried in the scan response payload, if the backend
    /// supports scannable advertising.
    pub scan_response_data: Vec<AdField>,
    /// Whether this advertisement should accept connection requests
    /// (always `true` for a FiRa Connector server, §4.2).
    pub connectable: bool,
}

/// Receives asynchronous advertise-stack status codes for an in-progress
/// advertisement (C2, §4.2).
///
/// Mirrors [`ScanObserver`]: the platform advertising API this crate does
/// not implement reports status out-of-band from the call that started
/// advertising (e.g. an "advertising stopped unexpectedly" callback, or a
/// raw controller status code on a failed restart), so it is delivered here
/// rather than through `start`'s return value.
pub trait AdvertiseObserver: Send + Sync {
    /// Reports a raw advertise-stack status code. The platform's
    /// success/failure encoding is passed through uninterpreted; the
    /// observer classifies which codes are failures worth surfacing.
    fn on_status(&self, code: u32);
}

/// Advertises a FiRa discovery payload over a platform's Bluetooth stack
/// (C2, §4.1).
///
/// A no-op implementation that always succeeds is valid for a peripheral
/// that is solely reached by direct connection; most servers will forward
/// to a real advertising API.
pub trait AdvertiseBackend: Send + Sync {
    /// Begins broadcasting `set`, replacing anything previously advertised,
    /// and reports subsequent status codes (including failed restarts) to
    /// `observer` until [`stop`](Self::stop) is called.
    fn start(&self, set: AdvertisingSet, observer: std::sync::Arc<dyn AdvertiseObserver>) -> BoxFuture<'_, BackendResult<()>>;

    /// Stops advertising. Idempotent: stopping an already-stopped
    /// advertisement succeeds.
    fn stop(&self) -> BoxFuture<'_, BackendResult<()>>;
}

/// Restricts which advertisements a [`ScanBackend`] reports (§4.3).
#[derive(Clone, Debug, Default)]
pub struct ScanFilter {
    /// Only report advertisements carrying this 16-bit service UUID.
    pub service_uuid16: Option<u16>,
    /// Only report advertisements at or above this RSSI, in dBm.
    pub rssi_threshold_dbm: Option<i8>,
}

/// One advertisement observed by a [`ScanBackend`], before FiRa decoding.
#[derive(Clone, Debug)]
pub struct RawScanResult {
    /// The advertiser's address.
    pub address: PeerAddress,
    /// Received signal strength, in dBm.
    pub rssi: i8,
    /// Service data keyed to the FiRa Connector service UUID, if present.
    pub fira_service_data: Option<Vec<u8>>,
    /// Manufacturer-specific data entries observed in the advertisement.
    pub manufacturer_data: Vec<(u16, Vec<u8>)>,
}

/// Receives results from an in-progress scan (C3, §4.3).
///
/// Implemented by [`ScanProvider`](crate::scan::ScanProvider); a
/// [`ScanBackend`] calls these methods as advertisements and scan failures
/// occur, from whatever task or callback context the platform API uses.
pub trait ScanObserver: Send + Sync {
    /// Reports one observed advertisement.
    fn on_result(&self, result: RawScanResult);
    /// Reports that scanning stopped unexpectedly.
    fn on_failure(&self, error: BackendError);
}

/// Scans for FiRa discovery advertisements over a platform's Bluetooth
/// stack (C3, §4.3).
pub trait ScanBackend: Send + Sync {
    /// Begins scanning with the given filters, reporting results to
    /// `observer` until [`stop`](Self::stop) is called.
    fn start(&self, filters: Vec<ScanFilter>, observer: std::sync::Arc<dyn ScanObserver>) -> BoxFuture<'_, BackendResult<()>>;

    /// Stops scanning. Idempotent.
    fn stop(&self) -> BoxFuture<'_, BackendResult<()>>;
}

/// Drives the GATT client role against one connected FiRa Connector server
/// (C4, §4.4).
///
/// Every asynchronous outcome — connection state changes, completed reads
/// and writes, notifications, MTU renegotiation — is reported by posting a
/// [`TransportEvent`] onto the channel handed to [`connect`](Self::connect),
/// not by a return value, since the platform API that drives this is itself
/// callback-shaped.
pub trait GattClientBackend: Send + Sync {
    /// Connects to `peer` and begins forwarding connection and GATT events
    /// to `events`.
    fn connect(&self, peer: PeerAddress, events: tokio::sync::mpsc::UnboundedSender<TransportEvent>) -> BoxFuture<'_, BackendResult<()>>;

    /// Disconnects from the peer.
    fn disconnect(&self) -> BoxFuture<'_, BackendResult<()>>;

    /// Discovers the FiRa Connector service and its characteristics.
    /// Completion is reported via [`TransportEvent::ServicesDiscovered`] or
    /// [`TransportEvent::ServiceDiscoveryFailed`].
    fn discover_services(&self) -> BoxFuture<'_, BackendResult<()>>;

    /// Writes `value` to the characteristic identified by `uuid`.
    /// Completion is reported via [`TransportEvent::CharacteristicWritten`]
    /// or [`TransportEvent::CharacteristicWriteFailed`].
    fn write_characteristic(&self, uuid: Uuid, value: Vec<u8>) -> BoxFuture<'_, BackendResult<()>>;

    /// Writes `value` to the descriptor identified by `uuid` (used to
    /// enable `CP_OUT` notifications via the CCCD). Completion is reported
    /// via [`TransportEvent::DescriptorWritten`] or
    /// [`TransportEvent::DescriptorWriteFailed`].
    fn write_descriptor(&self, uuid: Uuid, value: Vec<u8>) -> BoxFuture<'_, BackendResult<()>>;

    /// The currently negotiated ATT MTU, in octets.
    fn current_mtu(&self) -> u16;
}

/// Drives the GATT server (peripheral) role, exposing the FiRa Connector
/// service to a connected client (C5, §4.5).
///
/// Incoming writes, read requests and CCCD changes are reported by posting
/// a [`TransportEvent`] onto the channel handed to [`serve`](Self::serve).
pub trait GattServerBackend: Send + Sync {
    /// Begins exposing the FiRa Connector service and forwarding connection
    /// and GATT events to `events`.
    fn serve(&self, events: tokio::sync::mpsc::UnboundedSender<TransportEvent>) -> BoxFuture<'_, BackendResult<()>>;

    /// Stops exposing the service and disconnects any connected client.
    fn stop(&self) -> BoxFuture<'_, BackendResult<()>>;

    /// Responds to a pending read of `uuid` with `value`. The endpoint
    /// itself owns the buffered `CP_OUT` value (§9 design notes); the
    /// backend has no `setValue`-style step to keep in sync.
    fn respond_read(&self, uuid: Uuid, value: Vec<u8>) -> BoxFuture<'_, BackendResult<()>>;

    /// Pushes a notification of `value` for `CP_OUT` to the connected
    /// client, if notifications are enabled.
    fn notify(&self, value: Vec<u8>) -> BoxFuture<'_, BackendResult<()>>;

    /// Responds to a pending incoming write on `uuid` with `GATT_SUCCESS`
    /// (`success = true`) or `GATT_FAILURE`.
    fn respond_write(&self, uuid: Uuid, success: bool) -> BoxFuture<'_, BackendResult<()>>;

    /// The currently negotiated ATT MTU, in octets.
    fn current_mtu(&self) -> u16;
}
