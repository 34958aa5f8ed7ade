//! # fira-oob — FiRa BLE OOB v1.0 connector transport
//!
//! Out-of-band (OOB) discovery and parameter exchange for Ultra-Wideband
//! (UWB) ranging between two devices over Bluetooth Low Energy, following
//! the FiRa BLE OOB v1.0 specification. A device can advertise or scan for a
//! FiRa Connector service, connect to a peer, negotiate connector
//! capabilities, and exchange arbitrary FiRa Connector Messages — addressed
//! to Secure Component IDs ("SECIDs") — through two unidirectional byte
//! pipes backed by GATT characteristics.
//!
//! This crate does not talk to any concrete Bluetooth stack. Advertising,
//! scanning and GATT client/server operations are delegated to
//! [`AdvertiseBackend`](ble::AdvertiseBackend), [`ScanBackend`](ble::ScanBackend),
//! [`GattClientBackend`](ble::GattClientBackend) and
//! [`GattServerBackend`](ble::GattServerBackend) implementations supplied by
//! the caller — see [`ble`] for the contracts a platform binding (BlueZ,
//! BlueDroid, CoreBluetooth, ...) must satisfy.
//!
//! The following functionality is provided.
//!
//! * [discovery advertisement encoding and decoding](codec::DiscoveryAdvertisement)
//! * [connector capabilities negotiation](codec::FiraConnectorCapabilities)
//! * [advertising](advertise::AdvertiseProvider) and [scanning](scan::ScanProvider)
//!   for FiRa Connector peers
//! * [the GATT client (central) role](transport::TransportClient)
//! * [the GATT server (peripheral) role](transport::TransportServer)
//! * [fragmentation and reassembly](fragmentation) of messages across data packets
//! * [the readiness state machine](readiness) shared by both transport roles
//!
//! Each transport endpoint is driven by a single `tokio::spawn`ed reducer
//! task (§5 of the design notes): BLE callbacks are posted onto that task's
//! event channel rather than mutating state from whatever thread the
//! platform API calls back on, so the fragmentation queues and readiness
//! state machine never need a lock.

#![warn(missing_docs)]

pub mod address;
pub mod advertise;
pub mod ble;
pub mod codec;
pub mod error;
pub mod events;
pub mod fragmentation;
pub mod readiness;
pub mod scan;
pub mod transport;
pub mod uuids;

pub use address::PeerAddress;
pub use error::{Error, ErrorKind, Result};
