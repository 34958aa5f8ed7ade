//! Transport endpoints: the GATT client (C4) and server (C5) roles.
//!
//! Both roles are driven the same way (§5): a bounded channel of
//! [`TransportEvent`](crate::events::TransportEvent)s owned by the endpoint,
//! drained by one `tokio::spawn`ed reducer task that is the sole mutator of
//! the endpoint's [`Readiness`](crate::readiness::Readiness),
//! [`OutboundQueue`](crate::fragmentation::OutboundQueue) and
//! [`InboundReassembly`](crate::fragmentation::InboundReassembly). A
//! [`GattClientBackend`](crate::ble::GattClientBackend) or
//! [`GattServerBackend`](crate::ble::GattServerBackend) posts onto that
//! channel from whatever context the platform API calls back on; ordering
//! within one endpoint is therefore the channel's FIFO order, and no lock is
//! ever taken on the state it protects.

pub mod client;
pub mod server;

pub use client::TransportClient;
pub use server::TransportServer;
