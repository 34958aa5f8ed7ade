//! The narrow typed event enum every transport endpoint reduces over (§9).
//!
//! A real platform BLE binding fans out to dozens of delegate/callback
//! methods. Rather than mirror that surface, every [`GattClientBackend`] or
//! [`GattServerBackend`](crate::ble) re-posts what happened as one of these
//! variants onto the endpoint's event channel; one reducer loop per endpoint
//! then advances the readiness state machine and fragmentation engine in
//! the order the channel delivers them (§5).

use uuid::Uuid;

/// One BLE-driven occurrence, re-dispatched onto an endpoint's serial event
/// queue.
#[derive(Clone, Debug)]
pub enum TransportEvent {
    /// The underlying connection was established or dropped.
    ConnectionStateChanged {
        /// `true` if now connected.
        connected: bool,
    },
    /// GATT service discovery completed successfully (client only).
    ServicesDiscovered,
    /// GATT service discovery failed (client only).
    ServiceDiscoveryFailed,
    /// A characteristic write issued by this endpoint completed (client
    /// only; acknowledges a write this endpoint made as a GATT client).
    CharacteristicWritten {
        /// The characteristic that was written.
        uuid: Uuid,
    },
    /// A characteristic write issued by this endpoint failed (client only).
    CharacteristicWriteFailed {
        /// The characteristic whose write failed.
        uuid: Uuid,
    },
    /// A descriptor write issued by this endpoint completed (client only;
    /// used for the `CP_OUT` CCCD enable).
    DescriptorWritten {
        /// The descriptor that was written.
        uuid: Uuid,
    },
    /// A descriptor write issued by this endpoint failed (client only).
    DescriptorWriteFailed {
        /// The descriptor whose write failed.
        uuid: Uuid,
    },
    /// A notification arrived from the peer (client only; carries the
    /// `CP_OUT` value pushed by the server).
    NotificationReceived {
        /// The characteristic the notification was for.
        uuid: Uuid,
        /// The notified value.
        value: Vec<u8>,
    },
    /// The negotiated ATT MTU changed (client only, §4.4).
    MtuChanged {
        /// The new MTU.
        mtu: u16,
    },
    /// The remote GATT client wrote to one of our characteristics (server
    /// only; carries the written value).
    IncomingWrite {
        /// The characteristic that was written.
        uuid: Uuid,
        /// The value written.
        value: Vec<u8>,
    },
    /// The remote GATT client is reading one of our characteristics (server
    /// only; the endpoint responds with
    /// [`GattServerBackend::respond_read`](crate::ble::GattServerBackend::respond_read)).
    IncomingReadRequest {
        /// The characteristic being read.
        uuid: Uuid,
    },
    /// The remote GATT client enabled or disabled notifications by writing
    /// the CCCD (server only).
    NotificationsEnabled {
        /// The characteristic whose CCCD was written.
        uuid: Uuid,
        /// `true` if notifications are now enabled.
        enabled: bool,
    },
}
