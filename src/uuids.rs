//! Fixed UUIDs of the FiRa Connector Primary (CP) GATT service.
//!
//! Service UUIDs in this family are 16-bit SIG-assigned numbers; characteristic
//! UUIDs are vendor 128-bit UUIDs with the 16-bit number spliced into the
//! Bluetooth base UUID, matching how the FiRa BLE OOB v1.0 spec enumerates them.

use uuid::{uuid, Uuid};

/// 16-bit service UUID of the FiRa Connector Primary service.
pub const FIRA_CP_SERVICE_UUID16: u16 = 0xFFF3;

fn from_short(short: u16) -> Uuid {
    Uuid::from_fields((short as u32) << 16 | 0x0000, 0x0000, 0x1000, &[0x80, 0x00, 0x00, 0x80, 0x5F, 0x9B, 0x34, 0xFB])
}

/// 128-bit UUID of the FiRa Connector Primary service, derived from the
/// Bluetooth base UUID and [`FIRA_CP_SERVICE_UUID16`].
pub fn fira_cp_service_uuid() -> Uuid {
    from_short(FIRA_CP_SERVICE_UUID16)
}

/// Characteristic written by the central to send data to the peripheral.
pub const CP_IN: Uuid = uuid!("2a00dead-0000-1000-8000-00805f9b34fb");

/// Characteristic read/notified by the peripheral to send data to the central.
pub const CP_OUT: Uuid = uuid!("2a01dead-0000-1000-8000-00805f9b34fb");

/// Characteristic used to exchange [`crate::codec::FiraConnectorCapabilities`].
pub const CP_CAPABILITIES: Uuid = uuid!("2a02dead-0000-1000-8000-00805f9b34fb");

/// Client Characteristic Configuration Descriptor UUID (notification enable flag).
pub const CCCD: Uuid = uuid!("00002902-0000-1000-8000-00805f9b34fb");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_uuid_embeds_the_16_bit_number() {
        let uuid = fira_cp_service_uuid();
        assert_eq!(&uuid.as_bytes()[0..2], &FIRA_CP_SERVICE_UUID16.to_be_bytes());
    }

    #[test]
    fn characteristic_uuids_are_distinct() {
        let all = [CP_IN, CP_OUT, CP_CAPABILITIES, CCCD];
        for (i, a) in all.iter().enumerate() {
            for (j, b) in all.iter().enumerate() {
                if i != j {
                    assert_ne!(a, b);
                }
            }
        }
    }
}
