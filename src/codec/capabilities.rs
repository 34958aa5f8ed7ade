//! FiRa connector capabilities codec (§3, §6).

use super::{ByteReader, DecodeError};

/// Default `optimizedDataPacketSize` when unspecified.
pub const DEFAULT_OPTIMIZED_DATA_PACKET_SIZE: u16 = 20;
/// Default `maxMessageBufferSize` when unspecified.
pub const DEFAULT_MAX_MESSAGE_BUFFER_SIZE: u16 = 263;
/// Default `maxConcurrentFragmentedSessions` when unspecified.
pub const DEFAULT_MAX_CONCURRENT_FRAGMENTED_SESSIONS: u8 = 1;
/// Minimum permitted `maxMessageBufferSize` (§3 invariant).
pub const MIN_MAX_MESSAGE_BUFFER_SIZE: u16 = 263;

/// A secure component hosted behind a SECID, advertised as part of
/// [`FiraConnectorCapabilities`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SecureComponentInfo {
    /// Secure Component ID (2..127).
    pub secid: u8,
    /// Vendor-defined secure component type.
    pub secure_component_type: u8,
}

impl SecureComponentInfo {
    const WIRE_SIZE: usize = 2;

    fn encode(&self, out: &mut Vec<u8>) {
        out.push(self.secid);
        out.push(self.secure_component_type);
    }

    fn decode(reader: &mut ByteReader<'_>) -> Result<Self, DecodeError> {
        let secid = reader.u8()?;
        let secure_component_type = reader.u8()?;
        Ok(Self { secid, secure_component_type })
    }
}

/// Connector capabilities negotiated between the two endpoints of a FiRa
/// Connector session (§3).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FiraConnectorCapabilities {
    /// Protocol version `(major, minor)`. `major` must be >= 1.
    pub protocol_version: (u8, u8),
    /// Maximum size, in octets, of a single FiRa Connector Data Packet.
    pub optimized_data_packet_size: u16,
    /// Maximum size, in octets, of a reassembled FiRa Connector Message.
    pub max_message_buffer_size: u16,
    /// Maximum number of SECIDs that may have a fragmented message in flight
    /// concurrently.
    pub max_concurrent_fragmented_sessions: u8,
    /// Secure components hosted behind this endpoint.
    pub secure_components: Vec<SecureComponentInfo>,
}

impl Default for FiraConnectorCapabilities {
    fn default() -> Self {
        Self {
            protocol_version: (1, 0),
            optimized_data_packet_size: DEFAULT_OPTIMIZED_DATA_PACKET_SIZE,
            max_message_buffer_size: DEFAULT_MAX_MESSAGE_BUFFER_SIZE,
            max_concurrent_fragmented_sessions: DEFAULT_MAX_CONCURRENT_FRAGMENTED_SESSIONS,
            secure_components: Vec::new(),
        }
    }
}

impl FiraConnectorCapabilities {
    /// Encodes these capabilities to their wire format (§6).
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(7 + self.secure_components.len() * SecureComponentInfo::WIRE_SIZE);
        out.push(self.protocol_version.0);
        out.push(self.protocol_version.1);
        out.extend_from_slice(&self.optimized_data_packet_size.to_be_bytes());
        out.extend_from_slice(&self.max_message_buffer_size.to_be_bytes());
        out.push(self.max_concurrent_fragmented_sessions);
        for sc in &self.secure_components {
            sc.encode(&mut out);
        }
        out
    }

    /// Decodes capabilities from their wire format, validating the
    /// invariants in §3.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(buf);
        let major = reader.u8()?;
        let minor = reader.u8()?;
        if major < 1 {
            return Err(DecodeError::InvalidProtocolVersion(major));
        }
        let optimized_data_packet_size = reader.u16_be()?;
        if optimized_data_packet_size < 1 {
            return Err(DecodeError::InvalidDataPacketSize);
        }
        let max_message_buffer_size = reader.u16_be()?;
        if max_message_buffer_size < MIN_MAX_MESSAGE_BUFFER_SIZE {
            return Err(DecodeError::InvalidMessageBufferSize(max_message_buffer_size));
        }
        let max_concurrent_fragmented_sessions = reader.u8()?;
        if max_concurrent_fragmented_sessions < 1 {
            return Err(DecodeError::InvalidConcurrentSessionCount);
        }

        let mut secure_components = Vec::new();
        while !reader.is_empty() {
            secure_components.push(SecureComponentInfo::decode(&mut reader)?);
        }

        Ok(Self {
            protocol_version: (major, minor),
            optimized_data_packet_size,
            max_message_buffer_size,
            max_concurrent_fragmented_sessions,
            secure_components,
        })
    }

    /// Returns a copy of these capabilities with `optimized_data_packet_size`
    /// recomputed from a new ATT MTU (`mtu - 3`, §4.4 MTU-change handling).
    pub fn with_mtu(&self, mtu: u16) -> Self {
        Self { optimized_data_packet_size: mtu.saturating_sub(3), ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_capabilities_encode_to_the_spec_literal() {
        let caps = FiraConnectorCapabilities::default();
        assert_eq!(caps.encode(), vec![0x01, 0x00, 0x00, 0x14, 0x01, 0x07, 0x01]);
    }

    #[test]
    fn default_capabilities_round_trip() {
        let caps = FiraConnectorCapabilities::default();
        assert_eq!(FiraConnectorCapabilities::decode(&caps.encode()).unwrap(), caps);
    }

    #[test]
    fn round_trips_with_secure_components() {
        let caps = FiraConnectorCapabilities {
            protocol_version: (1, 2),
            optimized_data_packet_size: 247,
            max_message_buffer_size: 4096,
            max_concurrent_fragmented_sessions: 3,
            secure_components: vec![
                SecureComponentInfo { secid: 2, secure_component_type: 1 },
                SecureComponentInfo { secid: 5, secure_component_type: 2 },
            ],
        };
        assert_eq!(FiraConnectorCapabilities::decode(&caps.encode()).unwrap(), caps);
    }

    #[test]
    fn rejects_protocol_version_major_zero() {
        let err = FiraConnectorCapabilities::decode(&[0x00, 0x00, 0x00, 0x14, 0x01, 0x07, 0x01]).unwrap_err();
        assert_eq!(err, DecodeError::InvalidProtocolVersion(0));
    }

    #[test]
    fn rejects_undersized_message_buffer() {
        let err = FiraConnectorCapabilities::decode(&[0x01, 0x00, 0x00, 0x14, 0x00, 0x10, 0x01]).unwrap_err();
        assert_eq!(err, DecodeError::InvalidMessageBufferSize(0x0010));
    }

    #[test]
    fn mtu_change_recomputes_packet_size() {
        let caps = FiraConnectorCapabilities::default();
        let updated = caps.with_mtu(247);
        assert_eq!(updated.optimized_data_packet_size, 244);
    }
}
