//! FiRa connector data packet codec (§3, §6).

use super::{ByteReader, DecodeError};

/// Size, in octets, of a data packet header.
pub const HEADER_SIZE: usize = 1;
const LAST_CHAINING_PACKET_BIT: u8 = 0b1000_0000;
const SECID_MASK: u8 = 0b0111_1111;

/// Lowest valid SECID. 0 and 1 are reserved.
pub const MIN_SECID: u8 = 2;
/// Highest valid SECID.
pub const MAX_SECID: u8 = 127;

/// A single FiRa Connector Data Packet: the unit carried over `CP_IN`/`CP_OUT`.
///
/// A [`FiraConnectorMessage`](super::FiraConnectorMessage) longer than one
/// packet's worth of payload is split into a chain of these by the
/// [fragmentation engine](crate::fragmentation); `last_chaining_packet`
/// marks the final packet in the chain.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FiraConnectorDataPacket {
    /// Secure Component ID this packet is addressed to (2..127).
    pub secid: u8,
    /// Set on the last packet of a chained message.
    pub last_chaining_packet: bool,
    /// Packet payload.
    pub payload: Vec<u8>,
}

impl FiraConnectorDataPacket {
    /// Builds a new data packet, validating the SECID range.
    pub fn new(secid: u8, last_chaining_packet: bool, payload: Vec<u8>) -> Result<Self, DecodeError> {
        if !(MIN_SECID..=MAX_SECID).contains(&secid) {
            return Err(DecodeError::InvalidSecid(secid));
        }
        Ok(Self { secid, last_chaining_packet, payload })
    }

    /// Total encoded length of this packet (header + payload).
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Encodes this packet to its wire format.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        let mut header = self.secid & SECID_MASK;
        if self.last_chaining_packet {
            header |= LAST_CHAINING_PACKET_BIT;
        }
        out.push(header);
        out.extend_from_slice(&self.payload);
        out
    }

    /// Decodes a packet from its wire format.
    pub fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(buf);
        let header = reader.u8()?;
        let secid = header & SECID_MASK;
        let last_chaining_packet = header & LAST_CHAINING_PACKET_BIT != 0;
        if !(MIN_SECID..=MAX_SECID).contains(&secid) {
            return Err(DecodeError::InvalidSecid(secid));
        }
        Ok(Self { secid, last_chaining_packet, payload: reader.rest().to_vec() })
    }
}
