//! Byte codecs for the wire formats defined by FiRa BLE OOB v1.0.
//!
//! Every format in this module is a small, fixed or TLV-framed binary layout;
//! none of it benefits from a general-purpose serialization framework, so
//! each type hand-rolls `encode`/`decode` the way the rest of this crate's
//! GATT-adjacent stack hand-rolls its wire parsing.

mod capabilities;
mod discovery;
mod message;
mod packet;

pub use capabilities::{FiraConnectorCapabilities, SecureComponentInfo};
pub use discovery::{DiscoveryAdvertisement, RegulatoryInfo, UwbIndicationData, VendorSpecificData};
pub use message::{
    AdminErrorCode, AdminErrorMessage, AdminEventCode, AdminEventMessage, AdminMessage, FiraConnectorMessage,
    InstructionCode, MessageType,
};
pub use packet::{FiraConnectorDataPacket, HEADER_SIZE, MAX_SECID, MIN_SECID};

use std::fmt;

/// Error produced while decoding a FiRa wire format.
#[derive(Clone, Debug, displaydoc::Display, Eq, PartialEq)]
#[non_exhaustive]
pub enum DecodeError {
    /// field claims {needed} bytes of payload but only {available} remain
    TruncatedField { needed: usize, available: usize },
    /// field type {0} appeared more than once in the advertisement
    DuplicateField(u8),
    /// field type {0} is not a recognised FiRa discovery field
    UnknownFieldType(u8),
    /// vendor-specific data was present in both service data and manufacturer data
    VendorDataInBothPlaces,
    /// buffer is too short: needed at least {needed} bytes, got {available}
    TooShort { needed: usize, available: usize },
    /// secid {0} is outside the valid range 2..127
    InvalidSecid(u8),
    /// protocol version major must be >= 1, got {0}
    InvalidProtocolVersion(u8),
    /// optimizedDataPacketSize must be >= 1
    InvalidDataPacketSize,
    /// maxMessageBufferSize must be >= 263, got {0}
    InvalidMessageBufferSize(u16),
    /// maxConcurrentFragmentedSessions must be >= 1
    InvalidConcurrentSessionCount,
    /// message type {0} is not a recognised FiRa connector message type
    InvalidMessageType(u8),
}

impl std::error::Error for DecodeError {}

pub(crate) struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn u8(&mut self) -> Result<u8, DecodeError> {
        self.take(1).map(|b| b[0])
    }

    pub(crate) fn u16_be(&mut self) -> Result<u16, DecodeError> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::TooShort { needed: n, available: self.remaining() });
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

impl fmt::Debug for ByteReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ByteReader {{ pos: {}, len: {} }}", self.pos, self.buf.len())
    }
}
