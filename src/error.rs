//! Crate-wide error and result types.

use std::fmt;

use strum::EnumString;

/// Result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// An error returned by the FiRa Connector transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    /// Error kind.
    pub kind: ErrorKind,
    /// Additional detail, if any was provided by the failing operation.
    pub message: String,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind) -> Self {
        Self { kind, message: String::new() }
    }

    pub(crate) fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

/// Kind of transport error.
#[derive(Clone, Debug, displaydoc::Display, Eq, PartialEq, EnumString)]
#[non_exhaustive]
pub enum ErrorKind {
    /// the remote peer disconnected
    RemoteDisconnected,
    /// GATT service discovery failed
    ServiceDiscoveryFailure,
    /// reading a GATT characteristic failed
    CharacteristicReadFailure,
    /// writing a GATT characteristic failed
    CharacteristicWriteFailure,
    /// writing a GATT descriptor failed
    DescriptorWriteFailure,
    /// the endpoint is not ready to send messages
    NotReady,
    /// the message exceeds the peer's maximum message buffer size
    MessageTooLarge,
    /// the requested SECID is outside the valid range 2..127
    InvalidSecid,
    /// the underlying BLE backend reported a failure: {0}
    #[strum(disabled)]
    BackendFailure(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", &self.kind)
        } else {
            write!(f, "{}: {}", &self.kind, &self.message)
        }
    }
}

impl std::error::Error for Error {}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}
