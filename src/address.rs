//! Bluetooth device address used to tag discovered peers and connection targets.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Deref, DerefMut},
    str::FromStr,
};

use macaddr::MacAddr6;

/// A Bluetooth device address (BD_ADDR).
///
/// The serialized representation is a string in colon-hexadecimal notation.
/// The crate does not otherwise interpret this value — it is an opaque
/// handle used to tag scan results and connection targets.
#[derive(Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PeerAddress(pub [u8; 6]);

impl PeerAddress {
    /// Creates a new address with the specified value.
    pub const fn new(addr: [u8; 6]) -> Self {
        Self(addr)
    }

    /// The all-zero address, used as a placeholder.
    pub const fn any() -> Self {
        Self([0; 6])
    }
}

impl Deref for PeerAddress {
    type Target = [u8; 6];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for PeerAddress {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl Display for PeerAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl Debug for PeerAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl From<MacAddr6> for PeerAddress {
    fn from(addr: MacAddr6) -> Self {
        Self(addr.into_array())
    }
}

impl From<PeerAddress> for MacAddr6 {
    fn from(addr: PeerAddress) -> Self {
        addr.0.into()
    }
}

impl From<[u8; 6]> for PeerAddress {
    fn from(addr: [u8; 6]) -> Self {
        Self(addr)
    }
}

impl From<PeerAddress> for [u8; 6] {
    fn from(addr: PeerAddress) -> Self {
        addr.0
    }
}

/// Invalid peer address error, returned by [`PeerAddress::from_str`](FromStr::from_str).
#[derive(Debug, Clone)]
pub struct InvalidPeerAddress(pub String);

impl fmt::Display for InvalidPeerAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "invalid peer address: {}", &self.0)
    }
}

impl std::error::Error for InvalidPeerAddress {}

impl FromStr for PeerAddress {
    type Err = InvalidPeerAddress;

    fn from_str(s: &str) -> std::result::Result<Self, InvalidPeerAddress> {
        let fields = s
            .split(':')
            .map(|s| u8::from_str_radix(s, 16).map_err(|_| InvalidPeerAddress(s.to_string())))
            .collect::<std::result::Result<Vec<_>, InvalidPeerAddress>>()?;
        Ok(Self(fields.try_into().map_err(|_| InvalidPeerAddress(s.to_string()))?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_colon_hex() {
        let addr = PeerAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]);
        assert_eq!(addr.to_string(), "00:11:22:33:44:55");
    }

    #[test]
    fn round_trips_through_from_str() {
        let addr: PeerAddress = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(addr.0, [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
        assert_eq!(addr.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn rejects_malformed_input() {
        assert!("not-an-address".parse::<PeerAddress>().is_err());
    }
}
