//! Discovery advertisement TLV codec (§4.1).

use super::{ByteReader, DecodeError};

const FIELD_UWB_INDICATION: u8 = 1;
const FIELD_VENDOR_SPECIFIC: u8 = 2;
const FIELD_REGULATORY_INFO: u8 = 3;
const FIELD_PROFILE_SUPPORT: u8 = 4;

/// UWB indication data field, carried in the discovery advertisement.
///
/// The layout beyond the RSSI threshold is left to the caller: this crate
/// only interprets the one field it needs for scan gating (§4.3 step 4) and
/// otherwise treats the payload as an opaque blob so callers can extend it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UwbIndicationData {
    /// Raw field payload.
    pub payload: Vec<u8>,
}

impl UwbIndicationData {
    /// The RSSI threshold (dBm) below which a scan result should be ignored,
    /// taken from the first payload octet interpreted as a signed value.
    /// `-128` means "accept unconditionally" (§4.3 step 4).
    pub fn bluetooth_rssi_threshold_dbm(&self) -> i8 {
        self.payload.first().copied().map(|b| b as i8).unwrap_or(-128)
    }
}

/// Regulatory information field.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RegulatoryInfo {
    /// Raw field payload.
    pub payload: Vec<u8>,
}

/// FiRa profile support information field.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FiraProfileSupportInfo {
    /// Raw field payload.
    pub payload: Vec<u8>,
}

/// Vendor-specific data, either carried in the service-data TLV stream or as
/// a separate BLE Manufacturer-Specific Data AD entry (never both; see
/// [`DecodeError::VendorDataInBothPlaces`]).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VendorSpecificData {
    /// Bluetooth SIG-assigned company identifier this entry is keyed by.
    pub vendor_id: u16,
    /// Vendor-defined payload.
    pub payload: Vec<u8>,
}

/// Aggregate of the FiRa-specific fields parsed from a service-data TLV
/// stream (§3, §4.1).
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiscoveryAdvertisement {
    /// UWB indication data, if present.
    pub uwb_indication_data: Option<UwbIndicationData>,
    /// Regulatory information, if present.
    pub regulatory_info: Option<RegulatoryInfo>,
    /// FiRa profile support information, if present.
    pub profile_support_info: Option<FiraProfileSupportInfo>,
    /// Vendor-specific entries. May be empty, and may originate from either
    /// the service-data stream or Manufacturer-Specific Data AD entries
    /// depending on how [`decode`](Self::decode) was called.
    pub vendor_specific_data: Vec<VendorSpecificData>,
}

impl DiscoveryAdvertisement {
    /// Encodes this advertisement as a service-data TLV stream.
    ///
    /// Fields are emitted in the order UwbIndicationData, RegulatoryInfo,
    /// FiraProfileSupportInfo, then vendor-specific entries if
    /// `include_vendor` is set. When `include_vendor` is `false`, vendor data
    /// is omitted entirely — the caller is expected to carry it as separate
    /// Manufacturer-Specific Data AD entries instead (§4.2).
    ///
    /// Each field's payload must be at most 15 octets (the TLV length nibble
    /// is 4 bits wide); longer payloads are truncated by the caller before
    /// encoding, since this format has no continuation mechanism.
    pub fn encode(&self, include_vendor: bool) -> Vec<u8> {
        let mut out = Vec::new();
        if let Some(f) = &self.uwb_indication_data {
            encode_field(&mut out, FIELD_UWB_INDICATION, &f.payload);
        }
        if let Some(f) = &self.regulatory_info {
            encode_field(&mut out, FIELD_REGULATORY_INFO, &f.payload);
        }
        if let Some(f) = &self.profile_support_info {
            encode_field(&mut out, FIELD_PROFILE_SUPPORT, &f.payload);
        }
        if include_vendor {
            for v in &self.vendor_specific_data {
                encode_field(&mut out, FIELD_VENDOR_SPECIFIC, &v.payload);
            }
        }
        out
    }

    /// Decodes a service-data TLV stream into an advertisement.
    ///
    /// `manufacturer_vendor_data` is the set of vendor entries the caller
    /// separately observed as Manufacturer-Specific Data AD objects, keyed by
    /// `vendorId`. If both this stream contains vendor-specific fields *and*
    /// `manufacturer_vendor_data` is non-empty, decoding fails with
    /// [`DecodeError::VendorDataInBothPlaces`] (§4.1 rule 5); otherwise the
    /// two sources are merged into [`DiscoveryAdvertisement::vendor_specific_data`].
    pub fn decode(
        service_data: &[u8], manufacturer_vendor_data: &[VendorSpecificData],
    ) -> Result<Self, DecodeError> {
        let mut reader = ByteReader::new(service_data);
        let mut out = DiscoveryAdvertisement::default();
        let mut service_vendor_data = Vec::new();

        while !reader.is_empty() {
            let type_len = reader.u8()?;
            let field_type = type_len >> 4;
            let length = (type_len & 0x0F) as usize;
            if reader.remaining() < length {
                return Err(DecodeError::TruncatedField { needed: length, available: reader.remaining() });
            }
            let payload = reader.take(length)?.to_vec();

            match field_type {
                FIELD_UWB_INDICATION => {
                    if out.uwb_indication_data.is_some() {
                        return Err(DecodeError::DuplicateField(FIELD_UWB_INDICATION));
                    }
                    out.uwb_indication_data = Some(UwbIndicationData { payload });
                }
                FIELD_REGULATORY_INFO => {
                    if out.regulatory_info.is_some() {
                        return Err(DecodeError::DuplicateField(FIELD_REGULATORY_INFO));
                    }
                    out.regulatory_info = Some(RegulatoryInfo { payload });
                }
                FIELD_PROFILE_SUPPORT => {
                    if out.profile_support_info.is_some() {
                        return Err(DecodeError::DuplicateField(FIELD_PROFILE_SUPPORT));
                    }
                    out.profile_support_info = Some(FiraProfileSupportInfo { payload });
                }
                FIELD_VENDOR_SPECIFIC => {
                    // Vendor id is not carried inside the service-data field itself
                    // (there is no room for it in the TLV payload budget used by
                    // callers that mix it with other fields); such entries are
                    // recorded with vendor_id 0 and are distinguished only by
                    // position. Real vendor identification happens through the
                    // Manufacturer-Specific Data path.
                    service_vendor_data.push(VendorSpecificData { vendor_id: 0, payload });
                }
                other => return Err(DecodeError::UnknownFieldType(other)),
            }
        }

        if !service_vendor_data.is_empty() && !manufacturer_vendor_data.is_empty() {
            return Err(DecodeError::VendorDataInBothPlaces);
        }

        out.vendor_specific_data = if !service_vendor_data.is_empty() {
            service_vendor_data
        } else {
            manufacturer_vendor_data.to_vec()
        };

        Ok(out)
    }

    /// Returns a copy of this advertisement with vendor-specific data cleared,
    /// matching what [`decode`](Self::decode) would produce when vendor data
    /// was omitted entirely on encode.
    pub fn without_vendor(&self) -> Self {
        Self { vendor_specific_data: Vec::new(), ..self.clone() }
    }
}

fn encode_field(out: &mut Vec<u8>, field_type: u8, payload: &[u8]) {
    debug_assert!(payload.len() <= 0x0F, "FiRa discovery field payload must fit in a 4-bit length nibble");
    let len = payload.len().min(0x0F) as u8;
    out.push((field_type << 4) | len);
    out.extend_from_slice(&payload[..len as usize]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_single_uwb_indication_field() {
        let decoded = DiscoveryAdvertisement::decode(&[0x11, 0x05], &[]).unwrap();
        assert_eq!(decoded.uwb_indication_data, Some(UwbIndicationData { payload: vec![0x05] }));
        assert_eq!(decoded.regulatory_info, None);
        assert_eq!(decoded.profile_support_info, None);
        assert!(decoded.vendor_specific_data.is_empty());
    }

    #[test]
    fn unknown_field_type_fails_decode() {
        // 0x41 = type 4 (profile support), length 1, payload 0xA0; then 0xA1 is type 10 (reserved).
        let err = DiscoveryAdvertisement::decode(&[0x41, 0xA0, 0xA1, 0xA2, 0xA3], &[]).unwrap_err();
        assert_eq!(err, DecodeError::UnknownFieldType(10));
    }

    #[test]
    fn duplicate_field_fails_decode() {
        let err = DiscoveryAdvertisement::decode(&[0x11, 0x01, 0x11, 0x02], &[]).unwrap_err();
        assert_eq!(err, DecodeError::DuplicateField(FIELD_UWB_INDICATION));
    }

    #[test]
    fn truncated_field_fails_decode() {
        let err = DiscoveryAdvertisement::decode(&[0x13, 0x01], &[]).unwrap_err();
        assert_eq!(err, DecodeError::TruncatedField { needed: 3, available: 1 });
    }

    #[test]
    fn vendor_data_in_both_places_fails_decode() {
        let manufacturer = vec![VendorSpecificData { vendor_id: 0x1234, payload: vec![0x01] }];
        let err = DiscoveryAdvertisement::decode(&[0x21, 0x09], &manufacturer).unwrap_err();
        assert_eq!(err, DecodeError::VendorDataInBothPlaces);
    }

    #[test]
    fn round_trips_without_vendor_data() {
        let adv = DiscoveryAdvertisement {
            uwb_indication_data: Some(UwbIndicationData { payload: vec![0xAA] }),
            regulatory_info: Some(RegulatoryInfo { payload: vec![0x01, 0x02] }),
            profile_support_info: Some(FiraProfileSupportInfo { payload: vec![0x03] }),
            vendor_specific_data: vec![VendorSpecificData { vendor_id: 0x4321, payload: vec![0x09] }],
        };
        let encoded = adv.encode(false);
        let decoded = DiscoveryAdvertisement::decode(&encoded, &[]).unwrap();
        assert_eq!(decoded, adv.without_vendor());
    }

    #[test]
    fn round_trips_with_vendor_data_in_service_data() {
        let adv = DiscoveryAdvertisement {
            uwb_indication_data: Some(UwbIndicationData { payload: vec![0xAA] }),
            regulatory_info: None,
            profile_support_info: None,
            vendor_specific_data: vec![VendorSpecificData { vendor_id: 0, payload: vec![0x09, 0x08] }],
        };
        let encoded = adv.encode(true);
        let decoded = DiscoveryAdvertisement::decode(&encoded, &[]).unwrap();
        assert_eq!(decoded, adv);
    }

    #[test]
    fn rssi_threshold_defaults_to_accept_unconditionally() {
        let uwb = UwbIndicationData { payload: vec![] };
        assert_eq!(uwb.bluetooth_rssi_threshold_dbm(), -128);
    }
}
