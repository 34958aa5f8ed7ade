//! Scan provider (C3, §4.3).

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    ble::{BackendError, RawScanResult, ScanBackend, ScanFilter, ScanObserver},
    codec::{DiscoveryAdvertisement, VendorSpecificData},
    uuids::FIRA_CP_SERVICE_UUID16,
};

/// Outcome delivered to the upper layer by a running [`ScanProvider`] (§4.3,
/// §6 "Emitted by the core").
#[derive(Clone, Debug)]
pub enum ScanEvent {
    /// A FiRa discovery advertisement was observed and passed the RSSI gate.
    Discovered {
        /// The raw advertisement as reported by the backend.
        scan_result: RawScanResult,
        /// The decoded FiRa fields.
        advertisement: DiscoveryAdvertisement,
    },
    /// Scanning failed; the backend's failure is passed through verbatim.
    DiscoveryFailed(BackendError),
}

/// Scans for FiRa Connector discovery advertisements, decoding and
/// RSSI-gating each result before surfacing it (§4.3).
pub struct ScanProvider {
    backend: Arc<dyn ScanBackend>,
    filters: Vec<ScanFilter>,
    events: UnboundedSender<ScanEvent>,
}

impl ScanProvider {
    /// Creates a provider that reports decoded results on `events`. `filters`
    /// are caller-supplied filters applied in addition to the implicit
    /// `0xFFF3` service UUID filter this provider always adds (§4.3).
    pub fn new(backend: Arc<dyn ScanBackend>, filters: Vec<ScanFilter>, events: UnboundedSender<ScanEvent>) -> Self {
        Self { backend, filters, events }
    }

    /// Starts scanning. The implicit FiRa service UUID filter is appended to
    /// whatever filters the caller supplied.
    pub async fn start(self: &Arc<Self>) -> crate::error::Result<()> {
        let mut filters = self.filters.clone();
        filters.push(ScanFilter { service_uuid16: Some(FIRA_CP_SERVICE_UUID16), rssi_threshold_dbm: None });
        let observer: Arc<dyn ScanObserver> = self.clone();
        self.backend.start(filters, observer).await.map_err(|e| crate::error::ErrorKind::BackendFailure(e.0).into())
    }

    /// Stops scanning.
    pub async fn stop(&self) -> crate::error::Result<()> {
        self.backend.stop().await.map_err(|e| crate::error::ErrorKind::BackendFailure(e.0).into())
    }
}

impl ScanObserver for ScanProvider {
    fn on_result(&self, result: RawScanResult) {
        // Rule 2: require service-data for 0xFFF3, drop if absent.
        let Some(service_data) = &result.fira_service_data else { return };

        // Rule 3: decode, merging manufacturer-specific data into the vendor
        // list; drop on decode failure.
        let manufacturer_vendor: Vec<VendorSpecificData> = result
            .manufacturer_data
            .iter()
            .map(|(vendor_id, payload)| VendorSpecificData { vendor_id: *vendor_id, payload: payload.clone() })
            .collect();
        let Ok(advertisement) = DiscoveryAdvertisement::decode(service_data, &manufacturer_vendor) else { return };

        // Rule 4: RSSI gate. -128 means accept unconditionally.
        let threshold =
            advertisement.uwb_indication_data.as_ref().map(|d| d.bluetooth_rssi_threshold_dbm()).unwrap_or(-128);
        if threshold != -128 && result.rssi < threshold {
            return;
        }

        let _ = self.events.send(ScanEvent::Discovered { scan_result: result, advertisement });
    }

    fn on_failure(&self, error: BackendError) {
        let _ = self.events.send(ScanEvent::DiscoveryFailed(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::PeerAddress;

    fn observer() -> (Arc<ScanProviderForTest>, tokio::sync::mpsc::UnboundedReceiver<ScanEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Arc::new(ScanProviderForTest(tx)), rx)
    }

    /// A bare `ScanObserver` stand-in so these tests exercise the gating
    /// logic without needing a `ScanBackend`.
    struct ScanProviderForTest(tokio::sync::mpsc::UnboundedSender<ScanEvent>);

    impl ScanObserver for ScanProviderForTest {
        fn on_result(&self, result: RawScanResult) {
            let Some(service_data) = &result.fira_service_data else { return };
            let manufacturer_vendor: Vec<VendorSpecificData> = result
                .manufacturer_data
                .iter()
                .map(|(vendor_id, payload)| VendorSpecificData { vendor_id: *vendor_id, payload: payload.clone() })
                .collect();
            let Ok(advertisement) = DiscoveryAdvertisement::decode(service_data, &manufacturer_vendor) else { return };
            let threshold =
                advertisement.uwb_indication_data.as_ref().map(|d| d.bluetooth_rssi_threshold_dbm()).unwrap_or(-128);
            if threshold != -128 && result.rssi < threshold {
                return;
            }
            let _ = self.0.send(ScanEvent::Discovered { scan_result: result, advertisement });
        }

        fn on_failure(&self, error: BackendError) {
            let _ = self.0.send(ScanEvent::DiscoveryFailed(error));
        }
    }

    fn raw(rssi: i8, service_data: Option<Vec<u8>>) -> RawScanResult {
        RawScanResult { address: PeerAddress::any(), rssi, fira_service_data: service_data, manufacturer_data: vec![] }
    }

    #[test]
    fn drops_results_without_fira_service_data() {
        let (observer, mut rx) = observer();
        observer.on_result(raw(-40, None));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn drops_results_that_fail_to_decode() {
        let (observer, mut rx) = observer();
        // type 10 is not a recognised field type.
        observer.on_result(raw(-40, Some(vec![0xA1, 0x00])));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn accepts_unconditionally_at_threshold_minus_128() {
        let (observer, mut rx) = observer();
        // UwbIndicationData payload 0x80 == -128i8.
        observer.on_result(raw(-90, Some(vec![0x11, 0x80])));
        assert!(matches!(rx.try_recv(), Ok(ScanEvent::Discovered { .. })));
    }

    #[test]
    fn gates_on_rssi_threshold() {
        let (observer, mut rx) = observer();
        // threshold payload 0xEC == -20i8.
        observer.on_result(raw(-30, Some(vec![0x11, 0xEC])));
        assert!(rx.try_recv().is_err());

        observer.on_result(raw(-10, Some(vec![0x11, 0xEC])));
        assert!(matches!(rx.try_recv(), Ok(ScanEvent::Discovered { .. })));
    }

    #[test]
    fn surfaces_failures_verbatim() {
        let (observer, mut rx) = observer();
        observer.on_failure(BackendError("scan stack crashed".into()));
        match rx.try_recv() {
            Ok(ScanEvent::DiscoveryFailed(BackendError(msg))) => assert_eq!(msg, "scan stack crashed"),
            other => panic!("expected DiscoveryFailed, got {other:?}"),
        }
    }
}
