//! Advertise provider (C2, §4.2).

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::{
    ble::{AdField, AdvertiseBackend, AdvertiseObserver, AdvertisingSet},
    codec::DiscoveryAdvertisement,
    uuids::FIRA_CP_SERVICE_UUID16,
};

/// Platform advertise-callback status codes ignored by [`AdvertiseProvider::discovery_failed`].
const STATUS_SUCCESS: u32 = 0;
const STATUS_ALREADY_STARTED: u32 = 1;

/// Outcome delivered to the upper layer by a running [`AdvertiseProvider`]
/// (§4.2, §6 "Emitted by the core").
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AdvertiseEvent {
    /// The advertise stack reported a failure code other than success or
    /// "already started" (§4.2 error contract).
    DiscoveryFailed(u32),
}

/// Starts and stops BLE advertising of the FiRa Connector Primary discovery
/// advertisement (§4.2).
pub struct AdvertiseProvider {
    backend: Arc<dyn AdvertiseBackend>,
    advertisement: DiscoveryAdvertisement,
    events: UnboundedSender<AdvertiseEvent>,
}

impl AdvertiseProvider {
    /// Creates a provider that will advertise `advertisement` once
    /// [`start`](Self::start) is called, reporting status-code failures on
    /// `events`.
    pub fn new(backend: Arc<dyn AdvertiseBackend>, advertisement: DiscoveryAdvertisement, events: UnboundedSender<AdvertiseEvent>) -> Self {
        Self { backend, advertisement, events }
    }

    /// Starts an advertising set carrying the service UUID `0xFFF3` with no
    /// device name or TX power in the primary AD, and the encoded
    /// [`DiscoveryAdvertisement`] (excluding vendor data) plus one
    /// Manufacturer-Specific Data entry per [`VendorSpecificData`] in the
    /// scan response (§4.2).
    ///
    /// [`VendorSpecificData`]: crate::codec::VendorSpecificData
    pub async fn start(self: &Arc<Self>) -> crate::error::Result<()> {
        let service_data = self.advertisement.encode(false);
        let mut scan_response_data =
            vec![AdField::ServiceUuid16(FIRA_CP_SERVICE_UUID16), AdField::ServiceData16 { uuid: FIRA_CP_SERVICE_UUID16, data: service_data }];
        scan_response_data.extend(self.advertisement.vendor_specific_data.iter().map(|v| AdField::ManufacturerData {
            company_id: v.vendor_id,
            data: v.payload.clone(),
        }));

        let set = AdvertisingSet {
            advertising_data: vec![AdField::ServiceUuid16(FIRA_CP_SERVICE_UUID16)],
            scan_response_data,
            connectable: true,
        };
        let observer: Arc<dyn AdvertiseObserver> = self.clone();
        self.backend.start(set, observer).await.map_err(|e| crate::error::ErrorKind::BackendFailure(e.0).into())
    }

    /// Stops the advertising set.
    pub async fn stop(&self) -> crate::error::Result<()> {
        self.backend.stop().await.map_err(|e| crate::error::ErrorKind::BackendFailure(e.0).into())
    }

    /// Classifies a raw advertise-callback status code, returning `Some`
    /// only for codes the upper layer should see as `discovery_failed`
    /// (every code but success and "already started", §4.2 error contract).
    pub fn discovery_failed(code: u32) -> Option<u32> {
        match code {
            STATUS_SUCCESS | STATUS_ALREADY_STARTED => None,
            other => Some(other),
        }
    }
}

impl AdvertiseObserver for AdvertiseProvider {
    fn on_status(&self, code: u32) {
        if let Some(code) = Self::discovery_failed(code) {
            let _ = self.events.send(AdvertiseEvent::DiscoveryFailed(code));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::ble::{BackendResult, BoxFuture};

    #[test]
    fn ignores_success_and_already_started() {
        assert_eq!(AdvertiseProvider::discovery_failed(STATUS_SUCCESS), None);
        assert_eq!(AdvertiseProvider::discovery_failed(STATUS_ALREADY_STARTED), None);
    }

    #[test]
    fn surfaces_every_other_code() {
        assert_eq!(AdvertiseProvider::discovery_failed(7), Some(7));
    }

    /// Captures the observer handed to `start` so the test can fire status
    /// codes through it, the way a real advertise stack would.
    #[derive(Default)]
    struct FakeAdvertiseBackend {
        observer: Mutex<Option<Arc<dyn AdvertiseObserver>>>,
    }

    impl AdvertiseBackend for FakeAdvertiseBackend {
        fn start(&self, _set: AdvertisingSet, observer: Arc<dyn AdvertiseObserver>) -> BoxFuture<'_, BackendResult<()>> {
            *self.observer.lock().unwrap() = Some(observer);
            Box::pin(async { Ok(()) })
        }

        fn stop(&self) -> BoxFuture<'_, BackendResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn wires_status_codes_through_to_discovery_failed_events() {
        let backend = Arc::new(FakeAdvertiseBackend::default());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let provider = Arc::new(AdvertiseProvider::new(backend.clone(), DiscoveryAdvertisement::default(), tx));
        provider.start().await.unwrap();

        let observer = backend.observer.lock().unwrap().clone().unwrap();
        observer.on_status(STATUS_SUCCESS);
        observer.on_status(STATUS_ALREADY_STARTED);
        observer.on_status(42);

        assert_eq!(rx.recv().await, Some(AdvertiseEvent::DiscoveryFailed(42)));
        assert!(rx.try_recv().is_err());
    }
}
