//! Hand-written collaborators for pipeline tests

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use firmware_monitor::monitor::{Monitor, MonitorOptions};
use firmware_monitor::notify::Notifier;
use firmware_monitor::source::catalog::Catalog;
use firmware_monitor::source::{DeviceCatalog, FetchError, FirmwareSource};
use firmware_monitor::state::StateStore;

/// Catalog returning a fixed device list, or failing
pub struct StaticCatalog {
    devices: Option<Vec<(String, String)>>,
}

impl StaticCatalog {
    pub fn new(devices: &[(&str, &str)]) -> Self {
        Self {
            devices: Some(
                devices
                    .iter()
                    .map(|(id, name)| (id.to_string(), name.to_string()))
                    .collect(),
            ),
        }
    }

    pub fn failing() -> Self {
        Self { devices: None }
    }
}

#[async_trait]
impl DeviceCatalog for StaticCatalog {
    async fn fetch(&self) -> Result<Catalog, FetchError> {
        match &self.devices {
            Some(devices) => Ok(devices.iter().cloned().collect()),
            None => Err(FetchError::InvalidResponse(
                "Unexpected status: 500 Internal Server Error".to_string(),
            )),
        }
    }
}

/// Firmware source answering from a fixed table; unknown devices are not found
#[derive(Default)]
pub struct StaticFirmware {
    versions: HashMap<String, BTreeSet<String>>,
    queried: Mutex<Vec<String>>,
}

impl StaticFirmware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(mut self, device: &str, versions: Vec<&str>) -> Self {
        self.versions.insert(
            device.to_string(),
            versions.into_iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl FirmwareSource for StaticFirmware {
    async fn fetch(&self, device_id: &str) -> Result<BTreeSet<String>, FetchError> {
        self.queried.lock().unwrap().push(device_id.to_string());
        self.versions
            .get(device_id)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(device_id.to_string()))
    }
}

/// Notifier that records every message it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> bool {
        self.sent.lock().unwrap().push(text.to_string());
        true
    }
}

/// Wire a monitor around shared collaborators so tests can inspect them afterwards
pub fn monitor_with(
    catalog: StaticCatalog,
    firmware: Arc<StaticFirmware>,
    notifier: Arc<RecordingNotifier>,
    store: StateStore,
    options: MonitorOptions,
) -> Monitor {
    Monitor::new(Arc::new(catalog), firmware, notifier, store, options)
}
