//! The poll → diff → notify → persist pipeline

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use regex::Regex;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::DEFAULT_DEVICES;
use crate::notify::Notifier;
use crate::report::{PerDeviceResult, build_report, reconcile};
use crate::source::catalog::Catalog;
use crate::source::{DeviceCatalog, FetchError, FirmwareSource};
use crate::state::{NotificationState, StateStore};

/// A device selected for this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: String,
    pub display_name: String,
}

/// Which catalog devices to query
#[derive(Debug, Clone, Default)]
pub struct DeviceSelection {
    /// Explicit device ids; empty means every catalog device (see [`DeviceSelection::new`])
    pub ids: Vec<String>,
    /// Only query devices whose id matches
    pub pattern: Option<Regex>,
}

impl DeviceSelection {
    /// Build a selection from command line values.
    ///
    /// Blank ids are dropped. With neither ids nor a pattern the selection
    /// falls back to [`DEFAULT_DEVICES`]; the whole catalog is only walked
    /// when a pattern narrows it.
    pub fn new(ids: impl IntoIterator<Item = String>, pattern: Option<Regex>) -> Self {
        let mut ids: Vec<String> = ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        if ids.is_empty() && pattern.is_none() {
            ids = DEFAULT_DEVICES.iter().map(|id| id.to_string()).collect();
        }

        Self { ids, pattern }
    }

    /// Resolve the selection against the catalog.
    ///
    /// Explicit ids come out in catalog order, followed by ids the catalog
    /// does not know (named after their id) in the order given.
    pub fn select(&self, catalog: &Catalog) -> Vec<DeviceRecord> {
        let matches = |id: &str| self.pattern.as_ref().is_none_or(|re| re.is_match(id));

        let mut selected: Vec<DeviceRecord> = catalog
            .iter()
            .filter(|(id, _)| self.ids.is_empty() || self.ids.contains(id))
            .filter(|(id, _)| matches(id))
            .map(|(id, name)| DeviceRecord {
                id: id.clone(),
                display_name: name.clone(),
            })
            .collect();

        for id in &self.ids {
            if !catalog.contains_key(id)
                && matches(id)
                && !selected.iter().any(|d| &d.id == id)
            {
                warn!("Device {} is not in the catalog, querying it anyway", id);
                selected.push(DeviceRecord {
                    id: id.clone(),
                    display_name: id.clone(),
                });
            }
        }

        selected
    }
}

#[derive(Debug, Clone, Default)]
pub struct MonitorOptions {
    pub selection: DeviceSelection,
    /// Pause between per-device requests
    pub request_delay: Duration,
    /// Skip delivery when no device has a new version
    pub notify_only_on_change: bool,
    /// Neither notify nor save
    pub dry_run: bool,
}

/// What a run did
#[derive(Debug)]
pub enum RunOutcome {
    /// The catalog could not be fetched; nothing was queried, sent or saved
    Aborted(FetchError),
    Completed(RunSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub report: String,
    pub results: Vec<PerDeviceResult>,
    pub notified: bool,
    pub saved: bool,
}

impl RunSummary {
    pub fn has_new_versions(&self) -> bool {
        self.results.iter().any(PerDeviceResult::has_new_versions)
    }
}

/// Runs one monitoring pass with explicitly provided collaborators
pub struct Monitor {
    catalog: Arc<dyn DeviceCatalog>,
    firmware: Arc<dyn FirmwareSource>,
    notifier: Arc<dyn Notifier>,
    store: StateStore,
    options: MonitorOptions,
}

impl Monitor {
    pub fn new(
        catalog: Arc<dyn DeviceCatalog>,
        firmware: Arc<dyn FirmwareSource>,
        notifier: Arc<dyn Notifier>,
        store: StateStore,
        options: MonitorOptions,
    ) -> Self {
        Self {
            catalog,
            firmware,
            notifier,
            store,
            options,
        }
    }

    pub async fn run(&self) -> RunOutcome {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        self.run_at(&timestamp).await
    }

    /// Run with a fixed report timestamp
    pub async fn run_at(&self, timestamp: &str) -> RunOutcome {
        let mut state = self.store.load_or_default();
        info!("Loaded state for {} devices", state.len());

        let catalog = match self.catalog.fetch().await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Failed to fetch device catalog, aborting run: {}", e);
                return RunOutcome::Aborted(e);
            }
        };

        let devices = self.options.selection.select(&catalog);
        info!(
            "Catalog lists {} devices, {} selected",
            catalog.len(),
            devices.len()
        );

        let mut results = Vec::with_capacity(devices.len());
        for (i, device) in devices.iter().enumerate() {
            if i > 0 && !self.options.request_delay.is_zero() {
                sleep(self.options.request_delay).await;
            }
            results.push(self.check_device(device, &mut state).await);
        }

        let report = build_report(&results, timestamp);

        let has_new = results.iter().any(PerDeviceResult::has_new_versions);
        let notified = if self.options.dry_run {
            info!("Dry run: notification skipped");
            false
        } else if self.options.notify_only_on_change && !has_new {
            info!("No new signed firmware, notification skipped");
            false
        } else {
            self.notifier.send(&report).await
        };

        let saved = if self.options.dry_run {
            info!("Dry run: state not saved");
            false
        } else {
            self.store
                .save(&state)
                .inspect_err(|e| error!("Failed to save state: {}", e))
                .is_ok()
        };

        RunOutcome::Completed(RunSummary {
            report,
            results,
            notified,
            saved,
        })
    }

    /// Query one device and fold the result into `state`.
    ///
    /// On failure the device's previous record is left untouched.
    async fn check_device(
        &self,
        device: &DeviceRecord,
        state: &mut NotificationState,
    ) -> PerDeviceResult {
        match self.firmware.fetch(&device.id).await {
            Ok(current) => {
                let previous = state.versions(&device.id);
                let reconciliation =
                    reconcile(&device.id, &device.display_name, &current, &previous);

                if reconciliation.new_versions.is_empty() {
                    info!(
                        "{} ({}): {} signed, nothing new",
                        device.display_name,
                        device.id,
                        current.len()
                    );
                } else {
                    info!(
                        "{} ({}): new signed firmware {:?}",
                        device.display_name, device.id, reconciliation.new_versions
                    );
                }

                state.replace(&device.id, current);
                PerDeviceResult::checked(&device.id, reconciliation)
            }
            Err(e) => {
                warn!(
                    "Failed to fetch firmware for {} ({}): {}",
                    device.display_name, device.id, e
                );
                PerDeviceResult::failed(&device.id, &device.display_name)
            }
        }
    }
}
