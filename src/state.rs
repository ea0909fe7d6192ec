//! Persisted notification record
//!
//! Maps each device id to the signed versions seen on the last successful
//! query. Stored as a pretty-printed JSON object; the legacy layout where a
//! device maps to a single version string is still accepted on load.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::version::sort_versions;

/// Default state file, relative to the working directory
pub const DEFAULT_STATE_FILE: &str = "last_notified.json";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed state file {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk value for one device
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredVersions {
    Many(Vec<String>),
    Single(String),
}

impl From<StoredVersions> for BTreeSet<String> {
    fn from(stored: StoredVersions) -> Self {
        match stored {
            StoredVersions::Many(versions) => versions.into_iter().collect(),
            StoredVersions::Single(version) => BTreeSet::from([version]),
        }
    }
}

/// Device id → versions previously observed as signed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationState {
    devices: BTreeMap<String, BTreeSet<String>>,
}

impl NotificationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Versions recorded for a device; empty if the device is unknown
    pub fn versions(&self, device_id: &str) -> BTreeSet<String> {
        self.devices.get(device_id).cloned().unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }

    /// Replace the recorded versions for a device
    pub fn replace(&mut self, device_id: &str, versions: BTreeSet<String>) {
        self.devices.insert(device_id.to_string(), versions);
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, StoredVersions> = serde_json::from_str(json)?;
        Ok(Self {
            devices: raw.into_iter().map(|(id, v)| (id, v.into())).collect(),
        })
    }

    /// Render as JSON with each device's versions in ascending version order
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Version order first, then any unparseable leftovers so nothing is lost
fn ordered_versions(versions: &BTreeSet<String>) -> Vec<String> {
    let mut ordered = sort_versions(versions);
    let kept: BTreeSet<&str> = ordered.iter().map(String::as_str).collect();
    let leftovers: Vec<String> = versions
        .iter()
        .filter(|v| !kept.contains(v.as_str()))
        .cloned()
        .collect();
    ordered.extend(leftovers);
    ordered
}

impl Serialize for NotificationState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let ordered: BTreeMap<&str, Vec<String>> = self
            .devices
            .iter()
            .map(|(id, versions)| (id.as_str(), ordered_versions(versions)))
            .collect();
        ordered.serialize(serializer)
    }
}

/// Loads and saves [`NotificationState`] at a fixed path
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the state. A missing file yields an empty state.
    pub fn load(&self) -> Result<NotificationState, StateError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No state file at {:?}, starting empty", self.path);
                return Ok(NotificationState::new());
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if content.trim().is_empty() {
            return Ok(NotificationState::new());
        }

        NotificationState::from_json(&content).map_err(|source| StateError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Load the state, falling back to an empty one on any error
    pub fn load_or_default(&self) -> NotificationState {
        self.load()
            .inspect_err(|e| warn!("Ignoring unreadable state: {}", e))
            .unwrap_or_default()
    }

    /// Write the state through a temporary sibling file and rename it into place
    pub fn save(&self, state: &NotificationState) -> Result<(), StateError> {
        let json = state.to_json().map_err(|source| StateError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.tmp_path();
        let io_err = |source: io::Error| StateError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&tmp_path, json + "\n").map_err(io_err)?;
        fs::rename(&tmp_path, &self.path).map_err(io_err)?;

        debug!("Saved state for {} devices to {:?}", state.len(), self.path);
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
