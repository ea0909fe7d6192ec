//! ipsw.me firmware fetcher

use std::collections::BTreeSet;
use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::source::USER_AGENT;
use crate::source::error::FetchError;
use crate::version::Version;

/// Default base URL for the ipsw.me API
pub const DEFAULT_FIRMWARE_URL: &str = "https://api.ipsw.me";

/// Firmware at or above this version is ignored
pub const DEFAULT_CEILING: &str = "26.0";

/// Trait for fetching the signed firmware versions of a device
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait FirmwareSource: Send + Sync {
    /// Fetches the signed versions below the ceiling for a device
    ///
    /// # Arguments
    /// * `device_id` - The device identifier (e.g., "iPhone15,2")
    ///
    /// # Returns
    /// * `Ok(BTreeSet<String>)` - Signed versions, possibly empty
    /// * `Err(FetchError)` - If the fetch fails
    async fn fetch(&self, device_id: &str) -> Result<BTreeSet<String>, FetchError>;
}

/// Response from `/v4/device/{id}?type=ipsw`
#[derive(Debug, Deserialize)]
struct DeviceResponse {
    #[serde(default)]
    firmwares: Vec<FirmwareEntry>,
}

/// A single firmware entry; other fields in the response are ignored.
///
/// Both fields are kept as raw JSON so one malformed entry cannot fail the
/// whole response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirmwareEntry {
    #[serde(default)]
    pub version: Option<Value>,
    #[serde(default)]
    pub signed: Option<Value>,
}

impl FirmwareEntry {
    pub fn is_signed(&self) -> bool {
        matches!(self.signed, Some(Value::Bool(true)))
    }

    /// The version, if it is a JSON string
    pub fn version_str(&self) -> Option<&str> {
        self.version.as_ref().and_then(Value::as_str)
    }
}

/// Keep the signed entries strictly below `ceiling`.
///
/// Entries without a string version, or whose version does not parse, are
/// dropped.
pub fn filter_signed(entries: &[FirmwareEntry], ceiling: &Version) -> BTreeSet<String> {
    entries
        .iter()
        .filter(|entry| entry.is_signed())
        .filter_map(|entry| {
            let Some(raw) = entry.version_str() else {
                debug!("Skipping firmware entry without a version string: {:?}", entry.version);
                return None;
            };
            match Version::parse(raw) {
                Ok(version) if version < *ceiling => Some(raw.trim().to_string()),
                Ok(_) => None,
                Err(e) => {
                    debug!("Skipping firmware entry: {}", e);
                    None
                }
            }
        })
        .collect()
}

/// Firmware source backed by the ipsw.me API
pub struct IpswFirmwareSource {
    client: reqwest::Client,
    base_url: String,
    ceiling: Version,
}

impl IpswFirmwareSource {
    pub fn new(base_url: &str, ceiling: Version, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            ceiling,
        })
    }
}

#[async_trait::async_trait]
impl FirmwareSource for IpswFirmwareSource {
    async fn fetch(&self, device_id: &str) -> Result<BTreeSet<String>, FetchError> {
        let url = format!("{}/v4/device/{}?type=ipsw", self.base_url, device_id);

        let response = self.client.get(&url).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(device_id.to_string()));
        }

        if !status.is_success() {
            warn!("ipsw.me returned status {}: {}", status, url);
            return Err(FetchError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let body: DeviceResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse firmware response for {}: {}", device_id, e);
            FetchError::InvalidResponse(e.to_string())
        })?;

        Ok(filter_signed(&body.firmwares, &self.ceiling))
    }
}
