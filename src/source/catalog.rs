//! Device catalog fetcher

use std::time::Duration;

#[cfg(test)]
use mockall::automock;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::source::USER_AGENT;
use crate::source::error::FetchError;

/// Default catalog: the public ipsw.me device list
pub const DEFAULT_CATALOG_URL: &str = "https://api.ipsw.me/v4/devices";

/// Device id → display name, in catalog order
pub type Catalog = IndexMap<String, String>;

/// Trait for fetching the device catalog
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait DeviceCatalog: Send + Sync {
    /// Fetches the current device catalog
    ///
    /// # Returns
    /// * `Ok(Catalog)` - Devices in the order the source lists them
    /// * `Err(FetchError)` - If the request fails or the body is not a catalog
    async fn fetch(&self) -> Result<Catalog, FetchError>;
}

/// Catalog response, either grouped by category or a flat ipsw.me list
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogResponse {
    Grouped { categories: Vec<Category> },
    Flat(Vec<FlatDevice>),
}

#[derive(Debug, Deserialize)]
struct Category {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    devices: Vec<GroupedDevice>,
}

#[derive(Debug, Deserialize)]
struct GroupedDevice {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct FlatDevice {
    identifier: String,
    name: String,
}

impl CatalogResponse {
    fn into_catalog(self) -> Catalog {
        let pairs: Vec<(String, String)> = match self {
            Self::Grouped { categories } => categories
                .into_iter()
                .flat_map(|category| {
                    debug!(
                        "Catalog category {:?} lists {} devices",
                        category.name,
                        category.devices.len()
                    );
                    category.devices.into_iter().map(|d| (d.id, d.name))
                })
                .collect(),
            Self::Flat(devices) => devices
                .into_iter()
                .map(|d| (d.identifier, d.name))
                .collect(),
        };

        let mut catalog = Catalog::with_capacity(pairs.len());
        for (id, name) in pairs {
            // first occurrence wins
            catalog.entry(id).or_insert(name);
        }
        catalog
    }
}

/// Catalog fetched over HTTP
pub struct HttpDeviceCatalog {
    client: reqwest::Client,
    url: String,
}

impl HttpDeviceCatalog {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl DeviceCatalog for HttpDeviceCatalog {
    async fn fetch(&self) -> Result<Catalog, FetchError> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(self.url.clone()));
        }

        if !status.is_success() {
            warn!("Device catalog returned status {}: {}", status, self.url);
            return Err(FetchError::InvalidResponse(format!(
                "Unexpected status: {}",
                status
            )));
        }

        let body: CatalogResponse = response.json().await.map_err(|e| {
            warn!("Failed to parse device catalog response: {}", e);
            FetchError::InvalidResponse(e.to_string())
        })?;

        Ok(body.into_catalog())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn fetch_flattens_grouped_categories_in_order() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/devices.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "categories": [
                        {
                            "name": "iPhone 14",
                            "devices": [
                                {"id": "iPhone15,2", "name": "iPhone 14 Pro"},
                                {"id": "iPhone15,3", "name": "iPhone 14 Pro Max"}
                            ]
                        },
                        {
                            "name": "iPhone 13",
                            "devices": [
                                {"id": "iPhone14,2", "name": "iPhone 13 Pro"}
                            ]
                        }
                    ]
                }"#,
            )
            .create_async()
            .await;

        let catalog = HttpDeviceCatalog::new(&format!("{}/devices.json", server.url()), TIMEOUT)
            .unwrap();
        let result = catalog.fetch().await.unwrap();

        mock.assert_async().await;
        let ids: Vec<&str> = result.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["iPhone15,2", "iPhone15,3", "iPhone14,2"]);
        assert_eq!(result["iPhone14,2"], "iPhone 13 Pro");
    }

    #[tokio::test]
    async fn fetch_accepts_flat_ipsw_device_list() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/v4/devices")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"name": "iPhone 8", "identifier": "iPhone10,1", "boardconfig": "d20ap"},
                    {"name": "iPhone X", "identifier": "iPhone10,3", "boardconfig": "d22ap"}
                ]"#,
            )
            .create_async()
            .await;

        let catalog =
            HttpDeviceCatalog::new(&format!("{}/v4/devices", server.url()), TIMEOUT).unwrap();
        let result = catalog.fetch().await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.len(), 2);
        assert_eq!(result["iPhone10,3"], "iPhone X");
    }

    #[tokio::test]
    async fn fetch_keeps_first_name_for_duplicate_ids() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/devices.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"categories": [
                    {"devices": [{"id": "iPhone10,1", "name": "iPhone 8"}]},
                    {"devices": [{"id": "iPhone10,1", "name": "iPhone 8 (GSM)"}]}
                ]}"#,
            )
            .create_async()
            .await;

        let catalog = HttpDeviceCatalog::new(&format!("{}/devices.json", server.url()), TIMEOUT)
            .unwrap();
        let result = catalog.fetch().await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.len(), 1);
        assert_eq!(result["iPhone10,1"], "iPhone 8");
    }

    #[tokio::test]
    async fn fetch_returns_invalid_response_for_server_error() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/devices.json")
            .with_status(503)
            .create_async()
            .await;

        let catalog = HttpDeviceCatalog::new(&format!("{}/devices.json", server.url()), TIMEOUT)
            .unwrap();
        let result = catalog.fetch().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(FetchError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn fetch_returns_not_found_for_missing_catalog() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/devices.json")
            .with_status(404)
            .create_async()
            .await;

        let catalog = HttpDeviceCatalog::new(&format!("{}/devices.json", server.url()), TIMEOUT)
            .unwrap();
        let result = catalog.fetch().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(FetchError::NotFound(_))));
    }

    #[tokio::test]
    async fn fetch_rejects_unexpected_body() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/devices.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message": "maintenance"}"#)
            .create_async()
            .await;

        let catalog = HttpDeviceCatalog::new(&format!("{}/devices.json", server.url()), TIMEOUT)
            .unwrap();
        let result = catalog.fetch().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(FetchError::InvalidResponse(_))));
    }
}
