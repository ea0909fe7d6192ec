//! Remote sources polled on every run
//!
//! # Modules
//!
//! - [`catalog`]: device-id → display-name catalog
//! - [`firmware`]: signed firmware versions per device
//! - [`error`]: error type shared by both fetchers

pub mod catalog;
pub mod error;
pub mod firmware;

pub use catalog::{DeviceCatalog, HttpDeviceCatalog};
pub use error::FetchError;
pub use firmware::{FirmwareSource, IpswFirmwareSource};

/// User agent sent with every request
pub(crate) const USER_AGENT: &str = concat!("firmware-monitor/", env!("CARGO_PKG_VERSION"));
