//! Shared test utilities

pub mod sources;

pub use sources::{RecordingNotifier, StaticCatalog, StaticFirmware, monitor_with};
