//! Signed firmware monitor
//!
//! Polls a firmware-information API for a set of devices, diffs the signed
//! versions below a ceiling against the last persisted record, and reports
//! new downgrade channels to Telegram.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Catalog   │────▶│  Firmware   │────▶│  Reconcile  │
//! │  (devices)  │     │  (signed)   │     │  (report)   │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                                                │
//!                     ┌─────────────┐     ┌──────▼──────┐
//!                     │    State    │◀────│  Notifier   │
//!                     │   (JSON)    │     │ (Telegram)  │
//!                     └─────────────┘     └─────────────┘
//! ```

pub mod config;
pub mod logging;
pub mod monitor;
pub mod notify;
pub mod report;
pub mod source;
pub mod state;
pub mod version;
