//! Report delivery
//!
//! - [`telegram`]: Telegram Bot API `sendMessage` notifier

pub mod telegram;

#[cfg(test)]
use mockall::automock;

use thiserror::Error;

use crate::config::ConfigError;

pub use telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notifier not configured: {0}")]
    NotConfigured(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Best-effort delivery of report text
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `text`. Returns whether delivery succeeded; failures are logged,
    /// never propagated.
    async fn send(&self, text: &str) -> bool;
}
