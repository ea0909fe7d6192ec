use std::fmt;

use thiserror::Error;

// =============================================================================
// Time-related constants
// =============================================================================

/// Timeout for catalog and firmware requests in milliseconds (15 seconds)
pub const FETCH_TIMEOUT_MS: u64 = 15_000;

/// Timeout for Telegram requests in milliseconds (10 seconds)
pub const NOTIFY_TIMEOUT_MS: u64 = 10_000;

/// Delay between per-device firmware requests to respect upstream rate limits
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 250;

// =============================================================================
// Device selection
// =============================================================================

/// Devices queried when neither ids nor a pattern are given
pub const DEFAULT_DEVICES: &[&str] = &["iPhone15,2", "iPhone15,3", "iPhone14,2"];

// =============================================================================
// Environment variable names
// =============================================================================

pub const BOT_TOKEN_VARS: &[&str] = &["TG_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"];
pub const CHAT_ID_VARS: &[&str] = &["TG_CHAT_ID", "TELEGRAM_CHAT_ID"];

/// Problems with the Telegram credentials.
///
/// Either variant only disables delivery; the run itself goes ahead. Bad
/// command line values never get here, clap rejects them before start.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing setting {0}")]
    Missing(&'static str),

    /// A credential is present but malformed
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Telegram delivery credentials
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramConfig {
    /// Read credentials from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`, taking the first non-blank value of
    /// each variable family.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let first = |names: &'static [&'static str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(names[0]))
        };

        let bot_token = first(BOT_TOKEN_VARS)?;
        let chat_id = first(CHAT_ID_VARS)?;

        if bot_token.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(ConfigError::Invalid {
                name: BOT_TOKEN_VARS[0],
                reason: "token must not contain whitespace or '/'".to_string(),
            });
        }

        Ok(Self { bot_token, chat_id })
    }
}
