//! Telegram Bot API notifier

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigError, TelegramConfig};
use crate::notify::{Notifier, NotifyError};

/// Default base URL for the Telegram Bot API
pub const DEFAULT_TELEGRAM_URL: &str = "https://api.telegram.org";

const PARSE_MODE: &str = "HTML";

/// Longest text Telegram accepts in one message
pub const MESSAGE_LIMIT: usize = 4096;

/// Body of a `sendMessage` request
#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'a str,
}

/// Escape the characters Telegram's HTML parse mode treats as markup
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Length of `c` once escaped, in UTF-16 code units as Telegram counts them
fn escaped_len(c: char) -> usize {
    match c {
        '&' => 5,
        '<' | '>' => 4,
        _ => c.len_utf16(),
    }
}

/// Cut one line into pieces whose escaped length fits in `limit`
fn cut_line(line: &str, limit: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut len = 0;

    for (i, c) in line.char_indices() {
        let width = escaped_len(c);
        if len + width > limit && i > start {
            pieces.push(&line[start..i]);
            start = i;
            len = 0;
        }
        len += width;
    }
    pieces.push(&line[start..]);
    pieces
}

/// Split `text` at line boundaries into messages that fit in `limit` once
/// escaped. Lines longer than `limit` are cut between characters. Blank
/// chunks are dropped.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0;
    let mut open = false;

    for line in text.split('\n') {
        for piece in cut_line(line, limit) {
            let piece_len: usize = piece.chars().map(escaped_len).sum();
            if open && chunk_len + 1 + piece_len <= limit {
                chunk.push('\n');
                chunk_len += 1;
            } else if open {
                chunks.push(std::mem::take(&mut chunk));
                chunk_len = 0;
            }
            chunk.push_str(piece);
            chunk_len += piece_len;
            open = true;
        }
    }
    if open {
        chunks.push(chunk);
    }

    chunks
        .into_iter()
        .map(|c| c.trim_matches('\n').to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Notifier posting to a Telegram chat.
///
/// Built without credentials it stays disabled and every send reports
/// failure.
pub struct TelegramNotifier {
    client: reqwest::Client,
    base_url: String,
    config: Result<TelegramConfig, ConfigError>,
}

impl TelegramNotifier {
    pub fn new(
        base_url: &str,
        config: Result<TelegramConfig, ConfigError>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_ok()
    }

    /// Post `text` to the configured chat, split into as many messages as
    /// [`MESSAGE_LIMIT`] requires. Stops at the first message that fails.
    pub async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
        let config = self.config.as_ref().map_err(|e| e.clone())?;

        let chunks = split_message(text, MESSAGE_LIMIT);
        if chunks.len() > 1 {
            debug!("Report split into {} Telegram messages", chunks.len());
        }

        for chunk in &chunks {
            self.post(config, chunk).await?;
        }

        Ok(())
    }

    async fn post(&self, config: &TelegramConfig, text: &str) -> Result<(), NotifyError> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, config.bot_token);
        let payload = SendMessage {
            chat_id: &config.chat_id,
            text: escape_html(text),
            parse_mode: PARSE_MODE,
        };

        let response = self.client.post(&url).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> bool {
        match self.send_message(text).await {
            Ok(()) => {
                info!("Telegram notification sent");
                true
            }
            Err(NotifyError::NotConfigured(e)) => {
                warn!("Telegram delivery skipped: {}", e);
                false
            }
            // reqwest errors carry the URL, which embeds the bot token
            Err(NotifyError::Network(e)) => {
                error!("Telegram request failed: {}", e.without_url());
                false
            }
            Err(e) => {
                error!("Telegram delivery failed: {}", e);
                false
            }
        }
    }
}
