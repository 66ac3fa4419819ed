//! Telegram Bot API notifier.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{MonitorError, MonitorResult};

use super::bitget_client::mask;
use super::types::{SendMessageRequest, TelegramResponse};
use super::Notifier;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Sends every message to one fixed chat.
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> Result<Self> {
        Self::with_base_url(bot_token, chat_id, TELEGRAM_API_BASE.to_string(), timeout)
    }

    /// Create with custom base URL (for testing).
    pub fn with_base_url(
        bot_token: String,
        chat_id: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            bot_token,
            chat_id,
        })
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }
}

impl fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("base_url", &self.base_url)
            .field("bot_token", &mask(&self.bot_token))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, text: &str) -> MonitorResult<()> {
        let body = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let response = self
            .client
            .post(self.send_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| MonitorError::Delivery(e.without_url().to_string()))?;

        let status = response.status();
        debug!(status = %status, "Telegram responded");

        let reply: TelegramResponse = response
            .json()
            .await
            .map_err(|e| MonitorError::Delivery(format!("unreadable response ({status}): {e}")))?;

        if !reply.ok {
            return Err(MonitorError::Delivery(
                reply
                    .description
                    .unwrap_or_else(|| format!("Telegram returned {status}")),
            ));
        }

        Ok(())
    }
}
