//! Telegram Bot API notifier
//!
//! Delivers alerts with `sendMessage`. The bot token is part of the request
//! path, so it is never logged and transport errors are stripped of their URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::adapters::errors::{NotifyError, NotifyResult};
use crate::adapters::traits::Notifier;
use crate::config::constants::{HTTP_CONNECT_TIMEOUT, HTTP_POOL_MAX_IDLE};
use crate::core::logging::sanitize;

/// Public Bot API endpoint
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

/// Notifier posting to a single Telegram chat
pub struct TelegramNotifier {
    base_url: String,
    bot_token: String,
    chat_id: String,
    http_client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self::with_base_url(TELEGRAM_API_BASE, bot_token, chat_id)
    }

    /// Point the notifier at a different Bot API host (local proxies, tests)
    pub fn with_base_url(
        base_url: impl Into<String>,
        bot_token: impl Into<String>,
        chat_id: impl Into<String>,
    ) -> Self {
        let bot_token = bot_token.into();
        let chat_id = chat_id.into();
        let http_client = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        tracing::info!(
            bot_token = %sanitize(&bot_token),
            chat_id = %chat_id,
            "[INIT] Telegram notifier configured"
        );

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
            http_client,
        }
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, message: &str, timeout: Duration) -> NotifyResult<()> {
        let body = json!({
            "chat_id": self.chat_id,
            "text": message,
        });

        let response = self
            .http_client
            .post(self.send_message_url())
            .timeout(timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, timeout))?;
        let parsed: Option<TelegramResponse> = serde_json::from_str(&text).ok();
        let description = parsed
            .as_ref()
            .and_then(|r| r.description.clone())
            .unwrap_or_else(|| format!("HTTP {}", status));

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(NotifyError::AuthError(description))
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = parsed
                    .and_then(|r| r.parameters)
                    .and_then(|p| p.retry_after);
                Err(NotifyError::RateLimited(retry_after))
            }
            s if !s.is_success() => Err(NotifyError::ConnectionError(description)),
            _ => match parsed {
                Some(r) if r.ok => {
                    debug!(chat_id = %self.chat_id, "Telegram message delivered");
                    Ok(())
                }
                _ => Err(NotifyError::ConnectionError(description)),
            },
        }
    }

    fn notifier_name(&self) -> &'static str {
        "telegram"
    }
}

fn map_transport_error(e: reqwest::Error, timeout: Duration) -> NotifyError {
    if e.is_timeout() {
        NotifyError::Timeout(timeout.as_millis() as u64)
    } else {
        NotifyError::ConnectionError(e.without_url().to_string())
    }
}

// =============================================================================
// Tests
// =============================================================================
