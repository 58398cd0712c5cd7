//! Credentials loaded from environment variables
//!
//! Secrets never live in the YAML file. The RPC endpoint and Telegram
//! bot credentials are read from the environment (optionally populated
//! from a `.env` file by `dotenvy` in `main`).

use thiserror::Error;
use tracing::info;

use crate::core::logging::sanitize;

/// Errors for credential loading
#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Missing required environment variable(s): {}", .0.join(", "))]
    MissingEnvVars(Vec<String>),

    #[error("Invalid RPC URL (expected http:// or https://): {0}")]
    InvalidRpcUrl(String),
}

/// Secrets needed to reach the balance source and the notifier
#[derive(Clone)]
pub struct Credentials {
    /// JSON-RPC endpoint (`RPC_URL`, falling back to `INFURA_URL`)
    pub rpc_url: String,
    /// Telegram bot token (`TELEGRAM_BOT_TOKEN`)
    pub telegram_bot_token: String,
    /// Telegram chat id (`TELEGRAM_CHAT_ID`)
    pub telegram_chat_id: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("rpc_url", &sanitize(&self.rpc_url))
            .field("telegram_bot_token", &sanitize(&self.telegram_bot_token))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .finish()
    }
}

fn read_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Credentials {
    /// Load credentials from environment variables
    ///
    /// Required env vars:
    /// - `RPC_URL` (or legacy `INFURA_URL`)
    /// - `TELEGRAM_BOT_TOKEN`
    /// - `TELEGRAM_CHAT_ID`
    ///
    /// Every missing variable is reported in a single error.
    pub fn from_env() -> Result<Self, CredentialsError> {
        let rpc_url = read_var("RPC_URL").or_else(|| read_var("INFURA_URL"));
        let telegram_bot_token = read_var("TELEGRAM_BOT_TOKEN");
        let telegram_chat_id = read_var("TELEGRAM_CHAT_ID");

        let mut missing = Vec::new();
        if rpc_url.is_none() {
            missing.push("RPC_URL".to_string());
        }
        if telegram_bot_token.is_none() {
            missing.push("TELEGRAM_BOT_TOKEN".to_string());
        }
        if telegram_chat_id.is_none() {
            missing.push("TELEGRAM_CHAT_ID".to_string());
        }

        match (rpc_url, telegram_bot_token, telegram_chat_id) {
            (Some(rpc_url), Some(telegram_bot_token), Some(telegram_chat_id)) => {
                if !rpc_url.starts_with("http://") && !rpc_url.starts_with("https://") {
                    return Err(CredentialsError::InvalidRpcUrl(sanitize(&rpc_url).to_string()));
                }
                info!(
                    rpc_url = %sanitize(&rpc_url),
                    chat_id = %telegram_chat_id,
                    "Credentials loaded"
                );
                Ok(Self {
                    rpc_url,
                    telegram_bot_token,
                    telegram_chat_id,
                })
            }
            _ => Err(CredentialsError::MissingEnvVars(missing)),
        }
    }

    /// Create credentials for testing
    #[cfg(test)]
    pub fn new_for_test(rpc_url: &str) -> Self {
        Self {
            rpc_url: rpc_url.to_string(),
            telegram_bot_token: "123456:TEST-TOKEN".to_string(),
            telegram_chat_id: "42".to_string(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
