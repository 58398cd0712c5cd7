//! Centralized logging configuration for balance_watch
//!
//! This module provides structured logging using the `tracing` crate with:
//! - JSON formatted output for production (parseable by log aggregation tools)
//! - Pretty-print format for development (controlled by `LOG_FORMAT=pretty`)
//! - Level taken from the config file's `log_level`, overridable via `RUST_LOG`
//! - Redaction helpers for secrets (bot token, RPC URL with API key)
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RUST_LOG` | config `log_level` | Log level filter (standard tracing format) |
//! | `LOG_FORMAT` | `json` | Output format: `json` or `pretty` |
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use balance_watch::core::logging::{init_logging, SanitizedValue};
//!
//! init_logging("info");
//!
//! let token = "123456:ABC-DEF1234ghIkl";
//! tracing::info!(bot_token = %SanitizedValue::new(token), "Notifier ready");
//! // Output: bot_token = "1234...REDACTED"
//! ```

use std::env;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing_subscriber::{fmt as ts_fmt, prelude::*, EnvFilter};

/// Flag to track if logging has been initialized (prevents double-init)
static LOGGING_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Default log level when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Wrapper for sensitive data that should be redacted in logs.
///
/// Longer values keep their first four characters so operators can tell
/// credentials apart; short values are fully redacted.
#[derive(Clone)]
pub struct SanitizedValue<'a>(&'a str);

impl<'a> SanitizedValue<'a> {
    pub fn new(value: &'a str) -> Self {
        Self(value)
    }

    /// Get the actual value (only for actual processing, never for logging)
    pub fn expose(&self) -> &str {
        self.0
    }
}

impl<'a> fmt::Display for SanitizedValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Slice on a char boundary so multi-byte input cannot panic
        match self.0.char_indices().nth(4) {
            Some((cut, _)) if self.0.len() > 8 => write!(f, "{}...REDACTED", &self.0[..cut]),
            _ => write!(f, "REDACTED"),
        }
    }
}

impl<'a> fmt::Debug for SanitizedValue<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SanitizedValue(***)")
    }
}

/// Shorthand for `SanitizedValue::new(value)`
pub fn sanitize(value: &str) -> SanitizedValue<'_> {
    SanitizedValue::new(value)
}

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter string (e.g., "debug", "balance_watch=trace")
    pub level_filter: String,
    /// Use pretty format instead of JSON
    pub use_pretty_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level_filter: DEFAULT_LOG_LEVEL.to_string(),
            use_pretty_format: false,
        }
    }
}

impl LoggingConfig {
    /// Build from environment, falling back to `configured_level`
    ///
    /// - `RUST_LOG` wins over `configured_level` when set
    /// - `LOG_FORMAT=pretty` selects human-readable output, anything else JSON
    pub fn from_env(configured_level: &str) -> Self {
        let level_filter = env::var("RUST_LOG")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| configured_level.to_string());
        let use_pretty_format = env::var("LOG_FORMAT")
            .map(|v| v.to_lowercase() == "pretty")
            .unwrap_or(false);

        Self {
            level_filter,
            use_pretty_format,
        }
    }
}

/// Initialize logging from the environment and the configured level.
///
/// Subsequent calls are no-ops.
pub fn init_logging(configured_level: &str) {
    init_logging_with_config(LoggingConfig::from_env(configured_level));
}

/// Initialize the logging system with a specific configuration.
pub fn init_logging_with_config(config: LoggingConfig) {
    if LOGGING_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    let env_filter = EnvFilter::try_new(&config.level_filter)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    if config.use_pretty_format {
        tracing_subscriber::registry()
            .with(
                ts_fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                ts_fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true),
            )
            .with(env_filter)
            .init();
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
