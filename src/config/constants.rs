//! Application-wide constants and configuration defaults
//!
//! Values used when the config file omits a setting. Each can be
//! overridden via an environment variable, read once when the config
//! is loaded.

use std::time::Duration;

// =============================================================================
// File locations
// =============================================================================

/// Path of the YAML configuration file (default: `config.yaml`)
///
/// Environment variable: `CONFIG_PATH`
pub fn config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string())
}

// =============================================================================
// Call bounds
// =============================================================================

/// Timeout for a single balance check (default: 10000ms)
///
/// Environment variable: `BALANCE_CHECK_TIMEOUT_MS`
pub fn balance_timeout_ms() -> u64 {
    std::env::var("BALANCE_CHECK_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000)
}

/// Timeout for a single notification (default: 10000ms)
///
/// Environment variable: `NOTIFY_TIMEOUT_MS`
pub fn notify_timeout_ms() -> u64 {
    std::env::var("NOTIFY_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000)
}

/// Maximum balance checks in flight within one cycle (default: 4)
///
/// Environment variable: `MAX_IN_FLIGHT_CHECKS`
pub fn max_in_flight_checks() -> usize {
    std::env::var("MAX_IN_FLIGHT_CHECKS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(4)
}

// =============================================================================
// HTTP client tuning
// =============================================================================

/// TCP connect timeout for outbound HTTP clients
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Max idle connections kept per upstream host
pub const HTTP_POOL_MAX_IDLE: usize = 4;

// =============================================================================
// API server
// =============================================================================

/// Bind address for the health/metrics server
pub const DEFAULT_API_HOST: &str = "127.0.0.1";

/// Port for the health/metrics server
pub const DEFAULT_API_PORT: u16 = 8000;
