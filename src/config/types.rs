//! Configuration types for balance monitoring
//!
//! This module defines the structs loaded from YAML. The configuration is
//! validated once at startup and then treated as immutable; changing it
//! requires a restart.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::constants;
use crate::core::types::{checksum_address, Target};
use crate::error::AppError;

/// Token symbol served from the native account balance
pub const NATIVE_TOKEN: &str = "eth";

/// Decimals of the native token
pub const NATIVE_DECIMALS: u32 = 18;

/// Largest scale `rust_decimal` can represent
pub const MAX_TOKEN_DECIMALS: u32 = 28;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ============================================================================
// Configuration Structs
// ============================================================================

/// ERC-20 contract backing a token symbol
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenContract {
    /// Contract address
    pub contract: String,
    /// Number of decimals used by `balanceOf`
    pub decimals: u32,
}

/// Per-call bounds and optional behaviors of the check loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckConfig {
    /// Timeout for each balance source call
    #[serde(default = "constants::balance_timeout_ms")]
    pub balance_timeout_ms: u64,
    /// Timeout for each notifier call
    #[serde(default = "constants::notify_timeout_ms")]
    pub notify_timeout_ms: u64,
    /// Maximum concurrent balance checks within a cycle (1 = sequential)
    #[serde(default = "constants::max_in_flight_checks")]
    pub max_in_flight: usize,
    /// Send one summary of all initial balances after the first cycle
    #[serde(default)]
    pub startup_summary: bool,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            balance_timeout_ms: constants::balance_timeout_ms(),
            notify_timeout_ms: constants::notify_timeout_ms(),
            max_in_flight: constants::max_in_flight_checks(),
            startup_summary: false,
        }
    }
}

impl CheckConfig {
    pub fn balance_timeout(&self) -> Duration {
        Duration::from_millis(self.balance_timeout_ms)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_millis(self.notify_timeout_ms)
    }
}

/// Health/metrics HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
        }
    }
}

impl ApiConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_api_host() -> String {
    constants::DEFAULT_API_HOST.to_string()
}

fn default_api_port() -> u16 {
    constants::DEFAULT_API_PORT
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Accounts to watch, in configured order
    pub addresses: Vec<String>,
    /// Token symbols to watch on every address
    pub tokens: Vec<String>,
    /// Seconds between the starts of consecutive cycles
    pub check_interval_secs: u64,
    /// Log verbosity (trace|debug|info|warn|error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// ERC-20 contracts keyed by token symbol
    #[serde(default)]
    pub token_contracts: BTreeMap<String, TokenContract>,
    #[serde(default)]
    pub checks: CheckConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

impl AppConfig {
    /// Validate all configuration rules and normalize addresses/symbols
    ///
    /// Addresses are rewritten to their checksummed form and token symbols
    /// (including `token_contracts` keys) to lowercase.
    pub fn validate(&mut self) -> Result<(), AppError> {
        // Rule: at least one address, each well-formed, no duplicates
        if self.addresses.is_empty() {
            return Err(AppError::Config(
                "Configuration must contain at least one address".to_string(),
            ));
        }
        let mut normalized = Vec::with_capacity(self.addresses.len());
        let mut seen = HashSet::new();
        for raw in &self.addresses {
            let address = checksum_address(raw.trim()).map_err(AppError::Config)?;
            if !seen.insert(address.clone()) {
                return Err(AppError::Config(format!("Duplicate address: {}", address)));
            }
            normalized.push(address);
        }
        self.addresses = normalized;

        // Rule: token contracts are valid addresses with representable decimals
        let mut contracts = BTreeMap::new();
        for (symbol, token) in &self.token_contracts {
            let symbol = symbol.trim().to_lowercase();
            let contract = checksum_address(token.contract.trim())
                .map_err(|e| AppError::Config(format!("Token '{}': {}", symbol, e)))?;
            if token.decimals > MAX_TOKEN_DECIMALS {
                return Err(AppError::Config(format!(
                    "Token '{}': decimals must be <= {}, got {}",
                    symbol, MAX_TOKEN_DECIMALS, token.decimals
                )));
            }
            contracts.insert(symbol, TokenContract { contract, decimals: token.decimals });
        }
        self.token_contracts = contracts;

        // Rule: at least one token, each known, no duplicates
        if self.tokens.is_empty() {
            return Err(AppError::Config(
                "Configuration must contain at least one token".to_string(),
            ));
        }
        let mut tokens = Vec::with_capacity(self.tokens.len());
        let mut seen = HashSet::new();
        for raw in &self.tokens {
            let symbol = raw.trim().to_lowercase();
            if symbol.is_empty() {
                return Err(AppError::Config("Token symbol cannot be empty".to_string()));
            }
            if !seen.insert(symbol.clone()) {
                return Err(AppError::Config(format!("Duplicate token: {}", symbol)));
            }
            if symbol != NATIVE_TOKEN && !self.token_contracts.contains_key(&symbol) {
                return Err(AppError::Config(format!(
                    "Token '{}' has no entry in token_contracts",
                    symbol
                )));
            }
            tokens.push(symbol);
        }
        self.tokens = tokens;

        // Rule: interval is at least one second
        if self.check_interval_secs == 0 {
            return Err(AppError::Config(
                "check_interval_secs must be >= 1".to_string(),
            ));
        }

        // Rule: known log level
        self.log_level = self.log_level.trim().to_lowercase();
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(AppError::Config(format!(
                "log_level must be one of {:?}, got '{}'",
                LOG_LEVELS, self.log_level
            )));
        }

        // Rule: call bounds are positive
        if self.checks.balance_timeout_ms == 0 || self.checks.notify_timeout_ms == 0 {
            return Err(AppError::Config(
                "checks: timeouts must be > 0ms".to_string(),
            ));
        }
        if self.checks.max_in_flight == 0 {
            return Err(AppError::Config(
                "checks: max_in_flight must be >= 1".to_string(),
            ));
        }

        Ok(())
    }

    /// Every (address, token) pair, addresses outer, tokens inner
    pub fn targets(&self) -> Vec<Target> {
        self.addresses
            .iter()
            .flat_map(|address| self.tokens.iter().map(move |token| Target::new(address.clone(), token.clone())))
            .collect()
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Log the effective configuration at startup
    pub fn log_summary(&self) {
        tracing::info!("=== Balance Watch Configuration ===");
        tracing::info!("  - Addresses: {:?}", self.addresses);
        tracing::info!("  - Tokens: {:?}", self.tokens);
        tracing::info!("  - Check interval: {:?}", self.check_interval());
        tracing::info!("  - Balance timeout: {:?}", self.checks.balance_timeout());
        tracing::info!("  - Notify timeout: {:?}", self.checks.notify_timeout());
        tracing::info!("  - Max in-flight checks: {}", self.checks.max_in_flight);
        tracing::info!("  - Startup summary: {}", self.checks.startup_summary);
        tracing::info!("  - API: {}", self.api.bind_address());
        tracing::info!("===================================");
    }
}

// ============================================================================
// Tests
// ============================================================================
