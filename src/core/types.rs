//! Core data types shared by the scheduler, state store and telemetry
//!
//! - `Target`: one (address, token) pair under observation
//! - `Reading`: the outcome of checking one target once
//! - `CycleRecord`: per-cycle aggregate emitted to metrics

use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sha3::{Digest, Keccak256};

use crate::adapters::errors::SourceError;

// =============================================================================
// Target
// =============================================================================

/// An (address, token) pair under observation
///
/// Addresses are stored in EIP-55 checksummed form and tokens as lowercase
/// symbols, so two targets compare equal iff they watch the same balance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Target {
    pub address: String,
    pub token: String,
}

impl Target {
    pub fn new(address: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            token: token.into().to_lowercase(),
        }
    }

    /// Token symbol as shown to humans ("USDT")
    pub fn token_display(&self) -> String {
        self.token.to_uppercase()
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.token)
    }
}

// =============================================================================
// Reading
// =============================================================================

/// Result of checking a single target once
///
/// Produced exactly once per target per cycle and never mutated.
#[derive(Debug)]
pub struct Reading {
    pub target: Target,
    pub outcome: Result<Decimal, SourceError>,
    pub timestamp: DateTime<Utc>,
    /// Wall time spent in the balance source call
    pub duration: Duration,
}

// =============================================================================
// CycleRecord
// =============================================================================

/// Aggregate of one check cycle, consumed by the metrics registry
#[derive(Debug, Clone)]
pub struct CycleRecord {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub targets_checked: usize,
    pub changes_detected: usize,
    pub errors: usize,
}

// =============================================================================
// Address helpers
// =============================================================================

/// Validate a hex account address and return its EIP-55 checksummed form
///
/// All-lowercase and all-uppercase inputs are accepted as-is; mixed-case
/// input must already carry a valid checksum.
pub fn checksum_address(raw: &str) -> Result<String, String> {
    let hex_part = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .ok_or_else(|| format!("address '{}' must start with 0x", raw))?;

    if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("address '{}' must be 0x followed by 40 hex characters", raw));
    }

    let lower = hex_part.to_ascii_lowercase();
    let hash = Keccak256::digest(lower.as_bytes());

    let checksummed: String = lower
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let byte = hash[i / 2];
            let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                c.to_ascii_uppercase()
            } else {
                c
            }
        })
        .collect();

    let is_mixed_case = hex_part != lower && hex_part != lower.to_ascii_uppercase();
    if is_mixed_case && hex_part != checksummed {
        return Err(format!("address '{}' has an invalid EIP-55 checksum", raw));
    }

    Ok(format!("0x{}", checksummed))
}
