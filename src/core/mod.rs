//! Core module - scheduling, change detection, state, health, metrics, logging
//!
//! This module uses **explicit re-exports** instead of glob exports (`pub use module::*`)
//! to provide better API visibility and prevent accidental public API changes.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{Scheduler, HealthAggregator, MetricsRegistry};
//! ```

pub mod detector;
pub mod health;
pub mod logging;
pub mod metrics;
pub mod scheduler;
pub mod state;
pub mod types;

// Explicit re-exports for detector module
pub use detector::{detect, ChangeOutcome};

// Explicit re-exports for health module
pub use health::{derive_overall, Component, HealthAggregator, HealthSnapshot, HealthStatus};

// Explicit re-exports for logging module
pub use logging::{
    init_logging, init_logging_with_config, sanitize, LoggingConfig, SanitizedValue,
    DEFAULT_LOG_LEVEL,
};

// Explicit re-exports for metrics module
pub use metrics::MetricsRegistry;

// Explicit re-exports for scheduler module
pub use scheduler::{format_change_message, format_startup_summary, Scheduler, SchedulerConfig};

// Explicit re-exports for state module
pub use state::StateStore;

// Explicit re-exports for types module
pub use types::{checksum_address, CycleRecord, Reading, Target};
