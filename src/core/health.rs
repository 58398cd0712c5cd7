//! Component health aggregation
//!
//! The scheduler reports the outcome of every balance source and notifier
//! call here; HTTP handlers read point-in-time snapshots concurrently.
//!
//! # Semantics
//! - Each tracked component (`Source`, `Notifier`) holds a single boolean.
//! - `last_transition` moves only when that boolean flips, so a steady
//!   stream of failures (or successes) does not churn the timestamp.
//! - `Overall` is derived as the AND of the tracked components and can
//!   never be set directly.
//!
//! Scheduler liveness is not tracked here: consumers compare the snapshot
//! timestamp / `last_cycle_timestamp_seconds` against their own clock.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::core::metrics::MetricsRegistry;

/// Subsystems whose health is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Source,
    Notifier,
    Overall,
}

impl Component {
    /// Components that feed the overall status
    pub const TRACKED: [Component; 2] = [Component::Source, Component::Notifier];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Source => "source",
            Component::Notifier => "notifier",
            Component::Overall => "overall",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of one tracked component
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub component: Component,
    pub healthy: bool,
    /// When `healthy` last flipped; `None` if it never has
    pub last_transition: Option<DateTime<Utc>>,
    /// Number of flips since startup
    pub transitions: u64,
}

impl HealthStatus {
    fn new(component: Component) -> Self {
        Self {
            component,
            healthy: true,
            last_transition: None,
            transitions: 0,
        }
    }
}

/// Consistent copy of every component's health at one instant
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub components: BTreeMap<Component, HealthStatus>,
    pub overall: bool,
    pub timestamp: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn is_healthy(&self, component: Component) -> bool {
        match component {
            Component::Overall => self.overall,
            other => self.components.get(&other).map(|s| s.healthy).unwrap_or(false),
        }
    }

    pub fn healthy_count(&self) -> usize {
        self.components.values().filter(|s| s.healthy).count()
    }

    pub fn total_count(&self) -> usize {
        self.components.len()
    }
}

/// Overall health: true iff every tracked component is healthy
pub fn derive_overall(flags: impl IntoIterator<Item = bool>) -> bool {
    flags.into_iter().all(|healthy| healthy)
}

/// Process-wide health state (single writer, many readers)
pub struct HealthAggregator {
    statuses: RwLock<BTreeMap<Component, HealthStatus>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl HealthAggregator {
    /// All tracked components start healthy with no recorded transition
    pub fn new() -> Self {
        let statuses = Component::TRACKED
            .iter()
            .map(|&c| (c, HealthStatus::new(c)))
            .collect();
        Self {
            statuses: RwLock::new(statuses),
            metrics: None,
        }
    }

    /// Same as `new()`, mirroring every change into the health gauges
    pub fn with_metrics(metrics: Arc<MetricsRegistry>) -> Self {
        for component in Component::TRACKED {
            metrics.set_component_health(component, true);
        }
        metrics.set_component_health(Component::Overall, true);

        Self {
            metrics: Some(metrics),
            ..Self::new()
        }
    }

    /// Record the outcome of one call made on behalf of `component`
    ///
    /// Returns `true` if the component's health flipped.
    pub async fn record_outcome(&self, component: Component, healthy: bool) -> bool {
        if component == Component::Overall {
            warn!("[HEALTH] Overall health is derived and cannot be recorded directly");
            return false;
        }

        let (flipped, overall) = {
            let mut statuses = self.statuses.write().await;
            let status = statuses
                .entry(component)
                .or_insert_with(|| HealthStatus::new(component));

            let flipped = status.healthy != healthy;
            if flipped {
                status.healthy = healthy;
                status.last_transition = Some(Utc::now());
                status.transitions += 1;
            }
            let overall = derive_overall(statuses.values().map(|s| s.healthy));

            // Gauges change under the write guard so a scrape never sees a
            // component and overall disagree
            if let Some(metrics) = &self.metrics {
                metrics.set_component_health(component, healthy);
                metrics.set_component_health(Component::Overall, overall);
            }
            (flipped, overall)
        };

        if flipped {
            if healthy {
                info!(component = %component, overall, "[HEALTH] Component recovered");
            } else {
                warn!(component = %component, overall, "[HEALTH] Component unhealthy");
            }
        }

        flipped
    }

    /// Run `f` while no health update can be applied
    ///
    /// Health gauges are written under the same lock, so a metrics scrape
    /// taken inside `f` sees component and overall gauges that agree.
    pub async fn while_stable<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.statuses.read().await;
        f()
    }

    /// Copy the current state; never exposes a half-applied update
    pub async fn snapshot(&self) -> HealthSnapshot {
        let components = self.statuses.read().await.clone();
        let overall = derive_overall(components.values().map(|s| s.healthy));
        HealthSnapshot {
            components,
            overall,
            timestamp: Utc::now(),
        }
    }
}

impl Default for HealthAggregator {
    fn default() -> Self {
        Self::new()
    }
}
