//! Prometheus metrics registry
//!
//! All series live in a private `prometheus::Registry` owned by this struct
//! (never the process-global default registry). Writers update atomics
//! through the typed handles below; `encode()` gathers a snapshot for the
//! `/metrics` endpoint without holding any lock the scheduler needs.
//!
//! Only gauges (balance value, health, uptime, last cycle time) are ever
//! lowered, and only by replace-on-write.
//!
//! On Linux the standard `process_*` series (resident memory, CPU seconds,
//! start time, open fds) are collected from procfs at scrape time.

use std::time::Duration;

use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec,
    IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
#[cfg(target_os = "linux")]
use prometheus::process_collector::ProcessCollector;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::warn;

use crate::adapters::errors::ErrorKind;
use crate::core::health::Component;
use crate::core::types::{CycleRecord, Target};
use crate::error::{AppError, Result};

/// Buckets for single balance checks and notifications (seconds)
const CALL_DURATION_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];

/// Buckets for whole check cycles (seconds)
const CYCLE_DURATION_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0];

/// Typed handles to every exported series
pub struct MetricsRegistry {
    registry: Registry,

    // Per-target balance series
    balance_current: GaugeVec,
    balance_changes: IntCounterVec,
    check_duration: HistogramVec,
    check_total: IntCounterVec,
    check_errors: IntCounterVec,

    // Health + errors
    component_health: IntGaugeVec,
    errors_total: IntCounterVec,

    // Upstream JSON-RPC requests
    rpc_request_total: IntCounterVec,
    rpc_request_duration: HistogramVec,

    // Notifications
    notification_total: IntCounterVec,
    notification_duration: Histogram,

    // Scheduling
    cycle_total: IntCounter,
    cycle_duration: Histogram,
    last_cycle_timestamp: IntGauge,
    scheduler_uptime: Gauge,
}

impl MetricsRegistry {
    /// Build and register every series
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let balance_current = GaugeVec::new(
            Opts::new("balance_current", "Current balance for each address/token combination"),
            &["address", "token"],
        )?;
        let balance_changes = IntCounterVec::new(
            Opts::new("balance_change_detected_total", "Total number of balance changes detected"),
            &["address", "token"],
        )?;
        let check_duration = HistogramVec::new(
            HistogramOpts::new("balance_check_duration_seconds", "Duration of balance check operations")
                .buckets(CALL_DURATION_BUCKETS.to_vec()),
            &["address", "token"],
        )?;
        let check_total = IntCounterVec::new(
            Opts::new("balance_check_total", "Total number of balance checks performed"),
            &["address", "token", "status"],
        )?;
        let check_errors = IntCounterVec::new(
            Opts::new("balance_check_errors_total", "Total number of failed balance checks"),
            &["address", "token", "kind"],
        )?;
        let component_health = IntGaugeVec::new(
            Opts::new("component_health_status", "Component health status (1=healthy, 0=unhealthy)"),
            &["component"],
        )?;
        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Total number of collaborator errors"),
            &["component", "kind"],
        )?;
        let rpc_request_total = IntCounterVec::new(
            Opts::new("eth_rpc_request_total", "Total number of Ethereum RPC requests"),
            &["method", "status"],
        )?;
        let rpc_request_duration = HistogramVec::new(
            HistogramOpts::new("eth_rpc_request_duration_seconds", "Duration of Ethereum RPC requests")
                .buckets(CALL_DURATION_BUCKETS.to_vec()),
            &["method"],
        )?;
        let notification_total = IntCounterVec::new(
            Opts::new("notification_total", "Total number of notification attempts"),
            &["status"],
        )?;
        let notification_duration = Histogram::with_opts(
            HistogramOpts::new("notification_duration_seconds", "Duration of notification delivery")
                .buckets(CALL_DURATION_BUCKETS.to_vec()),
        )?;
        let cycle_total = IntCounter::new(
            "balance_check_cycle_total",
            "Total number of balance check cycles completed",
        )?;
        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new("balance_check_cycle_duration_seconds", "Duration of balance check cycles")
                .buckets(CYCLE_DURATION_BUCKETS.to_vec()),
        )?;
        let last_cycle_timestamp = IntGauge::new(
            "last_cycle_timestamp_seconds",
            "Unix time at which the most recent cycle finished",
        )?;
        let scheduler_uptime = Gauge::new("scheduler_uptime_seconds", "Scheduler uptime in seconds")?;
        let application_info = IntGaugeVec::new(
            Opts::new("application_info", "Application information"),
            &["name", "version"],
        )?;

        registry.register(Box::new(balance_current.clone()))?;
        registry.register(Box::new(balance_changes.clone()))?;
        registry.register(Box::new(check_duration.clone()))?;
        registry.register(Box::new(check_total.clone()))?;
        registry.register(Box::new(check_errors.clone()))?;
        registry.register(Box::new(component_health.clone()))?;
        registry.register(Box::new(errors_total.clone()))?;
        registry.register(Box::new(rpc_request_total.clone()))?;
        registry.register(Box::new(rpc_request_duration.clone()))?;
        registry.register(Box::new(notification_total.clone()))?;
        registry.register(Box::new(notification_duration.clone()))?;
        registry.register(Box::new(cycle_total.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(last_cycle_timestamp.clone()))?;
        registry.register(Box::new(scheduler_uptime.clone()))?;
        registry.register(Box::new(application_info.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(ProcessCollector::for_self()))?;

        application_info
            .with_label_values(&[env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")])
            .set(1);

        Ok(Self {
            registry,
            balance_current,
            balance_changes,
            check_duration,
            check_total,
            check_errors,
            component_health,
            errors_total,
            rpc_request_total,
            rpc_request_duration,
            notification_total,
            notification_duration,
            cycle_total,
            cycle_duration,
            last_cycle_timestamp,
            scheduler_uptime,
        })
    }

    // =========================================================================
    // Write path
    // =========================================================================

    /// Count one balance check and observe its duration
    pub fn record_check(&self, target: &Target, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        self.check_total
            .with_label_values(&[target.address.as_str(), target.token.as_str(), status])
            .inc();
        self.check_duration
            .with_label_values(&[target.address.as_str(), target.token.as_str()])
            .observe(duration.as_secs_f64());
    }

    pub fn set_balance(&self, target: &Target, value: Decimal) {
        match value.to_f64() {
            Some(v) => self
                .balance_current
                .with_label_values(&[target.address.as_str(), target.token.as_str()])
                .set(v),
            None => warn!(address = %target.address, token = %target.token, value = %value, "Balance not representable as gauge"),
        }
    }

    pub fn record_change(&self, target: &Target) {
        self.balance_changes
            .with_label_values(&[target.address.as_str(), target.token.as_str()])
            .inc();
    }

    /// Count a failed balance check against its target
    pub fn record_check_error(&self, target: &Target, kind: ErrorKind) {
        self.check_errors
            .with_label_values(&[target.address.as_str(), target.token.as_str(), kind.as_str()])
            .inc();
    }

    /// Count an error under the component it came from
    pub fn record_error(&self, component: Component, kind: ErrorKind) {
        self.errors_total
            .with_label_values(&[component.as_str(), kind.as_str()])
            .inc();
    }

    pub fn set_component_health(&self, component: Component, healthy: bool) {
        self.component_health
            .with_label_values(&[component.as_str()])
            .set(i64::from(healthy));
    }

    /// Count one JSON-RPC request by method and observe its duration
    pub fn record_rpc_request(&self, method: &str, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        self.rpc_request_total.with_label_values(&[method, status]).inc();
        self.rpc_request_duration
            .with_label_values(&[method])
            .observe(duration.as_secs_f64());
    }

    pub fn record_notification(&self, duration: Duration, success: bool) {
        let status = if success { "success" } else { "error" };
        self.notification_total.with_label_values(&[status]).inc();
        self.notification_duration.observe(duration.as_secs_f64());
    }

    pub fn record_cycle(&self, record: &CycleRecord) {
        self.cycle_total.inc();
        self.cycle_duration.observe(record.duration.as_secs_f64());
        self.last_cycle_timestamp.set(record.finished_at.timestamp());
    }

    pub fn set_uptime(&self, uptime: Duration) {
        self.scheduler_uptime.set(uptime.as_secs_f64());
    }

    // =========================================================================
    // Read path
    // =========================================================================

    /// Render every series in the Prometheus text exposition format
    pub fn encode(&self) -> Result<String> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| AppError::Metrics(prometheus::Error::Msg(e.to_string())))
    }

    /// Content type matching `encode()`
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }
}
