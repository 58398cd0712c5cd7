//! Balance check scheduler
//!
//! Drives the check loop: every `interval` (measured from the start of the
//! previous cycle) each configured target is checked once, changes are
//! detected against the stored baseline and reported through the notifier.
//!
//! # Architecture
//! - Balance calls for one cycle run through a bounded pool of
//!   `max_in_flight` futures; results are then processed one by one in
//!   configured target order, so this task is the only writer of the
//!   `StateStore` and the only caller of `HealthAggregator::record_outcome`.
//! - Every collaborator call is wrapped in its own timeout.
//! - No failure ends the loop; only the `CancellationToken` does. On
//!   cancellation no new calls are dispatched, in-flight calls finish
//!   (bounded by their timeout) and the inter-cycle sleep is cut short.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future;
use futures_util::stream::{self, StreamExt};
use rust_decimal::Decimal;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::errors::{NotifyError, SourceError};
use crate::adapters::traits::{BalanceSource, Notifier};
use crate::config::AppConfig;
use crate::core::detector::{detect, ChangeOutcome};
use crate::core::health::{Component, HealthAggregator};
use crate::core::metrics::MetricsRegistry;
use crate::core::state::StateStore;
use crate::core::types::{CycleRecord, Reading, Target};

/// Timing and concurrency bounds for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between the starts of consecutive cycles
    pub interval: Duration,
    /// Bound for each balance source call
    pub balance_timeout: Duration,
    /// Bound for each notifier call
    pub notify_timeout: Duration,
    /// Maximum concurrent balance calls within a cycle
    pub max_in_flight: usize,
    /// Send a summary of all baselines after the first cycle
    pub startup_summary: bool,
}

impl SchedulerConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            interval: config.check_interval(),
            balance_timeout: config.checks.balance_timeout(),
            notify_timeout: config.checks.notify_timeout(),
            max_in_flight: config.checks.max_in_flight.max(1),
            startup_summary: config.checks.startup_summary,
        }
    }
}

/// Owns the check loop and its state
pub struct Scheduler<S, N> {
    source: S,
    notifier: N,
    targets: Vec<Target>,
    state: StateStore,
    health: Arc<HealthAggregator>,
    metrics: Arc<MetricsRegistry>,
    config: SchedulerConfig,
    cycles_completed: u64,
    started: Instant,
}

impl<S, N> Scheduler<S, N>
where
    S: BalanceSource,
    N: Notifier,
{
    pub fn new(
        source: S,
        notifier: N,
        targets: Vec<Target>,
        health: Arc<HealthAggregator>,
        metrics: Arc<MetricsRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        let state = StateStore::new(&targets);
        Self {
            source,
            notifier,
            targets,
            state,
            health,
            metrics,
            config,
            cycles_completed: 0,
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    /// Run cycles until `cancel` fires
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!(
            source = self.source.source_name(),
            notifier = self.notifier.notifier_name(),
            targets = self.targets.len(),
            interval_secs = self.config.interval.as_secs(),
            max_in_flight = self.config.max_in_flight,
            "[CYCLE] Scheduler started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let cycle_start = Instant::now();
            self.run_cycle(&cancel).await;

            // Sleep until `interval` after this cycle's start; a cycle that
            // overran starts the next one immediately.
            let next_start = cycle_start + self.config.interval;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep_until(next_start) => {}
            }
        }

        info!(cycles = self.cycles_completed, "[SHUTDOWN] Scheduler stopped");
    }

    /// Check every target once and process the results
    pub async fn run_cycle(&mut self, cancel: &CancellationToken) -> CycleRecord {
        let cycle_start = Instant::now();
        let started_at = Utc::now();
        debug!(cycle = self.cycles_completed + 1, "[CYCLE] Starting");

        let readings = self.fetch_readings(cancel).await;
        let targets_checked = readings.len();

        let mut changes_detected = 0;
        let mut errors = 0;
        for reading in readings {
            let (changed, failed) = self.process_reading(reading).await;
            changes_detected += usize::from(changed);
            errors += failed;
        }

        if self.cycles_completed == 0 && self.config.startup_summary {
            errors += usize::from(!self.send_startup_summary().await);
        }

        self.cycles_completed += 1;
        let record = CycleRecord {
            started_at,
            finished_at: Utc::now(),
            duration: cycle_start.elapsed(),
            targets_checked,
            changes_detected,
            errors,
        };

        self.metrics.record_cycle(&record);
        self.metrics.set_uptime(self.started.elapsed());

        info!(
            cycle = self.cycles_completed,
            targets_checked,
            changes_detected,
            errors,
            duration_ms = record.duration.as_millis() as u64,
            "[CYCLE] Completed"
        );

        record
    }

    /// Fetch one reading per target through the bounded pool
    ///
    /// Returned in configured target order. Targets not yet dispatched when
    /// `cancel` fires are skipped.
    async fn fetch_readings(&self, cancel: &CancellationToken) -> Vec<Reading> {
        let source = &self.source;
        let timeout = self.config.balance_timeout;
        let cancel = cancel.clone();

        // Stream owned targets: borrowing `self.targets` here makes `run` non-Send
        let mut readings: Vec<(usize, Reading)> = stream::iter(self.targets.clone().into_iter().enumerate())
            .take_while(move |_| future::ready(!cancel.is_cancelled()))
            .map(move |(index, target): (usize, Target)| async move {
                (index, check_target(source, target, timeout).await)
            })
            .buffer_unordered(self.config.max_in_flight)
            .collect()
            .await;

        if readings.len() < self.targets.len() {
            info!(
                dispatched = readings.len(),
                total = self.targets.len(),
                "[SHUTDOWN] Cycle cut short by stop signal"
            );
        }

        readings.sort_by_key(|(index, _)| *index);
        readings.into_iter().map(|(_, reading)| reading).collect()
    }

    /// Apply one reading; returns (change detected, errors recorded)
    async fn process_reading(&mut self, reading: Reading) -> (bool, usize) {
        let Reading { target, outcome, duration, .. } = reading;
        self.metrics.record_check(&target, duration, outcome.is_ok());

        let current = match outcome {
            Ok(value) => value,
            Err(e) => {
                self.record_source_error(&target, &e).await;
                return (false, 1);
            }
        };

        self.health.record_outcome(Component::Source, true).await;
        self.metrics.set_balance(&target, current);

        let prior = self.state.get(&target);
        let mut changed = false;
        let mut errors = 0;

        match detect(prior, current) {
            ChangeOutcome::NoBaseline => {
                info!(address = %target.address, token = %target.token, balance = %current, "[CHANGE] Baseline established");
            }
            ChangeOutcome::Unchanged => {
                debug!(address = %target.address, token = %target.token, balance = %current, "Balance unchanged");
            }
            ChangeOutcome::Changed(delta) => {
                changed = true;
                self.metrics.record_change(&target);
                info!(
                    address = %target.address,
                    token = %target.token,
                    prior = %prior.unwrap_or_default(),
                    current = %current,
                    delta = %delta,
                    "[CHANGE] Balance changed"
                );

                let message = format_change_message(&target, prior.unwrap_or_default(), current, delta);
                if !self.notify(Some(&target), &message).await {
                    errors += 1;
                }
            }
        }

        // Baseline moves even when the notification failed
        self.state.set(&target, current);
        (changed, errors)
    }

    async fn record_source_error(&self, target: &Target, error: &SourceError) {
        let kind = error.kind();
        self.metrics.record_check_error(target, kind);
        self.metrics.record_error(Component::Source, kind);
        self.health.record_outcome(Component::Source, false).await;
        warn!(
            address = %target.address,
            token = %target.token,
            kind = %kind,
            error = %error,
            "Balance check failed"
        );
    }

    /// Deliver `message` once; returns whether it was delivered
    ///
    /// `target` is the balance the message reports on, if any.
    async fn notify(&self, target: Option<&Target>, message: &str) -> bool {
        let start = Instant::now();
        let timeout = self.config.notify_timeout;
        let result = match tokio::time::timeout(timeout, self.notifier.send(message, timeout)).await {
            Ok(result) => result,
            Err(_) => Err(NotifyError::Timeout(timeout.as_millis() as u64)),
        };
        let duration = start.elapsed();

        match result {
            Ok(()) => {
                self.metrics.record_notification(duration, true);
                self.health.record_outcome(Component::Notifier, true).await;
                debug!(duration_ms = duration.as_millis() as u64, "[NOTIFY] Delivered");
                true
            }
            Err(e) => {
                let kind = e.kind();
                self.metrics.record_notification(duration, false);
                self.metrics.record_error(Component::Notifier, kind);
                self.health.record_outcome(Component::Notifier, false).await;
                warn!(
                    address = target.map(|t| t.address.as_str()),
                    token = target.map(|t| t.token.as_str()),
                    kind = %kind,
                    error = %e,
                    "[NOTIFY] Delivery failed, not retrying"
                );
                false
            }
        }
    }

    async fn send_startup_summary(&self) -> bool {
        let balances: Vec<(&Target, Decimal)> = self
            .targets
            .iter()
            .filter_map(|t| self.state.get(t).map(|v| (t, v)))
            .collect();
        info!(baselines = balances.len(), "[NOTIFY] Sending startup summary");
        self.notify(None, &format_startup_summary(&balances)).await
    }
}

/// Call the source for one target, bounded by `timeout`
async fn check_target<S: BalanceSource>(source: &S, target: Target, timeout: Duration) -> Reading {
    let start = Instant::now();
    let outcome = match tokio::time::timeout(
        timeout,
        source.check_balance(&target.address, &target.token, timeout),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout(timeout.as_millis() as u64)),
    };

    Reading {
        target,
        outcome,
        timestamp: Utc::now(),
        duration: start.elapsed(),
    }
}

// =============================================================================
// Message formatting
// =============================================================================

fn signed(delta: Decimal) -> String {
    if delta.is_sign_positive() && !delta.is_zero() {
        format!("+{}", delta)
    } else {
        delta.to_string()
    }
}

/// Alert text for a detected change
pub fn format_change_message(target: &Target, prior: Decimal, current: Decimal, delta: Decimal) -> String {
    format!(
        "💰 {} balance changed for {}: {} → {} ({})",
        target.token_display(),
        target.address,
        prior,
        current,
        signed(delta)
    )
}

/// One message listing every baseline established by the first cycle
pub fn format_startup_summary(balances: &[(&Target, Decimal)]) -> String {
    let mut message = String::from("🤖 Balance watch is up!\nBalances:");
    if balances.is_empty() {
        message.push_str("\n(no balances available yet)");
    }
    for (target, value) in balances {
        message.push_str(&format!("\n{} {}: {}", target.address, target.token_display(), value));
    }
    message
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::{SourceStep, TestMockNotifier, TestMockSource};
    use crate::core::metrics::tests::sample;

    const ADDR: &str = "0xAbC0000000000000000000000000000000000001";
    const ADDR2: &str = "0xAbC0000000000000000000000000000000000002";

    fn dec(v: i64) -> Decimal {
        Decimal::from(v)
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(60),
            balance_timeout: Duration::from_secs(10),
            notify_timeout: Duration::from_secs(10),
            max_in_flight: 4,
            startup_summary: false,
        }
    }

    fn scheduler(
        source: &TestMockSource,
        notifier: &TestMockNotifier,
        targets: Vec<Target>,
        config: SchedulerConfig,
    ) -> (Scheduler<TestMockSource, TestMockNotifier>, Arc<HealthAggregator>, Arc<MetricsRegistry>) {
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let health = Arc::new(HealthAggregator::with_metrics(metrics.clone()));
        let scheduler = Scheduler::new(
            source.clone(),
            notifier.clone(),
            targets,
            health.clone(),
            metrics.clone(),
            config,
        );
        (scheduler, health, metrics)
    }

    #[test]
    fn test_format_change_message() {
        let target = Target::new(ADDR, "usdt");
        let msg = format_change_message(&target, dec(100), dec(150), dec(50));
        assert_eq!(msg, format!("💰 USDT balance changed for {}: 100 → 150 (+50)", ADDR));

        let msg = format_change_message(&target, dec(150), Decimal::new(1255, 1), Decimal::new(-245, 1));
        assert!(msg.ends_with("150 → 125.5 (-24.5)"));
    }

    #[test]
    fn test_format_startup_summary() {
        let a = Target::new(ADDR, "eth");
        let b = Target::new(ADDR2, "usdt");
        let msg = format_startup_summary(&[(&a, Decimal::new(15, 1)), (&b, dec(7))]);
        assert!(msg.starts_with("🤖 Balance watch is up!"));
        assert!(msg.contains(&format!("{} ETH: 1.5", ADDR)));
        assert!(msg.contains(&format!("{} USDT: 7", ADDR2)));
    }

    #[tokio::test]
    async fn test_first_cycle_sets_baseline_without_notifying() {
        let source = TestMockSource::new().with_fallback(SourceStep::Balance(dec(100)));
        let notifier = TestMockNotifier::new();
        let target = Target::new(ADDR, "usdt");
        let (mut sched, _, _) = scheduler(&source, &notifier, vec![target.clone()], config());

        let record = sched.run_cycle(&CancellationToken::new()).await;

        assert_eq!(record.targets_checked, 1);
        assert_eq!(record.changes_detected, 0);
        assert_eq!(sched.state().get(&target), Some(dec(100)));
        assert_eq!(notifier.attempts(), 0);
    }

    #[tokio::test]
    async fn test_unchanged_source_never_notifies() {
        let source = TestMockSource::new().with_fallback(SourceStep::Balance(dec(42)));
        let notifier = TestMockNotifier::new();
        let (mut sched, _, _) = scheduler(&source, &notifier, vec![Target::new(ADDR, "eth")], config());

        let cancel = CancellationToken::new();
        for _ in 0..5 {
            let record = sched.run_cycle(&cancel).await;
            assert_eq!(record.changes_detected, 0);
        }
        assert_eq!(notifier.attempts(), 0);
        assert_eq!(sched.cycles_completed(), 5);
    }

    #[tokio::test]
    async fn test_change_notifies_once_with_delta() {
        let source = TestMockSource::new();
        source.script(ADDR, "usdt", [SourceStep::Balance(dec(100)), SourceStep::Balance(dec(80))]);
        let notifier = TestMockNotifier::new();
        let target = Target::new(ADDR, "usdt");
        let (mut sched, _, metrics) = scheduler(&source, &notifier, vec![target.clone()], config());

        let cancel = CancellationToken::new();
        sched.run_cycle(&cancel).await;
        let record = sched.run_cycle(&cancel).await;

        assert_eq!(record.changes_detected, 1);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("(-20)"));
        assert_eq!(sched.state().get(&target), Some(dec(80)));

        let output = metrics.encode().unwrap();
        assert_eq!(sample(&output, "balance_change_detected_total", &["usdt"]), Some(1.0));
        assert_eq!(sample(&output, "notification_total", &["success"]), Some(1.0));
    }

    #[tokio::test]
    async fn test_source_error_keeps_baseline_and_continues() {
        let source = TestMockSource::new();
        source.script(ADDR, "usdt", [SourceStep::Balance(dec(100)), SourceStep::RpcError]);
        source.script(ADDR2, "usdt", [SourceStep::Balance(dec(5)), SourceStep::Balance(dec(6))]);
        let notifier = TestMockNotifier::new();
        let a = Target::new(ADDR, "usdt");
        let b = Target::new(ADDR2, "usdt");
        let (mut sched, health, metrics) = scheduler(&source, &notifier, vec![a.clone(), b.clone()], config());

        let cancel = CancellationToken::new();
        sched.run_cycle(&cancel).await;
        let record = sched.run_cycle(&cancel).await;

        assert_eq!(record.targets_checked, 2);
        assert_eq!(record.errors, 1);
        assert_eq!(record.changes_detected, 1);
        assert_eq!(sched.state().get(&a), Some(dec(100)));
        assert_eq!(sched.state().get(&b), Some(dec(6)));

        let output = metrics.encode().unwrap();
        assert_eq!(
            sample(&output, "balance_check_errors_total", &[ADDR, "kind=\"rpc_error\""]),
            Some(1.0)
        );
        // ADDR2 succeeded after ADDR failed, so the source is healthy again
        assert!(health.snapshot().await.is_healthy(Component::Source));
        assert_eq!(health.snapshot().await.components[&Component::Source].transitions, 2);
    }

    #[tokio::test]
    async fn test_error_kinds_labelled_per_target() {
        let source = TestMockSource::new();
        source.script(ADDR, "eth", [SourceStep::ConnectionError]);
        source.script(ADDR2, "eth", [SourceStep::InvalidResponse]);
        let notifier = TestMockNotifier::new();
        let targets = vec![Target::new(ADDR, "eth"), Target::new(ADDR2, "eth")];
        let (mut sched, _, metrics) = scheduler(&source, &notifier, targets.clone(), config());

        let record = sched.run_cycle(&CancellationToken::new()).await;

        assert_eq!(record.errors, 2);
        assert!(targets.iter().all(|t| sched.state().get(t).is_none()));
        let output = metrics.encode().unwrap();
        assert_eq!(
            sample(&output, "balance_check_errors_total", &[ADDR, "kind=\"connection_error\""]),
            Some(1.0)
        );
        assert_eq!(
            sample(&output, "balance_check_errors_total", &[ADDR2, "kind=\"invalid_response\""]),
            Some(1.0)
        );
        assert_eq!(sample(&output, "errors_total", &["source", "invalid_response"]), Some(1.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_source_times_out() {
        let source = TestMockSource::new().with_fallback(SourceStep::Hang);
        let notifier = TestMockNotifier::new();
        let mut cfg = config();
        cfg.balance_timeout = Duration::from_millis(500);
        let (mut sched, health, metrics) = scheduler(&source, &notifier, vec![Target::new(ADDR, "eth")], cfg);

        let record = sched.run_cycle(&CancellationToken::new()).await;

        assert_eq!(record.errors, 1);
        assert!(!health.snapshot().await.is_healthy(Component::Source));
        let output = metrics.encode().unwrap();
        assert_eq!(sample(&output, "errors_total", &["source", "timeout"]), Some(1.0));
    }

    #[tokio::test]
    async fn test_failing_notifier_still_updates_state() {
        let source = TestMockSource::new();
        source.script(
            ADDR,
            "eth",
            [
                SourceStep::Balance(dec(1)),
                SourceStep::Balance(dec(2)),
                SourceStep::Balance(dec(3)),
            ],
        );
        let notifier = TestMockNotifier::failing();
        let target = Target::new(ADDR, "eth");
        let (mut sched, health, _) = scheduler(&source, &notifier, vec![target.clone()], config());

        let cancel = CancellationToken::new();
        for _ in 0..3 {
            sched.run_cycle(&cancel).await;
        }

        assert_eq!(sched.state().get(&target), Some(dec(3)));
        // One attempt per change, never retried
        assert_eq!(notifier.attempts(), 2);
        assert!(!health.snapshot().await.is_healthy(Component::Notifier));
    }

    #[tokio::test]
    async fn test_startup_summary_sent_once() {
        let source = TestMockSource::new().with_fallback(SourceStep::Balance(dec(9)));
        let notifier = TestMockNotifier::new();
        let mut cfg = config();
        cfg.startup_summary = true;
        let targets = vec![Target::new(ADDR, "eth"), Target::new(ADDR2, "eth")];
        let (mut sched, _, _) = scheduler(&source, &notifier, targets, cfg);

        let cancel = CancellationToken::new();
        let first = sched.run_cycle(&cancel).await;
        sched.run_cycle(&cancel).await;

        assert_eq!(first.changes_detected, 0);
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains(ADDR) && sent[0].contains(ADDR2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_in_flight_bounds_concurrency() {
        let source = TestMockSource::new()
            .with_fallback(SourceStep::Slow(Duration::from_secs(1), dec(1)));
        let notifier = TestMockNotifier::new();
        let targets: Vec<Target> = (0..6)
            .map(|i| Target::new(format!("0x{:040x}", i), "eth"))
            .collect();
        let mut cfg = config();
        cfg.max_in_flight = 2;
        let (mut sched, _, _) = scheduler(&source, &notifier, targets, cfg);

        let start = Instant::now();
        let record = sched.run_cycle(&CancellationToken::new()).await;

        assert_eq!(record.targets_checked, 6);
        assert_eq!(source.peak_in_flight(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_sequential_when_max_in_flight_is_one() {
        let source = TestMockSource::new().with_fallback(SourceStep::Balance(dec(1)));
        let notifier = TestMockNotifier::new();
        let targets = vec![Target::new(ADDR, "eth"), Target::new(ADDR2, "eth")];
        let mut cfg = config();
        cfg.max_in_flight = 1;
        let (mut sched, _, _) = scheduler(&source, &notifier, targets, cfg);

        sched.run_cycle(&CancellationToken::new()).await;
        assert_eq!(source.peak_in_flight(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_cycle_starts_interval_after_previous_start() {
        let source = TestMockSource::new()
            .with_fallback(SourceStep::Slow(Duration::from_secs(5), dec(1)));
        let notifier = TestMockNotifier::new();
        let (mut sched, _, _) = scheduler(&source, &notifier, vec![Target::new(ADDR, "eth")], config());

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                sched.run(cancel).await;
                sched
            })
        };

        tokio::time::sleep(Duration::from_secs(130)).await;
        cancel.cancel();
        let sched = handle.await.unwrap();

        let times = source.call_times();
        assert_eq!(times.len(), 3);
        assert_eq!(times[1] - times[0], Duration::from_secs(60));
        assert_eq!(times[2] - times[1], Duration::from_secs(60));
        assert_eq!(sched.cycles_completed(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overrunning_cycle_starts_next_immediately() {
        let source = TestMockSource::new()
            .with_fallback(SourceStep::Slow(Duration::from_secs(70), dec(1)));
        let notifier = TestMockNotifier::new();
        let mut cfg = config();
        cfg.balance_timeout = Duration::from_secs(120);
        let (mut sched, _, _) = scheduler(&source, &notifier, vec![Target::new(ADDR, "eth")], cfg);

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { sched.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(100)).await;
        cancel.cancel();
        handle.await.unwrap();

        let times = source.call_times();
        assert!(times.len() >= 2);
        assert_eq!(times[1] - times[0], Duration::from_secs(70));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_cycle_skips_undispatched_targets() {
        let source = TestMockSource::new()
            .with_fallback(SourceStep::Slow(Duration::from_secs(1), dec(1)));
        let notifier = TestMockNotifier::new();
        let targets: Vec<Target> = (1..=3)
            .map(|i| Target::new(format!("0x{:040x}", i), "eth"))
            .collect();
        let mut cfg = config();
        cfg.max_in_flight = 1;
        let (mut sched, _, _) = scheduler(&source, &notifier, targets.clone(), cfg);

        let cancel = CancellationToken::new();
        let (record, _) = tokio::join!(sched.run_cycle(&cancel), async {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            cancel.cancel();
        });

        // The second call was in flight at cancel time and still completes
        assert_eq!(source.calls(), 2);
        assert_eq!(record.targets_checked, 2);
        assert_eq!(sched.state().get(&targets[0]), Some(dec(1)));
        assert_eq!(sched.state().get(&targets[1]), Some(dec(1)));
        assert_eq!(sched.state().get(&targets[2]), None);
    }

    #[tokio::test]
    async fn test_run_future_is_send() {
        fn assert_send<T: Send>(_: T) {}

        let source = TestMockSource::new();
        let notifier = TestMockNotifier::new();
        let metrics = Arc::new(MetricsRegistry::new().unwrap());
        let health = Arc::new(HealthAggregator::new());
        let mut sched = Scheduler::new(source, notifier, Vec::new(), health, metrics, config());
        assert_send(sched.run(CancellationToken::new()));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_runs_nothing() {
        let source = TestMockSource::new().with_fallback(SourceStep::Balance(dec(1)));
        let notifier = TestMockNotifier::new();
        let (mut sched, _, _) = scheduler(&source, &notifier, vec![Target::new(ADDR, "eth")], config());

        let cancel = CancellationToken::new();
        cancel.cancel();
        sched.run(cancel).await;

        assert_eq!(source.calls(), 0);
        assert_eq!(sched.cycles_completed(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_inter_cycle_sleep() {
        let source = TestMockSource::new().with_fallback(SourceStep::Balance(dec(1)));
        let notifier = TestMockNotifier::new();
        let mut cfg = config();
        cfg.interval = Duration::from_secs(3600);
        let (mut sched, _, _) = scheduler(&source, &notifier, vec![Target::new(ADDR, "eth")], cfg);

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { sched.run(cancel).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        let before = Instant::now();
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(before.elapsed(), Duration::ZERO);
        assert_eq!(source.calls(), 1);
    }
}
