//! Shared test doubles for the balance source and notifier traits
//!
//! Both mocks are cheap to clone; clones share state so a test can hand one
//! copy to the scheduler and keep another to script replies and inspect calls.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::errors::{NotifyError, NotifyResult, SourceError, SourceResult};
use crate::adapters::traits::{BalanceSource, Notifier};

/// One scripted reply of `TestMockSource`
#[derive(Debug, Clone)]
pub enum SourceStep {
    Balance(Decimal),
    ConnectionError,
    RpcError,
    InvalidResponse,
    /// Never answers; the caller's timeout must fire
    Hang,
    /// Answers with the balance after the delay
    Slow(Duration, Decimal),
}

#[derive(Default)]
struct SourceInner {
    scripts: Mutex<HashMap<(String, String), VecDeque<SourceStep>>>,
    fallback: Mutex<Option<SourceStep>>,
    calls: AtomicUsize,
    call_times: Mutex<Vec<tokio::time::Instant>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

/// Scripted balance source
///
/// Replies are consumed per (address, token) in order; once a script is
/// exhausted the last step repeats, or the fallback applies.
#[derive(Clone, Default)]
pub struct TestMockSource {
    inner: Arc<SourceInner>,
}

impl TestMockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply with `step` for any target that has no script
    pub fn with_fallback(self, step: SourceStep) -> Self {
        *self.inner.fallback.lock().unwrap() = Some(step);
        self
    }

    pub fn script(&self, address: &str, token: &str, steps: impl IntoIterator<Item = SourceStep>) {
        let mut scripts = self.inner.scripts.lock().unwrap();
        scripts
            .entry((address.to_string(), token.to_lowercase()))
            .or_default()
            .extend(steps);
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    /// Instants at which each call started (tokio clock)
    pub fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.inner.call_times.lock().unwrap().clone()
    }

    /// Largest number of concurrent `check_balance` calls observed
    pub fn peak_in_flight(&self) -> usize {
        self.inner.peak_in_flight.load(Ordering::SeqCst)
    }

    fn next_step(&self, address: &str, token: &str) -> Option<SourceStep> {
        let mut scripts = self.inner.scripts.lock().unwrap();
        match scripts.get_mut(&(address.to_string(), token.to_string())) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) if !queue.is_empty() => queue.front().cloned(),
            _ => self.inner.fallback.lock().unwrap().clone(),
        }
    }
}

struct InFlightGuard<'a>(&'a SourceInner);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BalanceSource for TestMockSource {
    async fn check_balance(
        &self,
        address: &str,
        token: &str,
        timeout: Duration,
    ) -> SourceResult<Decimal> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.call_times.lock().unwrap().push(tokio::time::Instant::now());
        let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.inner);

        match self.next_step(address, token) {
            Some(SourceStep::Balance(value)) => Ok(value),
            Some(SourceStep::ConnectionError) => {
                Err(SourceError::ConnectionError("connection refused".to_string()))
            }
            Some(SourceStep::RpcError) => Err(SourceError::RpcError("execution reverted".to_string())),
            Some(SourceStep::InvalidResponse) => {
                Err(SourceError::InvalidResponse("garbage".to_string()))
            }
            Some(SourceStep::Hang) => {
                tokio::time::sleep(timeout * 10).await;
                Err(SourceError::Timeout(timeout.as_millis() as u64))
            }
            Some(SourceStep::Slow(delay, value)) => {
                tokio::time::sleep(delay).await;
                Ok(value)
            }
            None => Err(SourceError::InvalidResponse(format!(
                "no script for {}/{}",
                address, token
            ))),
        }
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}

#[derive(Default)]
struct NotifierInner {
    sent: Mutex<Vec<String>>,
    attempts: AtomicUsize,
    failing: Mutex<bool>,
}

/// Notifier that records every message it was asked to deliver
#[derive(Clone, Default)]
pub struct TestMockNotifier {
    inner: Arc<NotifierInner>,
}

impl TestMockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails with `ConnectionError`
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.set_failing(true);
        notifier
    }

    pub fn set_failing(&self, failing: bool) {
        *self.inner.failing.lock().unwrap() = failing;
    }

    /// Messages delivered successfully
    pub fn sent(&self) -> Vec<String> {
        self.inner.sent.lock().unwrap().clone()
    }

    /// Every call, successful or not
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for TestMockNotifier {
    async fn send(&self, message: &str, _timeout: Duration) -> NotifyResult<()> {
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);
        if *self.inner.failing.lock().unwrap() {
            return Err(NotifyError::ConnectionError("chat unreachable".to_string()));
        }
        self.inner.sent.lock().unwrap().push(message.to_string());
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "mock"
    }
}
