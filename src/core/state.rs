//! Last-known balance store
//!
//! One slot per configured target, owned by the scheduler (single writer).
//! The key set is fixed at construction, so the store can never grow past
//! the configured targets. Nothing is persisted: after a restart every
//! target starts without a baseline.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::warn;

use crate::core::types::Target;

/// In-memory mapping of target → last successfully observed balance
#[derive(Debug, Default)]
pub struct StateStore {
    slots: HashMap<Target, Option<Decimal>>,
}

impl StateStore {
    /// Create an empty store accepting exactly `targets`
    pub fn new<'a>(targets: impl IntoIterator<Item = &'a Target>) -> Self {
        let slots = targets.into_iter().map(|t| (t.clone(), None)).collect();
        Self { slots }
    }

    /// Baseline for `target`, if one was ever recorded
    pub fn get(&self, target: &Target) -> Option<Decimal> {
        self.slots.get(target).copied().flatten()
    }

    /// Overwrite the baseline for `target`
    ///
    /// Returns `false` (and stores nothing) for targets outside the
    /// configured set.
    pub fn set(&mut self, target: &Target, value: Decimal) -> bool {
        match self.slots.get_mut(target) {
            Some(slot) => {
                *slot = Some(value);
                true
            }
            None => {
                warn!(address = %target.address, token = %target.token, "Ignoring balance for unconfigured target");
                false
            }
        }
    }

    /// Number of targets that have a baseline
    pub fn baseline_count(&self) -> usize {
        self.slots.values().filter(|v| v.is_some()).count()
    }

    /// Number of configured targets
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}
