//! Balance change detection.
//!
//! Pure comparison of the last known balance against a fresh reading.
//! Equality is exact: balances are fixed-point amounts, so `1.50` and `1.5`
//! are the same balance while `1.5` and `1.5000001` are not.

use rust_decimal::Decimal;

/// Classification of a fresh reading against the stored baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// First successful reading for this target; never reported
    NoBaseline,
    /// Same value as the baseline
    Unchanged,
    /// Value moved by `delta` (current - prior, may be negative)
    Changed(Decimal),
}

/// Compare `current` against the optional `prior` baseline.
pub fn detect(prior: Option<Decimal>, current: Decimal) -> ChangeOutcome {
    match prior {
        None => ChangeOutcome::NoBaseline,
        Some(prior) if prior == current => ChangeOutcome::Unchanged,
        Some(prior) => ChangeOutcome::Changed(current - prior),
    }
}
