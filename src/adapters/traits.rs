//! Collaborator trait definitions
//!
//! The scheduler only talks to the outside world through these two traits.
//! Concrete implementations live next to this module (`ethereum`, `telegram`);
//! tests substitute in-memory mocks.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::errors::{NotifyResult, SourceResult};

/// Source of on-chain token balances
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
///
/// struct FixedSource(Decimal);
///
/// #[async_trait]
/// impl BalanceSource for FixedSource {
///     async fn check_balance(&self, _address: &str, _token: &str, _timeout: Duration)
///         -> SourceResult<Decimal>
///     {
///         Ok(self.0)
///     }
///     fn source_name(&self) -> &'static str { "fixed" }
/// }
/// ```
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Fetch the current balance of `token` held by `address`
    ///
    /// # Arguments
    /// * `address` - Checksummed account address
    /// * `token` - Lowercase token symbol (e.g. "usdt", "eth")
    /// * `timeout` - Upper bound for the whole call
    ///
    /// # Returns
    /// The balance in whole token units (already scaled by decimals)
    async fn check_balance(
        &self,
        address: &str,
        token: &str,
        timeout: Duration,
    ) -> SourceResult<Decimal>;

    /// Short identifier used in logs (e.g. "eth_rpc")
    fn source_name(&self) -> &'static str;
}

/// Delivery channel for human-readable alerts
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `message`, failing if it cannot be delivered within `timeout`
    async fn send(&self, message: &str, timeout: Duration) -> NotifyResult<()>;

    /// Short identifier used in logs (e.g. "telegram")
    fn notifier_name(&self) -> &'static str;
}
