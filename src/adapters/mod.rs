//! Collaborator adapters: balance sources and notifiers
//!
//! This module provides the trait seams the scheduler depends on and the
//! concrete implementations used in production (Ethereum JSON-RPC,
//! Telegram Bot API).

pub mod errors;
pub mod ethereum;
pub mod telegram;
pub mod traits;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use errors::{ErrorKind, NotifyError, NotifyResult, SourceError, SourceResult};
pub use ethereum::EthRpcSource;
pub use telegram::TelegramNotifier;
pub use traits::{BalanceSource, Notifier};
