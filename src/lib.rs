//! Balance Watch
//!
//! Periodically checks on-chain token balances for a fixed set of
//! addresses, alerts on every change and exposes health and Prometheus
//! metrics over HTTP:
//! - Collaborator adapters (Ethereum JSON-RPC, Telegram)
//! - Check scheduler with change detection
//! - Health aggregation and metrics export

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod server;

pub use error::AppError;
