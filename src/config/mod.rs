//! Configuration module for watch settings and YAML loading
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `CheckConfig`, `ApiConfig`, `TokenContract`)
//! - YAML loading functionality (`load_config`)
//! - Credentials read from the environment (`Credentials`)
//! - Application constants with environment variable overrides

pub mod constants;
mod credentials;
mod loader;
mod types;

// Re-export types
pub use types::{
    ApiConfig, AppConfig, CheckConfig, TokenContract, MAX_TOKEN_DECIMALS, NATIVE_DECIMALS,
    NATIVE_TOKEN,
};

pub use credentials::{Credentials, CredentialsError};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str};
