//! Application-wide error types using thiserror
//!
//! All errors that can abort startup or the API server are wrapped in
//! AppError. Per-call failures inside a cycle stay as `SourceError` /
//! `NotifyError` and are never escalated.

use thiserror::Error;

use crate::config::CredentialsError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let err: AppError = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml").into();
        assert!(err.to_string().starts_with("IO error"));
    }

    #[test]
    fn test_credentials_error_converts() {
        let err: AppError = CredentialsError::MissingEnvVars(vec!["RPC_URL".into()]).into();
        assert!(err.to_string().contains("RPC_URL"));
    }
}
