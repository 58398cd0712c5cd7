//! Collaborator error types
//!
//! Balance source and notifier failures are classified into small,
//! closed enums so the scheduler can label metrics and health signals
//! without inspecting error strings.

use thiserror::Error;

/// Flat error classification shared by metrics labels and log fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ConnectionError,
    RpcError,
    Timeout,
    InvalidResponse,
    AuthError,
    RateLimited,
}

impl ErrorKind {
    /// Stable label used in metrics and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionError => "connection_error",
            ErrorKind::RpcError => "rpc_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::RateLimited => "rate_limited",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors returned by a balance source
#[derive(Error, Debug)]
pub enum SourceError {
    /// Upstream node unreachable
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    /// Upstream reachable but rejected the request
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Call exceeded its bound
    #[error("Balance check timed out after {0}ms")]
    Timeout(u64),

    /// Upstream returned data we could not interpret
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl SourceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SourceError::ConnectionError(_) => ErrorKind::ConnectionError,
            SourceError::RpcError(_) => ErrorKind::RpcError,
            SourceError::Timeout(_) => ErrorKind::Timeout,
            SourceError::InvalidResponse(_) => ErrorKind::InvalidResponse,
        }
    }
}

/// Errors returned by a notifier
#[derive(Error, Debug)]
pub enum NotifyError {
    /// Delivery endpoint unreachable or failed
    #[error("Connection failed: {0}")]
    ConnectionError(String),

    /// Credential rejected
    #[error("Authentication rejected: {0}")]
    AuthError(String),

    /// Upstream backpressure, with the suggested wait when provided
    #[error("Rate limited (retry after {0:?}s)")]
    RateLimited(Option<u64>),

    /// Call exceeded its bound
    #[error("Notification timed out after {0}ms")]
    Timeout(u64),
}

impl NotifyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NotifyError::ConnectionError(_) => ErrorKind::ConnectionError,
            NotifyError::AuthError(_) => ErrorKind::AuthError,
            NotifyError::RateLimited(_) => ErrorKind::RateLimited,
            NotifyError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

/// Result type alias for balance source operations
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type alias for notifier operations
pub type NotifyResult<T> = std::result::Result<T, NotifyError>;
