//! Unified error types for Rove

use thiserror::Error;

/// Low-level network failure categories that retry predicates care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectionReset,
    ConnectionRefused,
    Dns,
    Other,
}

impl std::fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::Dns => write!(f, "dns resolution failed"),
            Self::Other => write!(f, "network error"),
        }
    }
}

/// Unified error type for all Rove operations
#[derive(Error, Debug)]
pub enum RoveError {
    // Startup errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Remote errors
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    // Tool errors
    #[error("Tool error: {0}")]
    Tool(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl RoveError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// HTTP 429
    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    /// HTTP 5xx
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| s >= 500)
    }

    /// Connection reset, connection refused, DNS failure, or any timeout.
    ///
    /// Errors that only describe themselves in text still count as timeouts
    /// when their message mentions one.
    pub fn is_connection_failure(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Network { kind, .. } => *kind != NetworkErrorKind::Other,
            other => other.to_string().to_lowercase().contains("timeout"),
        }
    }
}

/// Result type alias using RoveError
pub type Result<T> = std::result::Result<T, RoveError>;
