//! Error types for agentable-tools

use thiserror::Error;

/// Tool error type
#[derive(Debug, Error)]
pub enum Error {
    /// Tool not found
    #[error("tool not found: {0}")]
    NotFound(String),

    /// Tool execution failed
    #[error("execution failed: {0}")]
    Execution(String),

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Required credential missing
    #[error("tool not configured: {0}")]
    NotConfigured(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("request timed out".to_string())
        } else {
            // without_url keeps query-string credentials out of messages
            Self::Network(err.without_url().to_string())
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
