//! Error types for agentable-llm

use thiserror::Error;

/// LLM error type
#[derive(Debug, Error)]
pub enum Error {
    /// Provider not configured (missing credentials)
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// API error returned by the provider
    #[error("api error: {0}")]
    Api(String),

    /// Response could not be interpreted
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Request did not finish in time
    #[error("timeout after {0}ms")]
    Timeout(u64),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
