//! Error types for agentable-core

use crate::run::{RunId, RunStatus};
use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// A run with this id is already registered
    #[error("run already exists: {0}")]
    DuplicateRun(RunId),

    /// No run with this id is registered
    #[error("run not found: {0}")]
    RunNotFound(RunId),

    /// Status change that would violate pending -> running -> terminal
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: RunStatus,
        /// Requested status
        to: RunStatus,
    },

    /// Event published after the run reached a terminal state
    #[error("run {0} has already finished")]
    RunFinished(RunId),

    /// Specification cannot be turned into runnable tasks
    #[error("invalid specification: {0}")]
    InvalidSpecification(String),

    /// Engine failure while executing tasks
    #[error("execution error: {0}")]
    Execution(String),

    /// Remote backend failure (provisioning, tailing)
    #[error("remote execution error: {0}")]
    Remote(String),

    /// Operation exceeded its time bound
    #[error("timed out after {0}s")]
    Timeout(u64),

    /// Run stopped because the server is shutting down
    #[error("run cancelled: server shutting down")]
    Cancelled,

    /// New runs are refused during shutdown
    #[error("server is shutting down; not accepting new runs")]
    ShuttingDown,

    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] agentable_llm::Error),

    /// Tool execution error
    #[error("tool error: {0}")]
    Tool(#[from] agentable_tools::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
