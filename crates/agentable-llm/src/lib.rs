//! Agentable LLM - provider abstraction
//!
//! This crate provides the LLM seam used by the orchestrator:
//! - Provider: the `LlmProvider` trait every backend implements
//! - OpenAI: chat completions (with function calling) via async-openai
//! - Mock: scripted provider for tests and offline runs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod completion;
pub mod error;
pub mod message;
pub mod mock;
pub mod openai;
pub mod provider;
pub mod tools;
pub mod util;

pub use completion::{
    CompletionRequest, CompletionResponse, ToolCompletionRequest, ToolCompletionResponse,
};
pub use error::{Error, Result};
pub use message::{Message, MessageRole};
pub use mock::MockProvider;
pub use openai::{OpenAiConfig, OpenAiProvider};
pub use provider::{LlmProvider, UnconfiguredProvider};
pub use tools::{ToolCall, ToolDefinition};
