//! LLM provider trait

use crate::completion::{
    CompletionRequest, CompletionResponse, ToolCompletionRequest, ToolCompletionResponse,
};
use crate::error::{Error, Result};

/// Trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Whether function calling is supported
    fn supports_tools(&self) -> bool;

    /// Default model
    fn default_model(&self) -> &str;

    /// Complete a conversation (text only)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Complete a conversation with tools
    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse>;
}

/// Stand-in provider used when no credentials are configured.
///
/// Every call fails with `NotConfigured`, so the server can start and runs
/// degrade to the fallback specification instead of crashing at boot.
#[derive(Debug, Clone)]
pub struct UnconfiguredProvider {
    reason: String,
}

impl UnconfiguredProvider {
    /// Create a provider that reports `reason` on every call
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for UnconfiguredProvider {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn supports_tools(&self) -> bool {
        false
    }

    fn default_model(&self) -> &str {
        ""
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse> {
        Err(Error::NotConfigured(self.reason.clone()))
    }

    async fn complete_with_tools(
        &self,
        _request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse> {
        Err(Error::NotConfigured(self.reason.clone()))
    }
}
