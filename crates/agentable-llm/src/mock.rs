//! Scripted LLM provider
//!
//! Returns queued responses in order; once the queue is drained it answers
//! with a fixed default. A failing provider errors on every call.

use crate::completion::{
    CompletionRequest, CompletionResponse, ToolCompletionRequest, ToolCompletionResponse,
};
use crate::error::{Error, Result};
use crate::provider::LlmProvider;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

const MOCK_MODEL: &str = "mock-model";

/// A mock LLM provider that returns queued responses or default ones.
#[derive(Clone)]
pub struct MockProvider {
    text: Arc<Mutex<VecDeque<String>>>,
    tool: Arc<Mutex<VecDeque<ToolCompletionResponse>>>,
    failure: Option<String>,
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    /// Create a new mock provider.
    #[must_use]
    pub fn new() -> Self {
        Self {
            text: Arc::new(Mutex::new(VecDeque::new())),
            tool: Arc::new(Mutex::new(VecDeque::new())),
            failure: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a provider whose every call fails with an API error.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new()
        }
    }

    /// Queue a response for `complete`.
    pub fn push_text(&self, content: impl Into<String>) {
        self.text
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(content.into());
    }

    /// Queue a response for `complete_with_tools`.
    pub fn push_tool_response(&self, response: ToolCompletionResponse) {
        self.tool
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// Requests received so far (both entry points).
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, request: &CompletionRequest) -> Result<()> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        match &self.failure {
            Some(message) => Err(Error::Api(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn default_model(&self) -> &str {
        MOCK_MODEL
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.record(&request)?;
        let content = self
            .text
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| "mock response".to_string());

        Ok(CompletionResponse::new(content))
    }

    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse> {
        self.record(&request.request)?;
        let queued = self
            .tool
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        Ok(queued.unwrap_or_else(|| ToolCompletionResponse::text("mock response")))
    }
}
