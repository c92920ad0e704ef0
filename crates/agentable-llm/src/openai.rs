//! OpenAI provider built on async-openai

use crate::completion::{
    CompletionRequest, CompletionResponse, ToolCompletionRequest, ToolCompletionResponse,
};
use crate::error::{Error, Result};
use crate::message::{Message, MessageRole};
use crate::provider::LlmProvider;
use crate::tools::{ToolCall, ToolDefinition};
use crate::util::{mask_api_key, truncate_safe};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessage,
        ChatCompletionRequestAssistantMessageContent, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        ChatCompletionTool, ChatCompletionTools, CreateChatCompletionRequest,
        CreateChatCompletionResponse, FunctionObject,
    },
    Client,
};
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, instrument};

/// Model used when neither the request nor the config names one
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

fn sanitize_api_error(error: &str) -> String {
    let lower = error.to_lowercase();

    if lower.contains("api key")
        || lower.contains("apikey")
        || lower.contains("unauthorized")
        || lower.contains("authentication")
    {
        return "API authentication error. Please check your API key configuration.".to_string();
    }

    if lower.contains("rate limit") || lower.contains("quota") {
        return "API rate limit exceeded. Please try again later.".to_string();
    }

    if error.len() > 300 {
        format!("{}...(truncated)", truncate_safe(error, 300))
    } else {
        error.to_string()
    }
}

/// Configuration for the OpenAI provider
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key for authentication
    pub api_key: String,
    /// Optional custom base URL (proxies, compatible gateways)
    pub base_url: Option<String>,
    /// Default model to use for completions
    pub default_model: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiConfig {
    /// Creates a new configuration with the given API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: None,
            default_model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Creates configuration from `OPENAI_API_KEY` and `OPENAI_BASE_URL`.
    ///
    /// # Errors
    /// Returns error if `OPENAI_API_KEY` is unset or blank
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::NotConfigured("OPENAI_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);
        config.base_url = std::env::var("OPENAI_BASE_URL").ok();
        Ok(config)
    }

    /// Sets a custom base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Sets the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// OpenAI chat completions provider
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    default_model: String,
    timeout: Duration,
}

impl OpenAiProvider {
    /// Creates a new provider with the given configuration
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
            default_model: config.default_model,
            timeout: config.timeout,
        }
    }

    /// Creates a provider from environment variables
    ///
    /// # Errors
    /// Returns error if `OPENAI_API_KEY` is not set
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(OpenAiConfig::from_env()?))
    }

    fn model_for<'a>(&'a self, requested: &'a str) -> &'a str {
        if requested.is_empty() {
            &self.default_model
        } else {
            requested
        }
    }

    fn convert_message(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            MessageRole::System => ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                name: None,
            }
            .into(),
            MessageRole::User => ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }
            .into(),
            MessageRole::Assistant =>
            {
                #[allow(deprecated)]
                ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    function_call: None,
                    refusal: None,
                    audio: None,
                }
                .into()
            }
        }
    }

    fn convert_tool(tool: &ToolDefinition) -> ChatCompletionTools {
        ChatCompletionTools::Function(ChatCompletionTool {
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.parameters.clone()),
                strict: None,
            },
        })
    }

    async fn send(
        &self,
        call: impl Future<
            Output = std::result::Result<
                CreateChatCompletionResponse,
                async_openai::error::OpenAIError,
            >,
        >,
    ) -> Result<CreateChatCompletionResponse> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.map_err(|e| Error::Api(sanitize_api_error(&e.to_string()))),
            Err(_) => Err(Error::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn supports_tools(&self) -> bool {
        true
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let openai_request = CreateChatCompletionRequest {
            model: self.model_for(&request.model).to_string(),
            messages: request.messages.iter().map(Self::convert_message).collect(),
            temperature: request.temperature,
            ..Default::default()
        };

        debug!("Sending request to OpenAI");
        let response = self
            .send(self.client.chat().create(openai_request))
            .await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| Error::InvalidResponse("No choices in response".to_string()))?;

        Ok(CompletionResponse::new(
            choice.message.content.clone().unwrap_or_default(),
        ))
    }

    #[instrument(skip(self, request), fields(model = %request.request.model, tools = request.tools.len()))]
    async fn complete_with_tools(
        &self,
        request: ToolCompletionRequest,
    ) -> Result<ToolCompletionResponse> {
        // The API's default choice with tools present is "auto".
        let tools = (!request.tools.is_empty())
            .then(|| request.tools.iter().map(Self::convert_tool).collect());

        let openai_request = CreateChatCompletionRequest {
            model: self.model_for(&request.request.model).to_string(),
            messages: request
                .request
                .messages
                .iter()
                .map(Self::convert_message)
                .collect(),
            tools,
            temperature: request.request.temperature,
            ..Default::default()
        };

        debug!("Sending tool request to OpenAI");
        let response = self
            .send(self.client.chat().create(openai_request))
            .await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| Error::InvalidResponse("No choices in response".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .iter()
            .flatten()
            .filter_map(|tc| match tc {
                ChatCompletionMessageToolCalls::Function(call) => Some(ToolCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    arguments: call.function.arguments.clone(),
                }),
                _ => None,
            })
            .collect();

        Ok(ToolCompletionResponse {
            content: choice.message.content.clone(),
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = OpenAiConfig::new("test-key")
            .with_model("gpt-4o-mini")
            .with_base_url("http://localhost:8080/v1")
            .with_timeout(Duration::from_secs(5));

        assert_eq!(config.default_model, "gpt-4o-mini");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = OpenAiConfig::new("sk-1234567890abcdefghijklmnop");
        let debug_str = format!("{:?}", config);

        assert!(!debug_str.contains("1234567890abcdefghijkl"));
        assert!(debug_str.contains("sk-1...mnop"));
    }

    #[test]
    fn test_sanitize_api_error() {
        let sanitized = sanitize_api_error("Incorrect API key provided: sk-abc");
        assert!(!sanitized.contains("sk-"));
        assert!(sanitized.contains("authentication"));

        assert_eq!(sanitize_api_error("model not found"), "model not found");
        assert!(sanitize_api_error(&"x".repeat(400)).ends_with("(truncated)"));
    }

    #[test]
    fn test_empty_model_uses_default() {
        let provider = OpenAiProvider::new(OpenAiConfig::new("sk-test-key-123456").with_model("m1"));
        assert_eq!(provider.model_for(""), "m1");
        assert_eq!(provider.model_for("m2"), "m2");
    }
}
