//! LLM provider resolution

use super::config::LlmConfig;
use agentable_llm::{LlmProvider, OpenAiConfig, OpenAiProvider, UnconfiguredProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Resolve the LLM provider from the environment.
///
/// A missing key is not fatal: the returned provider fails every call, so
/// specification generation falls back and agent steps end the run with an error.
pub fn resolve_llm_provider(llm_config: &LlmConfig) -> Arc<dyn LlmProvider> {
    match OpenAiConfig::from_env() {
        Ok(config) => {
            let config = config
                .with_model(&llm_config.agent_model)
                .with_timeout(Duration::from_secs(llm_config.timeout_secs.max(1)));
            info!(model = %llm_config.model, "Registered OpenAI provider");
            Arc::new(OpenAiProvider::new(config))
        }
        Err(e) => {
            warn!(
                "No LLM provider configured ({}). Set OPENAI_API_KEY to enable generation.",
                e
            );
            Arc::new(UnconfiguredProvider::new(e.to_string()))
        }
    }
}
