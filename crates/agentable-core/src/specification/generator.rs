//! Specification generator
//!
//! Asks the LLM for a specification and falls back to a fixed two-task
//! research/analysis plan whenever the answer is unusable.

use super::types::{TaskSpec, TaskSpecification};
use crate::error::{Error, Result};
use agentable_llm::util::strip_code_fence;
use agentable_llm::{CompletionRequest, LlmProvider, Message};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Agent name used in progress events while the specification is generated
pub const SPEC_AGENT: &str = "SpecAgent";

const SYSTEM_PROMPT: &str = r#"You convert user requests into multi-agent task specifications.

Respond with a single JSON object of this shape and nothing else:
{
  "agents": [
    {
      "name": "UniqueAgentName",
      "role": "What the agent is",
      "goal": "What the agent wants to achieve",
      "backstory": "Short persona",
      "tools": ["ToolName"]
    }
  ],
  "tasks": [
    {
      "id": "unique_task_id",
      "agent": "UniqueAgentName",
      "description": "Clear task description; may use the {prompt} placeholder",
      "expected_output": "What the task should produce",
      "dependsOn": ["id_of_an_earlier_task"],
      "params": { "tool": "ToolName" }
    }
  ]
}

Rules:
- Every task needs an id, an agent and a description.
- Dependencies must reference earlier task ids and must not form cycles.
- Only use tools from the list of available tools.
- Common agents: DataAgent (fetching and searching), AnalysisAgent (analysis and summarization), ResearchAgent (research), WritingAgent (content)."#;

/// Generator settings
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Model name; empty means the provider default
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound for one LLM call
    pub timeout: Duration,
    /// Tool names advertised to the LLM
    pub tool_names: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.1,
            timeout: Duration::from_secs(60),
            tool_names: Vec::new(),
        }
    }
}

/// Where a specification came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecOrigin {
    /// Parsed from the LLM answer
    Generated,
    /// The built-in fallback; `reason` says why
    Fallback {
        /// Why the LLM answer was not used
        reason: String,
    },
}

/// Result of a generation attempt
#[derive(Debug, Clone)]
pub struct GeneratedSpec {
    /// The specification to run
    pub spec: TaskSpecification,
    /// Whether it came from the LLM or the fallback
    pub origin: SpecOrigin,
}

impl GeneratedSpec {
    /// Whether the fallback was used
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, SpecOrigin::Fallback { .. })
    }
}

/// Turns prompts into specifications
pub struct SpecGenerator {
    llm: Arc<dyn LlmProvider>,
    config: GeneratorConfig,
}

impl SpecGenerator {
    /// Create a generator
    pub fn new(llm: Arc<dyn LlmProvider>, config: GeneratorConfig) -> Self {
        Self { llm, config }
    }

    /// Generate a specification for `prompt`. Never fails: any LLM or
    /// parsing problem yields the fallback plan.
    pub async fn generate(&self, prompt: &str) -> GeneratedSpec {
        match self.try_generate(prompt).await {
            Ok(spec) => {
                info!(
                    tasks = spec.tasks.len(),
                    agents = spec.agents.len(),
                    "Specification generated"
                );
                GeneratedSpec {
                    spec,
                    origin: SpecOrigin::Generated,
                }
            }
            Err(e) => {
                warn!(error = %e, "Specification generation failed, using fallback");
                GeneratedSpec {
                    spec: Self::fallback(prompt),
                    origin: SpecOrigin::Fallback {
                        reason: e.to_string(),
                    },
                }
            }
        }
    }

    async fn try_generate(&self, prompt: &str) -> Result<TaskSpecification> {
        let request = CompletionRequest::new(self.config.model.clone())
            .with_temperature(self.config.temperature)
            .with_messages([
                Message::system(self.system_prompt()),
                Message::user(format!(
                    "Convert this prompt to a task specification: {}",
                    prompt
                )),
            ]);

        let response = tokio::time::timeout(self.config.timeout, self.llm.complete(request))
            .await
            .map_err(|_| Error::Timeout(self.config.timeout.as_secs()))??;
        debug!(chars = response.content.len(), "Specification answer received");

        Self::parse(&response.content, prompt)
    }

    /// Parse an LLM answer into a validated specification
    pub fn parse(answer: &str, prompt: &str) -> Result<TaskSpecification> {
        let mut spec = TaskSpecification::from_json(strip_code_fence(answer))?;
        spec.assign_missing_ids();
        spec.validate()?;
        spec.substitute_prompt(prompt);
        Ok(spec)
    }

    fn system_prompt(&self) -> String {
        if self.config.tool_names.is_empty() {
            return format!("{}\n\nAvailable tools: none", SYSTEM_PROMPT);
        }
        format!(
            "{}\n\nAvailable tools: {}",
            SYSTEM_PROMPT,
            self.config.tool_names.join(", ")
        )
    }

    /// The fixed research-then-analysis plan
    #[must_use]
    pub fn fallback(prompt: &str) -> TaskSpecification {
        TaskSpecification {
            agents: Vec::new(),
            tasks: vec![
                TaskSpec::new(
                    "researchTask",
                    "DataAgent",
                    format!("Research and gather information about: {}", prompt),
                )
                .with_expected_output("A comprehensive list of relevant information")
                .with_params(serde_json::json!({ "tool": "search", "limit": 10 })),
                TaskSpec::new(
                    "analysisTask",
                    "AnalysisAgent",
                    format!("Analyze the research findings for: {}", prompt),
                )
                .with_expected_output("A detailed analysis and summary")
                .with_dependency("researchTask")
                .with_params(serde_json::json!({
                    "method": "summarize",
                    "model": "gpt-3.5-turbo"
                })),
            ],
            workflow: None,
        }
    }
}
