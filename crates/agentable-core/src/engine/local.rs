//! In-process engine: an agent loop over the LLM provider
//!
//! Async tasks without dependencies run together first; everything else
//! follows one at a time in dependency order. A failed task fails its
//! dependents with "Dependencies not met" while unrelated tasks still run.

use super::{Engine, EngineListener};
use crate::builder::{Agent, Crew, Task};
use crate::error::{Error, Result};
use agentable_llm::util::truncate_safe;
use futures::future::join_all;
use agentable_llm::{
    CompletionRequest, LlmProvider, Message, ToolCall, ToolCompletionRequest,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Tool output kept in the conversation, in bytes
const MAX_TOOL_OUTPUT: usize = 8_000;

/// Dependency output passed as context, in bytes
const MAX_CONTEXT: usize = 12_000;

/// Settings for the in-process engine
#[derive(Debug, Clone)]
pub struct LocalEngineConfig {
    /// Model for agent steps; empty means the provider default
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for LocalEngineConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.7,
        }
    }
}

/// Runs each task as a short tool-calling conversation
pub struct LocalEngine {
    llm: Arc<dyn LlmProvider>,
    config: LocalEngineConfig,
}

impl LocalEngine {
    /// Create an engine
    pub fn new(llm: Arc<dyn LlmProvider>, config: LocalEngineConfig) -> Self {
        Self { llm, config }
    }

    fn request(&self, messages: &[Message]) -> CompletionRequest {
        CompletionRequest::new(self.config.model.clone())
            .with_temperature(self.config.temperature)
            .with_messages(messages.iter().cloned())
    }

    async fn run_task(
        &self,
        agent: &Agent,
        task: &Task,
        context: &str,
        listener: &dyn EngineListener,
    ) -> Result<String> {
        let mut messages = vec![
            Message::system(system_prompt(agent)),
            Message::user(task_prompt(task, context)),
        ];
        let use_tools = !agent.tools.is_empty() && self.llm.supports_tools();
        let definitions: Vec<_> = agent
            .tools
            .iter()
            .map(|t| t.definition().to_llm())
            .collect();

        let mut round = 1;
        loop {
            if !use_tools || round >= agent.max_iterations {
                let response = self.llm.complete(self.request(&messages)).await?;
                return Ok(response.content);
            }

            let response = self
                .llm
                .complete_with_tools(ToolCompletionRequest::new(
                    self.request(&messages),
                    definitions.clone(),
                ))
                .await?;

            if !response.has_tool_calls() {
                return Ok(response.content.unwrap_or_default());
            }

            let names: Vec<&str> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
            messages.push(Message::assistant(match response.content.as_deref() {
                Some(text) if !text.trim().is_empty() => text.to_string(),
                _ => format!("Calling tools: {}", names.join(", ")),
            }));

            for call in &response.tool_calls {
                listener.tool_invoked(&agent.name, &call.name);
                let output = self.invoke(agent, call).await;
                messages.push(Message::user(format!(
                    "Result of {}:\n{}",
                    call.name,
                    truncate_safe(&output, MAX_TOOL_OUTPUT)
                )));
            }
            round += 1;
        }
    }

    /// Run one task and report it; the error is the text shown to listeners
    async fn execute(
        &self,
        crew: &Crew,
        task: &Task,
        context: &str,
        listener: &dyn EngineListener,
    ) -> std::result::Result<String, String> {
        let Some(agent) = crew.agent(&task.agent) else {
            let message = format!("no agent named {}", task.agent);
            listener.task_failed(&task.agent, task, &message);
            return Err(message);
        };

        listener.agent_started(&agent.name, task);
        match self.run_task(agent, task, context, listener).await {
            Ok(output) => {
                info!(task = %task.id, agent = %agent.name, "Task completed");
                if let Some(file) = &task.output_file {
                    listener.log(&format!("Task {} output recorded as {}", task.id, file));
                }
                listener.task_completed(&agent.name, task, &output);
                Ok(output)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(task = %task.id, agent = %agent.name, error = %message, "Task failed");
                listener.task_failed(&agent.name, task, &message);
                Err(message)
            }
        }
    }

    /// Execute one tool call; failures come back as text for the model
    async fn invoke(&self, agent: &Agent, call: &ToolCall) -> String {
        let Some(tool) = agent.tool(&call.name) else {
            warn!(agent = %agent.name, tool = %call.name, "Model called a tool the agent does not have");
            return format!("error: tool '{}' is not available", call.name);
        };
        let input = match call.arguments_value() {
            Ok(input) => input,
            Err(e) => return format!("error: invalid arguments: {}", e),
        };
        match tool.execute(input).await {
            Ok(result) => {
                debug!(tool = %call.name, success = result.success, ms = result.duration_ms, "Tool finished");
                result.to_text()
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool execution failed");
                format!("error: {}", e)
            }
        }
    }
}

#[async_trait::async_trait]
impl Engine for LocalEngine {
    fn name(&self) -> &str {
        "local"
    }

    #[instrument(skip_all, fields(tasks = crew.tasks.len()))]
    async fn kickoff(&self, crew: &Crew, listener: &dyn EngineListener) -> Result<String> {
        let mut results: HashMap<&str, std::result::Result<String, String>> = HashMap::new();
        let (parallel, sequential): (Vec<&Task>, Vec<&Task>) =
            crew.tasks.iter().partition(|task| task.is_parallel());

        if !parallel.is_empty() {
            listener.log(&format!("Executing {} parallel tasks", parallel.len()));
            let finished = join_all(
                parallel
                    .iter()
                    .map(|task| self.execute(crew, task, "", listener)),
            )
            .await;
            for (task, result) in parallel.iter().zip(finished) {
                results.insert(task.id.as_str(), result);
            }
        }

        for task in sequential {
            let met = task
                .dependencies
                .iter()
                .all(|dep| matches!(results.get(dep.as_str()), Some(Ok(_))));
            let result = if met {
                let context = task
                    .dependencies
                    .iter()
                    .filter_map(|dep| match results.get(dep.as_str()) {
                        Some(Ok(out)) => Some(format!("Output of {}:\n{}", dep, out)),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n");
                self.execute(crew, task, &context, listener).await
            } else {
                let message = "Dependencies not met".to_string();
                debug!(task = %task.id, "Skipping task after a dependency failed");
                listener.task_failed(&task.agent, task, &message);
                Err(message)
            };
            results.insert(task.id.as_str(), result);
        }

        // Dependency order puts the root cause before its dependents.
        for task in &crew.tasks {
            if let Some(Err(message)) = results.get(task.id.as_str()) {
                return Err(Error::Execution(format!(
                    "task {} failed: {}",
                    task.id, message
                )));
            }
        }
        Ok(crew
            .tasks
            .last()
            .and_then(|task| results.remove(task.id.as_str()))
            .and_then(|result| result.ok())
            .unwrap_or_default())
    }
}

fn system_prompt(agent: &Agent) -> String {
    let mut prompt = format!("You are {}. Your role: {}.", agent.name, agent.role);
    if !agent.goal.is_empty() {
        prompt.push_str(&format!("\nYour goal: {}", agent.goal));
    }
    if !agent.backstory.is_empty() {
        prompt.push_str(&format!("\nBackground: {}", agent.backstory));
    }
    prompt.push_str("\nWork on the task you are given and answer with the result only.");
    prompt
}

fn task_prompt(task: &Task, context: &str) -> String {
    let mut prompt = format!(
        "Task: {}\n\nExpected output: {}",
        task.description, task.expected_output
    );
    if !context.is_empty() {
        prompt.push_str("\n\nContext from earlier tasks:\n");
        prompt.push_str(truncate_safe(context, MAX_CONTEXT));
    }
    prompt
}
