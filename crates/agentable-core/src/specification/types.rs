//! Specification document model

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Full specification: agents, tasks and an optional workflow note
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskSpecification {
    /// Declared agents; tasks may also reference undeclared ones
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<AgentSpec>,
    /// Tasks in declaration order
    pub tasks: Vec<TaskSpec>,
    /// Free-form workflow description, kept as given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<serde_json::Value>,
}

/// An agent declaration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique agent name
    pub name: String,
    /// Role description
    #[serde(default, alias = "role_description")]
    pub role: String,
    /// What the agent is trying to achieve
    #[serde(default)]
    pub goal: String,
    /// Persona text
    #[serde(default)]
    pub backstory: String,
    /// Tool names or aliases
    #[serde(default)]
    pub tools: Vec<String>,
    /// Execution knobs
    #[serde(default)]
    pub config: AgentConfig,
}

/// Per-agent execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Whether the agent may hand work to others
    #[serde(default = "default_true")]
    pub allow_delegation: bool,
    /// LLM rounds per task; falls back to the engine default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            allow_delegation: true,
            max_iterations: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_expected_output() -> String {
    "Task completion".to_string()
}

fn default_priority() -> String {
    "medium".to_string()
}

/// A single task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Task id, unique within the specification
    #[serde(default)]
    pub id: String,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name of the agent that performs it
    #[serde(default)]
    pub agent: String,
    /// What to do
    #[serde(default)]
    pub description: String,
    /// What the result should look like
    #[serde(default = "default_expected_output", alias = "expectedOutput")]
    pub expected_output: String,
    /// Ids of tasks that must finish first
    #[serde(
        default,
        rename = "dependsOn",
        alias = "dependencies",
        alias = "depends_on"
    )]
    pub depends_on: Vec<String>,
    /// Output file hint
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "outputFile")]
    pub output_file: Option<String>,
    /// Async hint
    #[serde(default, alias = "async")]
    pub async_execution: bool,
    /// low, medium or high
    #[serde(default = "default_priority")]
    pub priority: String,
    /// Extra task parameters (e.g. a preferred tool)
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl TaskSpec {
    /// Create a task with default optional fields
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        agent: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            agent: agent.into(),
            description: description.into(),
            expected_output: default_expected_output(),
            depends_on: Vec::new(),
            output_file: None,
            async_execution: false,
            priority: default_priority(),
            params: serde_json::Value::Null,
        }
    }

    /// Set the expected output
    #[must_use]
    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    /// Add a dependency
    #[must_use]
    pub fn with_dependency(mut self, id: impl Into<String>) -> Self {
        self.depends_on.push(id.into());
        self
    }

    /// Set the params object
    #[must_use]
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Tool named in `params.tool`, if any
    #[must_use]
    pub fn param_tool(&self) -> Option<&str> {
        self.params
            .get("tool")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

impl TaskSpecification {
    /// Parse a specification from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text)
            .map_err(|e| Error::InvalidSpecification(format!("malformed JSON: {}", e)))
    }

    /// Give every task without an id a positional one (`task_1`, ...)
    pub fn assign_missing_ids(&mut self) {
        let mut taken: HashSet<String> = self
            .tasks
            .iter()
            .filter(|t| !t.id.trim().is_empty())
            .map(|t| t.id.clone())
            .collect();

        for (index, task) in self.tasks.iter_mut().enumerate() {
            if !task.id.trim().is_empty() {
                continue;
            }
            let mut candidate = format!("task_{}", index + 1);
            let mut suffix = 1;
            while taken.contains(&candidate) {
                suffix += 1;
                candidate = format!("task_{}_{}", index + 1, suffix);
            }
            taken.insert(candidate.clone());
            task.id = candidate;
        }
    }

    /// Replace `{prompt}` placeholders in task descriptions
    pub fn substitute_prompt(&mut self, prompt: &str) {
        for task in &mut self.tasks {
            if task.description.contains("{prompt}") {
                task.description = task.description.replace("{prompt}", prompt);
            }
        }
    }

    /// Check structure: at least one task, complete tasks, unique ids, no cycles.
    ///
    /// References to unknown task ids are not an error here; the builder
    /// drops them with a warning.
    pub fn validate(&self) -> Result<()> {
        if self.tasks.is_empty() {
            return Err(Error::InvalidSpecification(
                "specification has no tasks".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for task in &self.tasks {
            if task.agent.trim().is_empty() {
                return Err(Error::InvalidSpecification(format!(
                    "task '{}' has no agent",
                    task.id
                )));
            }
            if task.description.trim().is_empty() {
                return Err(Error::InvalidSpecification(format!(
                    "task '{}' has no description",
                    task.id
                )));
            }
            if !task.id.is_empty() && !seen.insert(task.id.as_str()) {
                return Err(Error::InvalidSpecification(format!(
                    "duplicate task id '{}'",
                    task.id
                )));
            }
        }

        if let Some(id) = self.find_cycle() {
            return Err(Error::InvalidSpecification(format!(
                "dependency cycle through task '{}'",
                id
            )));
        }
        Ok(())
    }

    /// Names of agents referenced by tasks, in first-use order
    #[must_use]
    pub fn referenced_agents(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.tasks
            .iter()
            .map(|t| t.agent.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Declared agent by name
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.name == name)
    }

    fn find_cycle(&self) -> Option<String> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let edges: HashMap<&str, &[String]> = self
            .tasks
            .iter()
            .map(|t| (t.id.as_str(), t.depends_on.as_slice()))
            .collect();
        let mut marks: HashMap<&str, Mark> = HashMap::new();

        fn visit<'a>(
            id: &'a str,
            edges: &HashMap<&'a str, &'a [String]>,
            marks: &mut HashMap<&'a str, Mark>,
        ) -> Option<String> {
            match marks.get(id) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => return Some(id.to_string()),
                None => {}
            }
            let deps: &'a [String] = edges.get(id).copied()?;
            marks.insert(id, Mark::Visiting);
            for dep in deps {
                if let Some(found) = visit(dep.as_str(), edges, marks) {
                    return Some(found);
                }
            }
            marks.insert(id, Mark::Done);
            None
        }

        self.tasks
            .iter()
            .find_map(|t| visit(t.id.as_str(), &edges, &mut marks))
    }
}
