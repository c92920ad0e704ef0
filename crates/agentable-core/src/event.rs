//! Run events
//!
//! Every frame sent to a subscriber is one `RunEvent`. The serialized form is
//! tagged by `type`: `pipeline-init`, `agent-update`, `log`, `complete`,
//! `error`.

use serde::{Deserialize, Serialize};

/// Status of a single agent or task inside a pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Not started
    #[default]
    Pending,
    /// Working
    Running,
    /// Finished successfully
    Done,
    /// Failed
    Error,
}

impl AgentStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An agent as shown in the pipeline view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineAgent {
    /// Agent name (unique within the run)
    pub name: String,
    /// Role description
    pub role: String,
    /// Resolved tool names
    pub tools: Vec<String>,
    /// Current status
    pub status: AgentStatus,
}

/// A task as shown in the pipeline view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTask {
    /// Task id
    pub id: String,
    /// What the task does
    pub description: String,
    /// Expected output contract
    pub expected_output: String,
    /// Assigned agent name
    pub agent: String,
    /// Task ids that run first
    pub dependencies: Vec<String>,
    /// Output file hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    /// Current status
    pub status: AgentStatus,
}

/// Structured plan of a run: agents and tasks in execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    /// Agents
    pub agents: Vec<PipelineAgent>,
    /// Tasks in execution order
    pub tasks: Vec<PipelineTask>,
}

impl Pipeline {
    /// Apply an agent status change to the agent and its current task.
    ///
    /// Tasks of one agent run one at a time in pipeline order, so `Running`
    /// claims the first pending task and `Done`/`Error` settle the running one.
    /// Unknown agents (e.g. the spec generator) are ignored.
    pub fn apply_agent_update(&mut self, agent: &str, status: AgentStatus) {
        let Some(entry) = self.agents.iter_mut().find(|a| a.name == agent) else {
            return;
        };
        entry.status = status;

        let wanted = match status {
            AgentStatus::Running => AgentStatus::Pending,
            AgentStatus::Done | AgentStatus::Error => AgentStatus::Running,
            AgentStatus::Pending => return,
        };
        if let Some(task) = self
            .tasks
            .iter_mut()
            .find(|t| t.agent == agent && t.status == wanted)
        {
            task.status = status;
        }
    }
}

/// Event published for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RunEvent {
    /// Initial plan, sent once
    PipelineInit {
        /// Agents and tasks
        pipeline: Pipeline,
    },
    /// Per-agent progress
    AgentUpdate {
        /// Agent name
        agent: String,
        /// New status
        status: AgentStatus,
        /// Free-text detail
        message: String,
    },
    /// Generic progress line
    Log {
        /// Line text
        message: String,
    },
    /// Terminal success
    Complete {
        /// Final result text
        result: String,
    },
    /// Terminal failure
    Error {
        /// Human-readable reason
        message: String,
    },
}

impl RunEvent {
    /// Create a log event
    pub fn log(message: impl Into<String>) -> Self {
        Self::Log {
            message: message.into(),
        }
    }

    /// Create an agent update event
    pub fn agent(agent: impl Into<String>, status: AgentStatus, message: impl Into<String>) -> Self {
        Self::AgentUpdate {
            agent: agent.into(),
            status,
            message: message.into(),
        }
    }

    /// Whether this event ends the run
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    /// Event type tag as sent on the wire
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PipelineInit { .. } => "pipeline-init",
            Self::AgentUpdate { .. } => "agent-update",
            Self::Log { .. } => "log",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    /// One-line text rendering used for the run's log
    #[must_use]
    pub fn log_line(&self) -> String {
        match self {
            Self::PipelineInit { pipeline } => format!(
                "Pipeline ready: {} agents, {} tasks",
                pipeline.agents.len(),
                pipeline.tasks.len()
            ),
            Self::AgentUpdate {
                agent,
                status,
                message,
            } => {
                if message.is_empty() {
                    format!("[{}] {}", agent, status)
                } else {
                    format!("[{}] {}: {}", agent, status, message)
                }
            }
            Self::Log { message } => message.clone(),
            Self::Complete { .. } => "Run complete".to_string(),
            Self::Error { message } => format!("Run failed: {}", message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> Pipeline {
        let task = |id: &str, agent: &str| PipelineTask {
            id: id.to_string(),
            description: String::new(),
            expected_output: String::new(),
            agent: agent.to_string(),
            dependencies: vec![],
            output_file: None,
            status: AgentStatus::Pending,
        };
        Pipeline {
            agents: vec![PipelineAgent {
                name: "DataAgent".to_string(),
                role: "DataAgent".to_string(),
                tools: vec![],
                status: AgentStatus::Pending,
            }],
            tasks: vec![task("a", "DataAgent"), task("b", "DataAgent")],
        }
    }

    #[test]
    fn test_wire_format_uses_kebab_case_tags() {
        let event = RunEvent::agent("DataAgent", AgentStatus::Running, "searching");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "agent-update");
        assert_eq!(json["status"], "running");
        assert_eq!(json["message"], "searching");

        let json = serde_json::to_value(RunEvent::Complete {
            result: "ok".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "complete", "result": "ok"}));
    }

    #[test]
    fn test_pipeline_init_fields_are_camel_case() {
        let json = serde_json::to_value(RunEvent::PipelineInit {
            pipeline: pipeline(),
        })
        .unwrap();
        assert_eq!(json["type"], "pipeline-init");
        assert!(json["pipeline"]["tasks"][0].get("expectedOutput").is_some());
        assert!(json["pipeline"]["tasks"][0].get("outputFile").is_none());
    }

    #[test]
    fn test_terminal_kinds() {
        assert!(RunEvent::Error {
            message: "x".to_string()
        }
        .is_terminal());
        assert!(!RunEvent::log("x").is_terminal());
        assert_eq!(RunEvent::log("x").kind(), "log");
    }

    #[test]
    fn test_agent_updates_walk_tasks_in_order() {
        let mut p = pipeline();
        p.apply_agent_update("DataAgent", AgentStatus::Running);
        assert_eq!(p.tasks[0].status, AgentStatus::Running);
        assert_eq!(p.tasks[1].status, AgentStatus::Pending);

        p.apply_agent_update("DataAgent", AgentStatus::Done);
        p.apply_agent_update("DataAgent", AgentStatus::Running);
        assert_eq!(p.tasks[0].status, AgentStatus::Done);
        assert_eq!(p.tasks[1].status, AgentStatus::Running);
        assert_eq!(p.agents[0].status, AgentStatus::Running);

        p.apply_agent_update("SpecAgent", AgentStatus::Done);
        assert_eq!(p.agents.len(), 1);
    }

    #[test]
    fn test_log_line() {
        assert_eq!(
            RunEvent::agent("SpecAgent", AgentStatus::Done, "").log_line(),
            "[SpecAgent] done"
        );
        assert_eq!(
            RunEvent::Error {
                message: "boom".to_string()
            }
            .log_line(),
            "Run failed: boom"
        );
    }
}
