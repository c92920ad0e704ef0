//! Run - one end-to-end execution of a submitted prompt

use crate::error::{Error, Result};
use crate::event::{Pipeline, RunEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Generate a fresh random identifier
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight characters, used for naming external resources
    #[must_use]
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for RunId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Lifecycle status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Registered, driver not started yet
    Pending,
    /// Driver is executing
    Running,
    /// Finished successfully
    Complete,
    /// Finished with a failure
    Error,
}

impl RunStatus {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }

    /// Whether the status is final
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// Whether `self -> next` respects pending -> running -> {complete | error}.
    ///
    /// A run that never started may still fail (e.g. refused at shutdown).
    #[must_use]
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Error)
                | (Self::Running, Self::Running)
                | (Self::Running, Self::Complete)
                | (Self::Running, Self::Error)
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored state of a run
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    /// Identifier
    pub id: RunId,
    /// Originating prompt
    pub prompt: String,
    /// Current status
    pub status: RunStatus,
    /// Every published event, in order
    pub events: Vec<RunEvent>,
    /// Final result text
    pub result: Option<String>,
    /// Failure message
    pub error: Option<String>,
    /// Agent/task plan with live statuses
    pub pipeline: Option<Pipeline>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Time the run reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Create a pending run
    #[must_use]
    pub fn new(id: RunId, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            status: RunStatus::Pending,
            events: Vec::new(),
            result: None,
            error: None,
            pipeline: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Move to `next`, rejecting transitions that go backwards
    pub fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Append an event and apply its effect on status, result and pipeline.
    ///
    /// Nothing is recorded once the run is terminal.
    pub fn record(&mut self, event: RunEvent) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::RunFinished(self.id));
        }

        match &event {
            RunEvent::PipelineInit { pipeline } => self.pipeline = Some(pipeline.clone()),
            RunEvent::AgentUpdate { agent, status, .. } => {
                if let Some(pipeline) = self.pipeline.as_mut() {
                    pipeline.apply_agent_update(agent, *status);
                }
            }
            RunEvent::Log { .. } => {}
            RunEvent::Complete { result } => {
                self.transition(RunStatus::Complete)?;
                self.result = Some(result.clone());
            }
            RunEvent::Error { message } => {
                self.transition(RunStatus::Error)?;
                self.error = Some(message.clone());
            }
        }

        self.events.push(event);
        Ok(())
    }

    /// Ordered text log derived from the recorded events
    #[must_use]
    pub fn logs(&self) -> Vec<String> {
        self.events.iter().map(RunEvent::log_line).collect()
    }

    /// Whole seconds between creation and completion
    #[must_use]
    pub fn duration_seconds(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.created_at).num_seconds())
    }
}
