use agentable_core::{Pipeline, Run, RunEvent, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Largest page `GET /api/history` returns
pub const MAX_HISTORY_LIMIT: i64 = 100;

/// Query parameters for listing runs
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct HistoryQuery {
    /// Maximum number of results (1..=100)
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

impl HistoryQuery {
    pub fn effective_limit(&self) -> usize {
        // Clamped into 1..=100, so the cast cannot truncate.
        self.limit.clamp(1, MAX_HISTORY_LIMIT) as usize
    }
}

/// Run summary for the list view
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    #[schema(value_type = String, format = Uuid)]
    pub id: RunId,
    pub prompt: String,
    /// pending, running, complete or error
    pub status: String,
    pub result: Option<String>,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
}

impl From<&Run> for RunSummary {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            prompt: run.prompt.clone(),
            status: run.status.to_string(),
            result: run.result.clone(),
            timestamp: run.created_at,
            duration_seconds: run.duration_seconds(),
        }
    }
}

/// Full run record
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunDetail {
    #[schema(value_type = String, format = Uuid)]
    pub id: RunId,
    pub prompt: String,
    pub status: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    /// Agents and tasks with their latest statuses
    #[schema(value_type = Option<Object>)]
    pub pipeline: Option<Pipeline>,
    /// Ordered text log
    pub logs: Vec<String>,
    /// Every published event, in order
    #[schema(value_type = Vec<Object>)]
    pub events: Vec<RunEvent>,
}

impl From<Run> for RunDetail {
    fn from(run: Run) -> Self {
        let logs = run.logs();
        let duration_seconds = run.duration_seconds();
        Self {
            id: run.id,
            prompt: run.prompt,
            status: run.status.to_string(),
            result: run.result,
            error: run.error,
            timestamp: run.created_at,
            completed_at: run.completed_at,
            duration_seconds,
            pipeline: run.pipeline,
            logs,
            events: run.events,
        }
    }
}

/// Result of clearing the history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearedResponse {
    /// Number of runs removed
    pub cleared: usize,
}
