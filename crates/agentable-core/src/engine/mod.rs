//! Execution engine seam
//!
//! An engine executes a built crew and reports progress through an
//! [`EngineListener`]. The driver supplies the listener and turns each
//! callback into a run event, so engines never see the broadcaster.

mod local;

pub use local::{LocalEngine, LocalEngineConfig};

use crate::builder::{Crew, Task};
use crate::error::Result;

/// Progress callbacks from an engine
pub trait EngineListener: Send + Sync {
    /// An agent picked up a task
    fn agent_started(&self, agent: &str, task: &Task);

    /// An agent invoked a tool
    fn tool_invoked(&self, agent: &str, tool: &str);

    /// A task produced its output
    fn task_completed(&self, agent: &str, task: &Task, output: &str);

    /// A task failed or was skipped because a dependency failed
    fn task_failed(&self, agent: &str, task: &Task, error: &str);

    /// Free-form progress line
    fn log(&self, message: &str);
}

/// Executes crews
#[async_trait::async_trait]
pub trait Engine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Run every task of the crew and return the final result text
    async fn kickoff(&self, crew: &Crew, listener: &dyn EngineListener) -> Result<String>;
}
