//! Engine callbacks to run events

use crate::broadcaster::EventBroadcaster;
use crate::builder::Task;
use crate::engine::EngineListener;
use crate::event::{AgentStatus, Pipeline, RunEvent};
use crate::registry::RunHandle;
use agentable_llm::util::truncate_safe;
use std::sync::Arc;
use tracing::debug;

const DESCRIPTION_PREVIEW: usize = 160;

/// Publishes every engine step of one run through the broadcaster
pub struct RunListener {
    broadcaster: Arc<EventBroadcaster>,
    handle: Arc<RunHandle>,
}

impl RunListener {
    /// Listener for the run behind `handle`
    pub fn new(broadcaster: Arc<EventBroadcaster>, handle: Arc<RunHandle>) -> Self {
        Self {
            broadcaster,
            handle,
        }
    }

    /// Publish an event; a run that already finished swallows it
    pub fn publish(&self, event: RunEvent) {
        if let Err(e) = self.broadcaster.publish_to(&self.handle, event) {
            debug!(run_id = %self.handle.id(), error = %e, "Event not published");
        }
    }

    /// Publish an agent status change
    pub fn agent_update(&self, agent: &str, status: AgentStatus, message: impl Into<String>) {
        self.publish(RunEvent::agent(agent, status, message));
    }

    /// Publish the initial plan
    pub fn pipeline_init(&self, pipeline: Pipeline) {
        self.publish(RunEvent::PipelineInit { pipeline });
    }
}

impl EngineListener for RunListener {
    fn agent_started(&self, agent: &str, task: &Task) {
        let description = truncate_safe(&task.description, DESCRIPTION_PREVIEW);
        self.agent_update(
            agent,
            AgentStatus::Running,
            format!("Working on {}: {}", task.id, description),
        );
    }

    fn tool_invoked(&self, agent: &str, tool: &str) {
        self.publish(RunEvent::log(format!("{} is using {}", agent, tool)));
    }

    fn task_completed(&self, agent: &str, task: &Task, _output: &str) {
        self.agent_update(agent, AgentStatus::Done, format!("Completed {}", task.id));
    }

    fn task_failed(&self, agent: &str, task: &Task, error: &str) {
        self.agent_update(
            agent,
            AgentStatus::Error,
            format!("Failed {}: {}", task.id, error),
        );
    }

    fn log(&self, message: &str) {
        self.publish(RunEvent::log(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RunRegistry;
    use crate::run::{RunId, RunStatus};

    fn task() -> Task {
        Task {
            id: "researchTask".to_string(),
            description: "Research and gather information about: rust".to_string(),
            expected_output: "notes".to_string(),
            agent: "DataAgent".to_string(),
            dependencies: Vec::new(),
            output_file: None,
            async_execution: false,
        }
    }

    #[test]
    fn test_callbacks_become_events() {
        let registry = Arc::new(RunRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new(Arc::clone(&registry)));
        let handle = registry.create(RunId::new(), "rust").unwrap();
        handle.update(|run| run.transition(RunStatus::Running)).unwrap();
        let listener = RunListener::new(broadcaster, Arc::clone(&handle));

        listener.agent_started("DataAgent", &task());
        listener.tool_invoked("DataAgent", "WebsiteSearchTool");
        listener.task_completed("DataAgent", &task(), "notes");
        listener.task_failed("DataAgent", &task(), "boom");
        listener.log("plain");

        let kinds: Vec<&str> = handle.snapshot().events.iter().map(RunEvent::kind).collect();
        assert_eq!(
            kinds,
            vec!["agent-update", "log", "agent-update", "agent-update", "log"]
        );
        assert_eq!(
            handle.snapshot().events[1],
            RunEvent::log("DataAgent is using WebsiteSearchTool")
        );
    }

    #[test]
    fn test_events_after_terminal_are_dropped() {
        let registry = Arc::new(RunRegistry::new());
        let broadcaster = Arc::new(EventBroadcaster::new(Arc::clone(&registry)));
        let handle = registry.create(RunId::new(), "rust").unwrap();
        handle.update(|run| run.transition(RunStatus::Running)).unwrap();
        let listener = RunListener::new(broadcaster, Arc::clone(&handle));

        listener.publish(RunEvent::Complete {
            result: "ok".to_string(),
        });
        listener.log("late");

        assert_eq!(handle.snapshot().events.len(), 1);
    }
}
