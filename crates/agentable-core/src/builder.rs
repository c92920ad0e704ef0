//! Agent/Task Builder - turns a specification into a runnable crew
//!
//! One agent is created per distinct agent name referenced by a task.
//! Tool names are resolved against the static tool registry; names the
//! registry does not know are dropped with a warning so the agent simply
//! runs without that capability. Tasks come out in dependency order.

use crate::error::{Error, Result};
use crate::event::{AgentStatus, Pipeline, PipelineAgent, PipelineTask};
use crate::specification::{TaskSpec, TaskSpecification};
use agentable_tools::{Tool, ToolRegistry};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// LLM rounds per task when the agent does not say otherwise
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// A runnable agent
#[derive(Clone)]
pub struct Agent {
    /// Unique name
    pub name: String,
    /// Role description
    pub role: String,
    /// Goal text
    pub goal: String,
    /// Persona text
    pub backstory: String,
    /// Resolved tools
    pub tools: Vec<Arc<dyn Tool>>,
    /// LLM rounds per task
    pub max_iterations: u32,
}

impl Agent {
    /// Canonical names of the resolved tools
    #[must_use]
    pub fn tool_names(&self) -> Vec<String> {
        self.tools
            .iter()
            .map(|t| t.definition().name.clone())
            .collect()
    }

    /// Resolved tool by canonical name
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.definition().name == name)
    }
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("tools", &self.tool_names())
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

/// A runnable task
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Task id
    pub id: String,
    /// What to do
    pub description: String,
    /// Expected output contract
    pub expected_output: String,
    /// Assigned agent name
    pub agent: String,
    /// Dependencies that exist in the specification
    pub dependencies: Vec<String>,
    /// Output file hint
    pub output_file: Option<String>,
    /// May run alongside other independent async tasks
    pub async_execution: bool,
}

impl Task {
    /// Async task with nothing to wait for
    #[must_use]
    pub fn is_parallel(&self) -> bool {
        self.async_execution && self.dependencies.is_empty()
    }
}

/// Agents and tasks ready for an engine
#[derive(Debug, Clone)]
pub struct Crew {
    /// Agents in first-use order
    pub agents: Vec<Agent>,
    /// Tasks in dependency order
    pub tasks: Vec<Task>,
    /// Degradations noticed while building (unknown tools, dropped dependencies)
    pub warnings: Vec<String>,
}

impl Crew {
    /// Agent by name
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&Agent> {
        self.agents.iter().find(|a| a.name == name)
    }

    /// Pipeline view with every status pending
    #[must_use]
    pub fn pipeline(&self) -> Pipeline {
        Pipeline {
            agents: self
                .agents
                .iter()
                .map(|agent| PipelineAgent {
                    name: agent.name.clone(),
                    role: agent.role.clone(),
                    tools: agent.tool_names(),
                    status: AgentStatus::Pending,
                })
                .collect(),
            tasks: self
                .tasks
                .iter()
                .map(|task| PipelineTask {
                    id: task.id.clone(),
                    description: task.description.clone(),
                    expected_output: task.expected_output.clone(),
                    agent: task.agent.clone(),
                    dependencies: task.dependencies.clone(),
                    output_file: task.output_file.clone(),
                    status: AgentStatus::Pending,
                })
                .collect(),
        }
    }
}

/// Builds crews from specifications
pub struct CrewBuilder {
    tools: Arc<ToolRegistry>,
    default_max_iterations: u32,
}

impl CrewBuilder {
    /// Create a builder over a tool registry
    #[must_use]
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            tools,
            default_max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set the per-task LLM round limit used when an agent does not set one
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.default_max_iterations = max_iterations.max(1);
        self
    }

    /// Tool registry in use
    #[must_use]
    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    /// Build a crew.
    ///
    /// Fails only for an empty task list or a dependency cycle; every other
    /// problem degrades with a warning.
    pub fn build(&self, spec: &TaskSpecification) -> Result<Crew> {
        if spec.tasks.is_empty() {
            return Err(Error::InvalidSpecification(
                "specification has no tasks".to_string(),
            ));
        }

        let mut warnings = Vec::new();
        let agents = spec
            .referenced_agents()
            .into_iter()
            .map(|name| self.build_agent(spec, name, &mut warnings))
            .collect();
        let tasks = order_tasks(&spec.tasks, &mut warnings)?;

        debug!(
            agents = spec.referenced_agents().len(),
            tasks = tasks.len(),
            warnings = warnings.len(),
            "Crew built"
        );
        Ok(Crew {
            agents,
            tasks,
            warnings,
        })
    }

    fn build_agent(
        &self,
        spec: &TaskSpecification,
        name: &str,
        warnings: &mut Vec<String>,
    ) -> Agent {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();
        let mut push_tool = |tool: Arc<dyn Tool>| {
            if !tools
                .iter()
                .any(|t| t.definition().name == tool.definition().name)
            {
                tools.push(tool);
            }
        };

        let declared = spec.agent(name);
        for tool_name in declared.map(|a| a.tools.as_slice()).unwrap_or_default() {
            match self.tools.get(tool_name) {
                Some(tool) => push_tool(tool),
                None => {
                    warn!(agent = %name, tool = %tool_name, "Unknown tool skipped");
                    warnings.push(format!(
                        "Agent {} requested unknown tool '{}'; continuing without it",
                        name, tool_name
                    ));
                }
            }
        }

        // Task params may name a preferred tool (e.g. the fallback's "search").
        for task in spec.tasks.iter().filter(|t| t.agent == name) {
            if let Some(tool_name) = task.param_tool() {
                match self.tools.get(tool_name) {
                    Some(tool) => push_tool(tool),
                    None => debug!(task = %task.id, tool = %tool_name, "Ignoring unknown param tool"),
                }
            }
        }

        match declared {
            Some(agent) => Agent {
                name: name.to_string(),
                role: non_empty_or(&agent.role, name),
                goal: agent.goal.clone(),
                backstory: agent.backstory.clone(),
                tools,
                max_iterations: agent
                    .config
                    .max_iterations
                    .unwrap_or(self.default_max_iterations)
                    .max(1),
            },
            None => Agent {
                name: name.to_string(),
                role: name.to_string(),
                goal: spec
                    .tasks
                    .iter()
                    .find(|t| t.agent == name)
                    .map(|t| t.description.clone())
                    .unwrap_or_default(),
                backstory: String::new(),
                tools,
                max_iterations: self.default_max_iterations,
            },
        }
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.trim().is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// Kahn's algorithm; among ready tasks the specification order is kept.
fn order_tasks(specs: &[TaskSpec], warnings: &mut Vec<String>) -> Result<Vec<Task>> {
    let ids: HashSet<&str> = specs.iter().map(|t| t.id.as_str()).collect();

    let mut tasks: Vec<Task> = Vec::with_capacity(specs.len());
    for spec in specs {
        let mut dependencies = Vec::new();
        for dep in &spec.depends_on {
            if dep == &spec.id {
                warn!(task = %spec.id, "Task depends on itself; dependency dropped");
                warnings.push(format!("Task {} depends on itself; ignoring", spec.id));
            } else if ids.contains(dep.as_str()) {
                if !dependencies.contains(dep) {
                    dependencies.push(dep.clone());
                }
            } else {
                warn!(task = %spec.id, dependency = %dep, "Unknown dependency dropped");
                warnings.push(format!(
                    "Task {} depends on unknown task '{}'; treating it as independent",
                    spec.id, dep
                ));
            }
        }
        tasks.push(Task {
            id: spec.id.clone(),
            description: spec.description.clone(),
            expected_output: spec.expected_output.clone(),
            agent: spec.agent.clone(),
            dependencies,
            output_file: spec.output_file.clone(),
            async_execution: spec.async_execution,
        });
    }

    let position: HashMap<&str, usize> = tasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();
    let mut remaining: Vec<usize> = tasks.iter().map(|t| t.dependencies.len()).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tasks.len()];
    for (i, task) in tasks.iter().enumerate() {
        for dep in &task.dependencies {
            if let Some(&d) = position.get(dep.as_str()) {
                dependents[d].push(i);
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..tasks.len()).filter(|&i| remaining[i] == 0).collect();
    let mut order = Vec::with_capacity(tasks.len());
    while let Some(i) = ready.pop_front() {
        order.push(i);
        let mut unlocked = Vec::new();
        for &next in &dependents[i] {
            remaining[next] -= 1;
            if remaining[next] == 0 {
                unlocked.push(next);
            }
        }
        unlocked.sort_unstable();
        ready.extend(unlocked);
    }

    if order.len() != tasks.len() {
        let stuck = (0..tasks.len())
            .find(|i| !order.contains(i))
            .map(|i| tasks[i].id.clone())
            .unwrap_or_default();
        return Err(Error::InvalidSpecification(format!(
            "dependency cycle through task '{}'",
            stuck
        )));
    }

    let mut slots: Vec<Option<Task>> = tasks.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specification::SpecGenerator;
    use agentable_tools::{register_catalog, ToolCredentials};

    fn builder() -> CrewBuilder {
        let mut registry = ToolRegistry::new();
        register_catalog(&mut registry, &ToolCredentials::default());
        CrewBuilder::new(Arc::new(registry))
    }

    fn spec(json: &str) -> TaskSpecification {
        TaskSpecification::from_json(json).unwrap()
    }

    #[test]
    fn test_one_agent_per_referenced_name() {
        let crew = builder()
            .build(&spec(
                r#"{"tasks": [
                    {"id": "a", "agent": "Researcher", "description": "one"},
                    {"id": "b", "agent": "Writer", "description": "two"},
                    {"id": "c", "agent": "Researcher", "description": "three"}
                ]}"#,
            ))
            .unwrap();

        let names: Vec<&str> = crew.agents.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["Researcher", "Writer"]);
        let synthesized = crew.agent("Writer").unwrap();
        assert_eq!(synthesized.role, "Writer");
        assert_eq!(synthesized.goal, "two");
        assert!(synthesized.tools.is_empty());
        assert_eq!(synthesized.max_iterations, DEFAULT_MAX_ITERATIONS);
    }

    #[test]
    fn test_unknown_tools_are_skipped() {
        let crew = builder()
            .build(&spec(
                r#"{
                    "agents": [{"name": "A", "role": "r", "tools": ["exa_search_tool", "TelepathyTool", "DallETool"],
                                "config": {"max_iterations": 5}}],
                    "tasks": [{"id": "a", "agent": "A", "description": "d"}]
                }"#,
            ))
            .unwrap();

        let agent = crew.agent("A").unwrap();
        assert_eq!(agent.tool_names(), vec!["WebsiteSearchTool", "DallETool"]);
        assert_eq!(agent.max_iterations, 5);
        assert_eq!(crew.warnings.len(), 1);
        assert!(crew.warnings[0].contains("TelepathyTool"));
    }

    #[test]
    fn test_param_tool_is_attached_once() {
        let crew = builder()
            .build(&spec(
                r#"{
                    "agents": [{"name": "A", "tools": ["WebsiteSearchTool"]}],
                    "tasks": [
                        {"id": "a", "agent": "A", "description": "d", "params": {"tool": "search"}},
                        {"id": "b", "agent": "A", "description": "d", "params": {"tool": "sentiment"}}
                    ]
                }"#,
            ))
            .unwrap();
        assert_eq!(crew.agent("A").unwrap().tool_names(), vec!["WebsiteSearchTool"]);
        assert!(crew.warnings.is_empty());
    }

    #[test]
    fn test_dependency_order() {
        let crew = builder()
            .build(&spec(
                r#"{"tasks": [
                    {"id": "report", "agent": "W", "description": "d", "dependsOn": ["analyze", "images"]},
                    {"id": "analyze", "agent": "A", "description": "d", "dependsOn": ["fetch"]},
                    {"id": "fetch", "agent": "D", "description": "d"},
                    {"id": "images", "agent": "I", "description": "d"}
                ]}"#,
            ))
            .unwrap();

        let order: Vec<&str> = crew.tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(order, vec!["fetch", "images", "analyze", "report"]);
    }

    #[test]
    fn test_missing_dependency_fails_open() {
        let crew = builder()
            .build(&spec(
                r#"{"tasks": [
                    {"id": "b", "agent": "A", "description": "d", "dependsOn": ["ghost", "a"]},
                    {"id": "a", "agent": "A", "description": "d"}
                ]}"#,
            ))
            .unwrap();

        assert_eq!(crew.tasks[0].id, "a");
        assert_eq!(crew.tasks[1].dependencies, vec!["a".to_string()]);
        assert!(crew.warnings.iter().any(|w| w.contains("ghost")));
    }

    #[test]
    fn test_cycle_is_rejected() {
        let err = builder()
            .build(&spec(
                r#"{"tasks": [
                    {"id": "a", "agent": "A", "description": "d", "dependsOn": ["b"]},
                    {"id": "b", "agent": "A", "description": "d", "dependsOn": ["a"]}
                ]}"#,
            ))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSpecification(msg) if msg.contains("cycle")));
    }

    #[test]
    fn test_empty_spec_is_rejected() {
        assert!(builder().build(&TaskSpecification::default()).is_err());
    }

    #[test]
    fn test_fallback_builds_with_search_tool() {
        let crew = builder().build(&SpecGenerator::fallback("rust")).unwrap();

        assert_eq!(crew.agents.len(), 2);
        assert_eq!(
            crew.agent("DataAgent").unwrap().tool_names(),
            vec!["WebsiteSearchTool"]
        );
        let pipeline = crew.pipeline();
        assert_eq!(pipeline.tasks[1].dependencies, vec!["researchTask".to_string()]);
        assert!(pipeline
            .agents
            .iter()
            .all(|a| a.status == AgentStatus::Pending));
    }
}
