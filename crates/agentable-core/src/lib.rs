//! Agentable Core - run orchestration
//!
//! This crate contains:
//! - Run registry: run state keyed by id, one lock per run
//! - Event broadcaster: record-then-deliver fan-out with replay for late subscribers
//! - Specification generator: prompt to task specification, with a fixed fallback
//! - Crew builder: specification to agents, tools and ordered tasks
//! - Engine: the in-process agent loop behind a listener seam
//! - Execution driver: background runs on the local or remote (Fly Machines) backend
//! - Shutdown: cancellation and draining of in-flight runs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broadcaster;
pub mod builder;
pub mod driver;
pub mod engine;
pub mod error;
pub mod event;
pub mod registry;
pub mod run;
pub mod shutdown;
pub mod specification;

pub use broadcaster::{EventBroadcaster, Subscription};
pub use builder::{Agent, Crew, CrewBuilder, Task, DEFAULT_MAX_ITERATIONS};
pub use driver::{
    Backend, BackendMode, ExecutionDriver, RemoteBackend, RemoteConfig, RemoteCredentials,
    RunListener,
};
pub use engine::{Engine, EngineListener, LocalEngine, LocalEngineConfig};
pub use error::{Error, Result};
pub use event::{AgentStatus, Pipeline, PipelineAgent, PipelineTask, RunEvent};
pub use registry::{RunHandle, RunRegistry};
pub use run::{Run, RunId, RunStatus};
pub use shutdown::{
    shutdown_signal_with_controller, wait_for_shutdown_signal, ShutdownController, ShutdownPhase,
    TaskGuard,
};
pub use specification::{
    GeneratedSpec, GeneratorConfig, SpecGenerator, SpecOrigin, TaskSpecification,
};
