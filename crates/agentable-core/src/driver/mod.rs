//! Execution Driver - runs a prompt or specification in the background
//!
//! Each run gets one spawned task that owns it from `running` to its
//! terminal event. The task generates the specification (when started from
//! a prompt), builds the crew, publishes the plan and hands execution to
//! the selected backend. Whatever happens, exactly one `complete` or
//! `error` event is published at the end.

mod listener;
mod remote;

#[cfg(test)]
mod tests;

pub use listener::RunListener;
pub use remote::{LogPage, RemoteBackend, RemoteConfig, RemoteCredentials, FINISH_MARKER};

use crate::broadcaster::EventBroadcaster;
use crate::builder::CrewBuilder;
use crate::engine::{Engine, EngineListener};
use crate::error::{Error, Result};
use crate::event::{AgentStatus, RunEvent};
use crate::registry::{RunHandle, RunRegistry};
use crate::run::{RunId, RunStatus};
use crate::shutdown::{ShutdownController, TaskGuard};
use crate::specification::{SpecGenerator, SpecOrigin, TaskSpecification, SPEC_AGENT};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Configured backend preference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Remote when credentials are present, otherwise in-process
    #[default]
    Auto,
    /// Always in-process
    Local,
    /// Always remote
    Remote,
}

impl FromStr for BackendMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(Error::Configuration(format!(
                "unknown execution backend '{}'",
                other
            ))),
        }
    }
}

/// Backend chosen at startup
pub enum Backend {
    /// In-process engine
    Local,
    /// Fly Machines
    Remote(Arc<RemoteBackend>),
    /// Remote was required but cannot be used; every run fails with `reason`
    Unavailable {
        /// Why the remote backend is unusable
        reason: String,
    },
}

impl Backend {
    /// Pick a backend.
    ///
    /// `force_local` wins over everything. `remote` is only invoked when the
    /// mode may use the remote backend.
    pub fn select(
        mode: BackendMode,
        force_local: bool,
        remote: impl FnOnce() -> Result<RemoteBackend>,
    ) -> Self {
        if force_local || mode == BackendMode::Local {
            return Self::Local;
        }
        match (mode, remote()) {
            (_, Ok(backend)) => Self::Remote(Arc::new(backend)),
            (BackendMode::Auto, Err(e)) => {
                info!(reason = %e, "Remote backend unavailable, running in-process");
                Self::Local
            }
            (_, Err(e)) => {
                warn!(reason = %e, "Remote backend required but unavailable");
                let reason = match e {
                    Error::Configuration(message) => message,
                    other => other.to_string(),
                };
                Self::Unavailable { reason }
            }
        }
    }

    /// `local` or `remote`
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote(_) | Self::Unavailable { .. } => "remote",
        }
    }
}

enum Plan {
    Prompt,
    Spec(TaskSpecification),
}

/// Starts and owns background runs
pub struct ExecutionDriver {
    broadcaster: Arc<EventBroadcaster>,
    generator: Arc<SpecGenerator>,
    builder: Arc<CrewBuilder>,
    engine: Arc<dyn Engine>,
    backend: Backend,
    shutdown: Arc<ShutdownController>,
}

impl ExecutionDriver {
    /// Driver with the in-process backend
    pub fn new(
        broadcaster: Arc<EventBroadcaster>,
        generator: Arc<SpecGenerator>,
        builder: Arc<CrewBuilder>,
        engine: Arc<dyn Engine>,
        shutdown: Arc<ShutdownController>,
    ) -> Self {
        Self {
            broadcaster,
            generator,
            builder,
            engine,
            backend: Backend::Local,
            shutdown,
        }
    }

    /// Use a different backend
    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Run registry
    #[must_use]
    pub fn registry(&self) -> &Arc<RunRegistry> {
        self.broadcaster.registry()
    }

    /// Event broadcaster
    #[must_use]
    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }

    /// Selected backend
    #[must_use]
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Whether new runs are accepted
    #[must_use]
    pub fn is_accepting(&self) -> bool {
        self.shutdown.is_accepting_work()
    }

    /// Register a new run for `prompt` and start it; returns immediately
    pub fn submit(self: &Arc<Self>, prompt: impl Into<String>) -> Result<RunId> {
        if !self.is_accepting() {
            return Err(Error::ShuttingDown);
        }
        let run_id = RunId::new();
        self.registry().create(run_id, prompt)?;
        self.start_from_prompt(run_id)?;
        Ok(run_id)
    }

    /// Start a registered run from its prompt
    pub fn start_from_prompt(self: &Arc<Self>, run_id: RunId) -> Result<JoinHandle<()>> {
        self.spawn(run_id, Plan::Prompt)
    }

    /// Start a registered run with a ready specification
    pub fn start(self: &Arc<Self>, run_id: RunId, spec: TaskSpecification) -> Result<JoinHandle<()>> {
        self.spawn(run_id, Plan::Spec(spec))
    }

    fn spawn(self: &Arc<Self>, run_id: RunId, plan: Plan) -> Result<JoinHandle<()>> {
        let handle = self
            .registry()
            .handle(&run_id)
            .ok_or(Error::RunNotFound(run_id))?;
        if !self.is_accepting() {
            self.refuse(&handle);
            return Err(Error::ShuttingDown);
        }
        // One driver per run: only a pending run may start.
        handle.update(|run| match run.status {
            RunStatus::Pending => run.transition(RunStatus::Running),
            from => Err(Error::InvalidTransition {
                from,
                to: RunStatus::Running,
            }),
        })?;

        let guard = self.shutdown.register_task();
        let driver = Arc::clone(self);
        Ok(tokio::spawn(async move {
            driver.drive(handle, plan, guard).await;
        }))
    }

    /// Fail a run that will never start
    fn refuse(&self, handle: &RunHandle) {
        let result = self.broadcaster.publish_to(
            handle,
            RunEvent::Error {
                message: Error::ShuttingDown.to_string(),
            },
        );
        if let Err(e) = result {
            warn!(run_id = %handle.id(), error = %e, "Could not fail refused run");
        }
    }

    #[instrument(skip_all, fields(run_id = %handle.id(), backend = self.backend.kind()))]
    async fn drive(self: Arc<Self>, handle: Arc<RunHandle>, plan: Plan, guard: TaskGuard) {
        let token = guard.token();
        let listener = RunListener::new(Arc::clone(&self.broadcaster), Arc::clone(&handle));
        info!("Run started");

        let terminal = match self.execute(&handle, plan, &listener, &token).await {
            Ok(result) => {
                info!("Run complete");
                RunEvent::Complete { result }
            }
            Err(e) => {
                warn!(error = %e, "Run failed");
                RunEvent::Error {
                    message: e.to_string(),
                }
            }
        };
        listener.publish(terminal);
        drop(guard);
    }

    async fn execute(
        &self,
        handle: &RunHandle,
        plan: Plan,
        listener: &RunListener,
        token: &CancellationToken,
    ) -> Result<String> {
        if let Backend::Unavailable { reason } = &self.backend {
            return Err(Error::Configuration(reason.clone()));
        }
        let prompt = handle.update(|run| run.prompt.clone());

        let spec = match plan {
            Plan::Spec(spec) => spec,
            Plan::Prompt => {
                listener.agent_update(
                    SPEC_AGENT,
                    AgentStatus::Running,
                    "Converting prompt to task specification...",
                );
                let generated =
                    cancellable(token, async { Ok(self.generator.generate(&prompt).await) })
                        .await?;
                if let SpecOrigin::Fallback { reason } = &generated.origin {
                    listener.log(&format!(
                        "Specification generation failed ({}); using the default plan",
                        reason
                    ));
                }
                listener.log(&format!(
                    "Generated specification with {} tasks",
                    generated.spec.tasks.len()
                ));
                listener.agent_update(SPEC_AGENT, AgentStatus::Done, "Specification ready");
                generated.spec
            }
        };

        let crew = self.builder.build(&spec)?;
        for warning in &crew.warnings {
            listener.log(warning);
        }
        listener.pipeline_init(crew.pipeline());

        match &self.backend {
            Backend::Local => {
                listener.log("Starting crew execution...");
                cancellable(token, self.engine.kickoff(&crew, listener)).await
            }
            Backend::Remote(remote) => {
                listener.log("Starting remote execution...");
                remote
                    .run(handle.id(), &prompt, &spec, listener, token)
                    .await
            }
            Backend::Unavailable { reason } => Err(Error::Configuration(reason.clone())),
        }
    }
}

/// Run `work` unless shutdown cancels it first
async fn cancellable<T>(
    token: &CancellationToken,
    work: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = work => result,
    }
}
