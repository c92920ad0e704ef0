use super::*;
use crate::broadcaster::Subscription;
use crate::engine::{LocalEngine, LocalEngineConfig};
use crate::specification::GeneratorConfig;
use agentable_llm::{
    CompletionRequest, CompletionResponse, LlmProvider, MockProvider, ToolCompletionRequest,
    ToolCompletionResponse,
};
use agentable_tools::ToolRegistry;
use std::time::Duration;

struct Harness {
    driver: Arc<ExecutionDriver>,
    shutdown: Arc<ShutdownController>,
}

fn harness(llm: Arc<dyn LlmProvider>, backend: Backend) -> Harness {
    let registry = Arc::new(RunRegistry::new());
    let broadcaster = Arc::new(EventBroadcaster::new(registry));
    let generator = Arc::new(SpecGenerator::new(
        Arc::clone(&llm),
        GeneratorConfig::default(),
    ));
    let builder = Arc::new(CrewBuilder::new(Arc::new(ToolRegistry::new())));
    let engine = Arc::new(LocalEngine::new(llm, LocalEngineConfig::default()));
    let shutdown = ShutdownController::with_timeout(Duration::from_secs(5));
    let driver = ExecutionDriver::new(
        broadcaster,
        generator,
        builder,
        engine,
        Arc::clone(&shutdown),
    )
    .with_backend(backend);
    Harness {
        driver: Arc::new(driver),
        shutdown,
    }
}

async fn collect(mut subscription: Subscription) -> Vec<RunEvent> {
    let mut events = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(5), subscription.recv()).await {
            Ok(Some(event)) => events.push(event),
            Ok(None) => return events,
            Err(_) => panic!("run did not finish; got {:?}", events),
        }
    }
}

fn kinds(events: &[RunEvent]) -> Vec<&'static str> {
    events.iter().map(RunEvent::kind).collect()
}

const ONE_TASK: &str = r#"{"tasks": [{"id": "write", "agent": "Writer", "description": "Write about {prompt}"}]}"#;

#[tokio::test]
async fn test_prompt_run_publishes_full_lifecycle() {
    let llm = MockProvider::new();
    llm.push_text(ONE_TASK);
    llm.push_text("the answer");
    let h = harness(Arc::new(llm.clone()), Backend::Local);

    let run_id = h.driver.submit("rust").unwrap();
    let events = collect(h.driver.broadcaster().subscribe(&run_id).unwrap()).await;

    assert_eq!(
        kinds(&events),
        vec![
            "agent-update",
            "log",
            "agent-update",
            "pipeline-init",
            "log",
            "agent-update",
            "agent-update",
            "complete",
        ]
    );
    assert_eq!(events[1], RunEvent::log("Generated specification with 1 tasks"));
    assert_eq!(
        events[7],
        RunEvent::Complete {
            result: "the answer".to_string()
        }
    );

    let run = h.driver.registry().get(&run_id).unwrap();
    assert_eq!(run.status, RunStatus::Complete);
    assert_eq!(run.result.as_deref(), Some("the answer"));
    assert!(run.completed_at.is_some());
    let pipeline = run.pipeline.unwrap();
    assert_eq!(pipeline.tasks[0].description, "Write about rust");
    assert_eq!(pipeline.tasks[0].status, AgentStatus::Done);
    assert_eq!(pipeline.agents[0].status, AgentStatus::Done);
}

#[tokio::test]
async fn test_llm_failure_falls_back_and_ends_in_error() {
    let h = harness(Arc::new(MockProvider::failing("no credits")), Backend::Local);

    let run_id = h.driver.submit("weather").unwrap();
    let events = collect(h.driver.broadcaster().subscribe(&run_id).unwrap()).await;

    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::Log { message } if message.starts_with("Specification generation failed")
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::PipelineInit { pipeline } if pipeline.tasks.len() == 2
    )));
    match events.last() {
        Some(RunEvent::Error { message }) => {
            assert!(message.contains("task researchTask failed"));
            assert!(message.contains("no credits"));
        }
        other => panic!("expected error event, got {:?}", other),
    }
    assert_eq!(
        h.driver.registry().get(&run_id).unwrap().status,
        RunStatus::Error
    );
}

#[tokio::test]
async fn test_start_with_specification() {
    let llm = MockProvider::new();
    llm.push_text("done");
    let h = harness(Arc::new(llm.clone()), Backend::Local);
    let run_id = RunId::new();
    h.driver.registry().create(run_id, "given").unwrap();

    let spec = TaskSpecification::from_json(ONE_TASK).unwrap();
    let task = h.driver.start(run_id, spec.clone()).unwrap();
    assert!(matches!(
        h.driver.start(run_id, spec),
        Err(Error::InvalidTransition { .. })
    ));
    task.await.unwrap();

    let run = h.driver.registry().get(&run_id).unwrap();
    assert_eq!(run.status, RunStatus::Complete);
    assert_eq!(run.events[0].kind(), "pipeline-init");
    // No generation step: only the engine call reached the provider.
    assert_eq!(llm.requests().len(), 1);
}

#[tokio::test]
async fn test_start_unknown_run() {
    let h = harness(Arc::new(MockProvider::new()), Backend::Local);
    assert!(matches!(
        h.driver.start_from_prompt(RunId::new()),
        Err(Error::RunNotFound(_))
    ));
}

#[tokio::test]
async fn test_unavailable_remote_fails_each_run() {
    let h = harness(
        Arc::new(MockProvider::new()),
        Backend::Unavailable {
            reason: "missing: FLY_APP_NAME".to_string(),
        },
    );

    let run_id = h.driver.submit("p").unwrap();
    let events = collect(h.driver.broadcaster().subscribe(&run_id).unwrap()).await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], RunEvent::Error { message } if message.contains("FLY_APP_NAME")));
}

#[tokio::test]
async fn test_refuses_new_runs_after_shutdown() {
    let h = harness(Arc::new(MockProvider::new()), Backend::Local);
    h.shutdown.shutdown().await;

    assert!(matches!(h.driver.submit("late"), Err(Error::ShuttingDown)));
    assert!(h.driver.registry().is_empty());
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_run() {
    struct Stalled;

    #[async_trait::async_trait]
    impl LlmProvider for Stalled {
        fn name(&self) -> &str {
            "stalled"
        }
        fn supports_tools(&self) -> bool {
            false
        }
        fn default_model(&self) -> &str {
            ""
        }
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> agentable_llm::Result<CompletionResponse> {
            std::future::pending().await
        }
        async fn complete_with_tools(
            &self,
            _request: ToolCompletionRequest,
        ) -> agentable_llm::Result<ToolCompletionResponse> {
            std::future::pending().await
        }
    }

    let h = harness(Arc::new(Stalled), Backend::Local);
    let run_id = h.driver.submit("forever").unwrap();
    let subscription = h.driver.broadcaster().subscribe(&run_id).unwrap();
    tokio::task::yield_now().await;

    h.shutdown.shutdown().await;
    let events = collect(subscription).await;

    assert_eq!(
        events.last(),
        Some(&RunEvent::Error {
            message: "run cancelled: server shutting down".to_string()
        })
    );
    assert_eq!(h.shutdown.active_task_count(), 0);
}

#[tokio::test]
async fn test_clearing_history_does_not_stop_run() {
    let llm = MockProvider::new();
    llm.push_text(ONE_TASK);
    llm.push_text("still delivered");
    let h = harness(Arc::new(llm), Backend::Local);

    let run_id = h.driver.submit("p").unwrap();
    let subscription = h.driver.broadcaster().subscribe(&run_id).unwrap();
    assert_eq!(h.driver.registry().clear(), 1);

    let events = collect(subscription).await;
    assert_eq!(
        events.last(),
        Some(&RunEvent::Complete {
            result: "still delivered".to_string()
        })
    );
    assert!(h.driver.registry().list(10).is_empty());
}

#[tokio::test]
async fn test_back_to_back_runs_stay_separate() {
    let h = harness(Arc::new(MockProvider::new()), Backend::Local);

    let first = h.driver.submit("first").unwrap();
    let second = h.driver.submit("second").unwrap();
    assert_ne!(first, second);

    let a = h.driver.broadcaster().subscribe(&first).unwrap();
    let b = h.driver.broadcaster().subscribe(&second).unwrap();
    let (a, b) = tokio::join!(collect(a), collect(b));

    assert_eq!(a, h.driver.registry().get(&first).unwrap().events);
    assert_eq!(b, h.driver.registry().get(&second).unwrap().events);
    assert!(a.iter().any(|e| matches!(
        e,
        RunEvent::PipelineInit { pipeline } if pipeline.tasks[0].description.ends_with("first")
    )));
    assert!(b.iter().any(|e| matches!(
        e,
        RunEvent::PipelineInit { pipeline } if pipeline.tasks[0].description.ends_with("second")
    )));
}

#[tokio::test]
async fn test_subscriber_churn_leaves_stream_intact() {
    /// Answers one call per permit
    struct Paced {
        inner: MockProvider,
        permits: Arc<tokio::sync::Semaphore>,
    }

    impl Paced {
        async fn wait(&self) -> agentable_llm::Result<()> {
            self.permits
                .acquire()
                .await
                .map_err(|e| agentable_llm::Error::Api(e.to_string()))?
                .forget();
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for Paced {
        fn name(&self) -> &str {
            "paced"
        }
        fn supports_tools(&self) -> bool {
            false
        }
        fn default_model(&self) -> &str {
            ""
        }
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> agentable_llm::Result<CompletionResponse> {
            self.wait().await?;
            self.inner.complete(request).await
        }
        async fn complete_with_tools(
            &self,
            request: ToolCompletionRequest,
        ) -> agentable_llm::Result<ToolCompletionResponse> {
            self.wait().await?;
            self.inner.complete_with_tools(request).await
        }
    }

    let inner = MockProvider::new();
    inner.push_text(ONE_TASK);
    inner.push_text("the answer");
    let permits = Arc::new(tokio::sync::Semaphore::new(0));
    let h = harness(
        Arc::new(Paced {
            inner,
            permits: Arc::clone(&permits),
        }),
        Backend::Local,
    );

    let run_id = h.driver.submit("rust").unwrap();
    let kept = tokio::spawn(collect(h.driver.broadcaster().subscribe(&run_id).unwrap()));

    // One LLM call per round: spec generation, then the single task.
    for _ in 0..2 {
        let mut extras: Vec<Subscription> = (0..5)
            .map(|_| h.driver.broadcaster().subscribe(&run_id).unwrap())
            .collect();
        permits.add_permits(1);
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        extras.truncate(2);
        drop(h.driver.broadcaster().subscribe(&run_id).unwrap());
        for extra in &mut extras {
            while extra.try_recv().is_some() {}
        }
    }

    let events = kept.await.unwrap();
    let run = h.driver.registry().get(&run_id).unwrap();
    assert_eq!(events, run.events);
    assert_eq!(
        events.last(),
        Some(&RunEvent::Complete {
            result: "the answer".to_string()
        })
    );
}

#[test]
fn test_backend_selection() {
    let unavailable =
        || -> Result<RemoteBackend> { Err(Error::Configuration("missing: FLY_API_TOKEN".to_string())) };

    assert_eq!(Backend::select(BackendMode::Auto, false, unavailable).kind(), "local");
    assert_eq!(Backend::select(BackendMode::Local, false, unavailable).kind(), "local");
    assert!(matches!(
        Backend::select(BackendMode::Remote, false, unavailable),
        Backend::Unavailable { reason } if reason.contains("FLY_API_TOKEN")
    ));
    assert!(matches!(
        Backend::select(BackendMode::Remote, true, unavailable),
        Backend::Local
    ));

    let available = || -> Result<RemoteBackend> {
        RemoteBackend::new(
            RemoteConfig::default(),
            RemoteCredentials::from_lookup(|_| Some("x".to_string()))?,
        )
    };
    assert_eq!(Backend::select(BackendMode::Auto, false, available).kind(), "remote");
}

#[test]
fn test_backend_mode_parsing() {
    assert_eq!("Remote".parse::<BackendMode>().unwrap(), BackendMode::Remote);
    assert_eq!(" auto ".parse::<BackendMode>().unwrap(), BackendMode::Auto);
    assert!("cloud".parse::<BackendMode>().is_err());
}
