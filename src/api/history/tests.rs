use super::handlers::{clear_history, get_run, list_runs};
use super::types::{HistoryQuery, RunDetail, RunSummary};
use crate::server::{build_services, AppConfig};
use agentable_core::{AgentStatus, ExecutionDriver, Run, RunEvent, RunId, RunStatus};
use agentable_llm::MockProvider;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::Extension;
use std::sync::Arc;

fn driver() -> Arc<ExecutionDriver> {
    let mut config = AppConfig::default();
    config.execution.force_local = true;
    build_services(&config, Arc::new(MockProvider::new())).driver
}

fn finished_run() -> Run {
    let mut run = Run::new(RunId::new(), "write a haiku");
    run.transition(RunStatus::Running).unwrap();
    run.record(RunEvent::agent("SpecAgent", AgentStatus::Running, ""))
        .unwrap();
    run.record(RunEvent::log("Starting crew execution...")).unwrap();
    run.record(RunEvent::Complete {
        result: "five seven five".to_string(),
    })
    .unwrap();
    run
}

#[test]
fn test_limit_is_clamped() {
    let query = |limit| HistoryQuery { limit };
    assert_eq!(query(0).effective_limit(), 1);
    assert_eq!(query(-5).effective_limit(), 1);
    assert_eq!(query(25).effective_limit(), 25);
    assert_eq!(query(1000).effective_limit(), 100);

    let query: HistoryQuery = serde_json::from_str("{}").unwrap();
    assert_eq!(query.effective_limit(), 10);
}

#[test]
fn test_summary_serialization() {
    let summary = RunSummary::from(&finished_run());
    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["status"], "complete");
    assert_eq!(json["result"], "five seven five");
    assert!(json.get("durationSeconds").is_some());
    assert!(json.get("timestamp").is_some());
}

#[test]
fn test_detail_carries_logs_and_events() {
    let detail = RunDetail::from(finished_run());
    assert_eq!(detail.events.len(), 3);
    assert_eq!(detail.logs.len(), 3);
    assert_eq!(detail.logs[1], "Starting crew execution...");

    let json = serde_json::to_value(&detail).unwrap();
    assert_eq!(json["events"][2]["type"], "complete");
    assert!(json.get("completedAt").is_some());
    assert!(json["pipeline"].is_null());
}

#[test]
fn test_handlers_against_registry() {
    tokio_test::block_on(async {
        let driver = driver();
        let first = RunId::new();
        let second = RunId::new();
        driver.registry().create(first, "first").unwrap();
        driver.registry().create(second, "second").unwrap();

        let listed = list_runs(
            Extension(Arc::clone(&driver)),
            Ok(Query(HistoryQuery { limit: 10 })),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second);
        assert_eq!(listed[0].status, "pending");

        let detail = get_run(Extension(Arc::clone(&driver)), Path(first.to_string()))
            .await
            .unwrap()
            .0;
        assert_eq!(detail.prompt, "first");

        let missing = get_run(Extension(Arc::clone(&driver)), Path(RunId::new().to_string()))
            .await
            .unwrap_err();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let garbage = get_run(Extension(Arc::clone(&driver)), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(garbage.status(), StatusCode::NOT_FOUND);

        let cleared = clear_history(Extension(Arc::clone(&driver))).await.0;
        assert_eq!(cleared.cleared, 2);
        assert!(driver.registry().is_empty());
    });
}
