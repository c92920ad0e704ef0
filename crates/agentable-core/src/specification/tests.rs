use super::*;
use crate::error::Error;
use agentable_llm::{
    CompletionRequest, CompletionResponse, LlmProvider, MockProvider, ToolCompletionRequest,
    ToolCompletionResponse,
};
use mockall::mock;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Llm {}

    #[async_trait::async_trait]
    impl LlmProvider for Llm {
        fn name(&self) -> &str;
        fn supports_tools(&self) -> bool;
        fn default_model(&self) -> &str;
        async fn complete(&self, request: CompletionRequest) -> agentable_llm::Result<CompletionResponse>;
        async fn complete_with_tools(
            &self,
            request: ToolCompletionRequest,
        ) -> agentable_llm::Result<ToolCompletionResponse>;
    }
}

fn answer(content: &str) -> CompletionResponse {
    CompletionResponse::new(content)
}

fn generator(llm: impl LlmProvider + 'static) -> SpecGenerator {
    SpecGenerator::new(
        Arc::new(llm),
        GeneratorConfig {
            tool_names: vec!["WebsiteSearchTool".to_string(), "DallETool".to_string()],
            ..GeneratorConfig::default()
        },
    )
}

const TWO_TASKS: &str = r#"{
  "agents": [
    {"name": "Researcher", "role": "Finds sources", "tools": ["WebsiteSearchTool"]}
  ],
  "tasks": [
    {"id": "find", "agent": "Researcher", "description": "Find articles on {prompt}"},
    {"id": "write", "agent": "Writer", "description": "Summarize", "dependencies": ["find"]}
  ]
}"#;

#[test]
fn test_parse_accepts_dependency_aliases_and_defaults() {
    let spec = SpecGenerator::parse(TWO_TASKS, "rust").unwrap();

    assert_eq!(spec.tasks.len(), 2);
    assert_eq!(spec.tasks[0].description, "Find articles on rust");
    assert_eq!(spec.tasks[0].expected_output, "Task completion");
    assert_eq!(spec.tasks[0].priority, "medium");
    assert_eq!(spec.tasks[1].depends_on, vec!["find".to_string()]);
    assert!(spec.agents[0].config.allow_delegation);
}

#[test]
fn test_parse_strips_code_fence() {
    let fenced = format!("```json\n{}\n```", TWO_TASKS);
    assert!(SpecGenerator::parse(&fenced, "x").is_ok());
}

#[test]
fn test_parse_assigns_missing_ids() {
    let spec = SpecGenerator::parse(
        r#"{"tasks": [
            {"agent": "A", "description": "one"},
            {"id": "task_1", "agent": "A", "description": "two"}
        ]}"#,
        "p",
    )
    .unwrap();
    assert_eq!(spec.tasks[0].id, "task_1_2");
    assert_eq!(spec.tasks[1].id, "task_1");
}

#[test]
fn test_validate_rejects_bad_documents() {
    let cases = [
        (r#"{"tasks": []}"#, "no tasks"),
        (r#"{"agents": []}"#, "malformed"),
        (r#"{"tasks": [{"id": "a", "description": "d"}]}"#, "no agent"),
        (r#"{"tasks": [{"id": "a", "agent": "A"}]}"#, "no description"),
        (
            r#"{"tasks": [{"id": "a", "agent": "A", "description": "d"},
                          {"id": "a", "agent": "A", "description": "d"}]}"#,
            "duplicate",
        ),
        (
            r#"{"tasks": [{"id": "a", "agent": "A", "description": "d", "dependsOn": ["b"]},
                          {"id": "b", "agent": "A", "description": "d", "dependsOn": ["a"]}]}"#,
            "cycle",
        ),
        ("not json at all", "malformed"),
    ];

    for (doc, expected) in cases {
        let err = SpecGenerator::parse(doc, "p").unwrap_err();
        assert!(
            matches!(&err, Error::InvalidSpecification(msg) if msg.contains(expected)),
            "{doc}: got {err}"
        );
    }
}

#[test]
fn test_unknown_dependency_is_not_a_validation_error() {
    let spec = SpecGenerator::parse(
        r#"{"tasks": [{"id": "a", "agent": "A", "description": "d", "dependsOn": ["ghost"]}]}"#,
        "p",
    );
    assert!(spec.is_ok());
}

#[test]
fn test_fallback_shape() {
    let spec = SpecGenerator::fallback("quantum computing");
    assert_eq!(spec.tasks.len(), 2);
    assert_eq!(spec.tasks[0].id, "researchTask");
    assert_eq!(spec.tasks[0].agent, "DataAgent");
    assert_eq!(
        spec.tasks[0].description,
        "Research and gather information about: quantum computing"
    );
    assert_eq!(spec.tasks[0].param_tool(), Some("search"));
    assert_eq!(spec.tasks[1].agent, "AnalysisAgent");
    assert_eq!(spec.tasks[1].depends_on, vec!["researchTask".to_string()]);
    assert!(spec.validate().is_ok());
}

#[test]
fn test_referenced_agents_in_first_use_order() {
    let spec = SpecGenerator::parse(
        r#"{"tasks": [
            {"id": "a", "agent": "B", "description": "d"},
            {"id": "b", "agent": "A", "description": "d"},
            {"id": "c", "agent": "B", "description": "d"}
        ]}"#,
        "p",
    )
    .unwrap();
    assert_eq!(spec.referenced_agents(), vec!["B", "A"]);
}

#[tokio::test]
async fn test_generate_uses_llm_answer() {
    let mut llm = MockLlm::new();
    llm.expect_complete()
        .withf(|request| {
            request.temperature == Some(0.1)
                && request.model == "gpt-3.5-turbo"
                && request.messages[0].content.contains("WebsiteSearchTool")
                && request.messages[1].content.contains("news about rust")
        })
        .times(1)
        .returning(|_| Ok(answer(TWO_TASKS)));

    let generated = generator(llm).generate("news about rust").await;
    assert_eq!(generated.origin, SpecOrigin::Generated);
    assert_eq!(generated.spec.tasks[0].id, "find");
}

#[tokio::test]
async fn test_generate_falls_back_on_invalid_json() {
    let mut llm = MockLlm::new();
    llm.expect_complete()
        .times(1)
        .returning(|_| Ok(answer("Sure! Here is your plan: step one...")));

    let generated = generator(llm).generate("cats").await;
    assert!(generated.is_fallback());
    assert_eq!(generated.spec, SpecGenerator::fallback("cats"));
}

#[tokio::test]
async fn test_generate_falls_back_on_provider_error() {
    let generated = generator(MockProvider::failing("rate limited"))
        .generate("cats")
        .await;
    match generated.origin {
        SpecOrigin::Fallback { reason } => assert!(reason.contains("rate limited")),
        SpecOrigin::Generated => panic!("expected fallback"),
    }
}

#[tokio::test]
async fn test_generate_falls_back_on_missing_tasks() {
    let llm = MockProvider::new();
    llm.push_text(r#"{"agents": [{"name": "A"}]}"#);

    let generated = generator(llm).generate("dogs").await;
    assert!(generated.is_fallback());
}

#[tokio::test(start_paused = true)]
async fn test_generate_times_out_to_fallback() {
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

    let generator = SpecGenerator::new(
        Arc::new(Stalled),
        GeneratorConfig {
            timeout: Duration::from_secs(5),
            ..GeneratorConfig::default()
        },
    );
    let generated = generator.generate("slow").await;
    assert!(matches!(
        generated.origin,
        SpecOrigin::Fallback { ref reason } if reason.contains("timed out")
    ));
}
