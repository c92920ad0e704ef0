//! Server initialization
//!
//! Wires the registry, generator, builder, engine and backend together and
//! runs the HTTP server until a shutdown signal arrives.

use super::config::{AppConfig, ServerConfig};
use super::providers::resolve_llm_provider;
use agentable_core::{
    shutdown_signal_with_controller, Backend, CrewBuilder, EventBroadcaster, ExecutionDriver,
    GeneratorConfig, LocalEngine, LocalEngineConfig, RemoteBackend, RemoteCredentials,
    RunRegistry, ShutdownController, SpecGenerator,
};
use agentable_llm::LlmProvider;
use agentable_tools::{register_catalog, ToolCredentials, ToolRegistry};
use anyhow::{Context, Result};
use axum::http::HeaderValue;
use axum::{Extension, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Long-lived services shared by every request
#[derive(Clone)]
pub struct Services {
    pub driver: Arc<ExecutionDriver>,
    pub tools: Arc<ToolRegistry>,
    pub shutdown: Arc<ShutdownController>,
}

/// Build services with remote credentials taken from the environment
pub fn build_services(config: &AppConfig, llm: Arc<dyn LlmProvider>) -> Services {
    build_services_with_credentials(config, llm, RemoteCredentials::from_env)
}

/// Build services with an explicit source of remote credentials
pub fn build_services_with_credentials(
    config: &AppConfig,
    llm: Arc<dyn LlmProvider>,
    credentials: impl FnOnce() -> agentable_core::Result<RemoteCredentials>,
) -> Services {
    let mut tools = ToolRegistry::new();
    register_catalog(&mut tools, &ToolCredentials::from_env());
    let tools = Arc::new(tools);
    info!("Registered {} tools", tools.len());

    let generator_config = GeneratorConfig {
        model: config.llm.model.clone(),
        temperature: config.llm.temperature,
        timeout: Duration::from_secs(config.llm.timeout_secs.max(1)),
        tool_names: tools.list_names().into_iter().map(String::from).collect(),
    };
    let generator = Arc::new(SpecGenerator::new(Arc::clone(&llm), generator_config));

    let builder = Arc::new(
        CrewBuilder::new(Arc::clone(&tools)).with_max_iterations(config.execution.max_iterations),
    );

    let engine = Arc::new(LocalEngine::new(
        llm,
        LocalEngineConfig {
            model: config.llm.agent_model.clone(),
            temperature: config.llm.agent_temperature,
        },
    ));

    let remote_config = config.remote.to_remote_config(&config.execution);
    let backend = Backend::select(
        config.execution.backend,
        config.execution.force_local_with_env(),
        || RemoteBackend::new(remote_config, credentials()?),
    );
    info!(backend = backend.kind(), "Execution backend selected");

    let shutdown = ShutdownController::with_timeout(Duration::from_secs(
        config.server.shutdown_timeout_secs,
    ));
    let broadcaster = Arc::new(EventBroadcaster::new(Arc::new(RunRegistry::new())));
    let driver = ExecutionDriver::new(
        broadcaster,
        generator,
        builder,
        engine,
        Arc::clone(&shutdown),
    )
    .with_backend(backend);

    Services {
        driver: Arc::new(driver),
        tools,
        shutdown,
    }
}

/// Assemble the HTTP router
pub fn build_router(services: &Services, server: &ServerConfig) -> Router {
    Router::new()
        .merge(crate::api::health_routes())
        .merge(crate::api::docs_routes())
        .merge(crate::api::api_router())
        .merge(crate::websocket::websocket_router())
        .layer(Extension(Arc::clone(&services.driver)))
        .layer(Extension(Arc::clone(&services.tools)))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&server.cors_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Run the server
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Agentable v{}", env!("CARGO_PKG_VERSION"));

    let llm = resolve_llm_provider(&config.llm);
    let services = build_services(&config, llm);
    let app = build_router(&services, &config.server);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("HTTP server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal_with_controller(Arc::clone(
            &services.shutdown,
        )))
        .await
        .context("HTTP server error")?;

    let remaining = services.shutdown.active_task_count();
    if remaining > 0 {
        warn!(remaining, "Shutdown finished with runs still draining");
    }
    info!("Agentable shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentable_core::BackendMode;
    use agentable_llm::MockProvider;

    fn local_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.execution.force_local = true;
        config
    }

    #[test]
    fn test_build_services_registers_catalog() {
        let services = build_services(&local_config(), Arc::new(MockProvider::new()));
        assert!(services.tools.has("WebsiteSearchTool"));
        assert_eq!(services.driver.backend().kind(), "local");
        assert!(services.driver.is_accepting());
    }

    #[test]
    fn test_remote_mode_without_credentials_is_unavailable() {
        let mut config = AppConfig::default();
        config.execution.backend = BackendMode::Remote;
        let services = build_services_with_credentials(
            &config,
            Arc::new(MockProvider::new()),
            || RemoteCredentials::from_lookup(|_| None),
        );
        assert!(matches!(
            services.driver.backend(),
            Backend::Unavailable { .. }
        ));
    }

    #[test]
    fn test_auto_mode_with_credentials_is_remote() {
        let config = AppConfig::default();
        let services = build_services_with_credentials(
            &config,
            Arc::new(MockProvider::new()),
            || RemoteCredentials::from_lookup(|key| Some(format!("{}-value", key))),
        );
        assert_eq!(services.driver.backend().kind(), "remote");
    }
}
