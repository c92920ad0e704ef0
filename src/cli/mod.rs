//! CLI module for Agentable
//!
//! Provides commands:
//! - `serve`: Start the HTTP/WebSocket server (default)
//! - `spec`: Generate a task specification for a prompt and print it
//! - `tools`: List the tool catalog

use agentable::server::{self, AppConfig};
use agentable_core::SpecGenerator;
use agentable_tools::{register_catalog, ToolCredentials, ToolRegistry};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;

/// Agentable CLI
#[derive(Parser, Debug)]
#[command(name = "agentable")]
#[command(about = "Turn prompts into multi-agent runs")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the server (default)
    Serve {
        /// Override server.host
        #[arg(long)]
        host: Option<String>,
        /// Override server.port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate a task specification and print it as JSON
    Spec {
        /// Prompt to plan
        prompt: String,
    },
    /// List available tools
    Tools,
}

/// Run the CLI command
pub async fn run(cli: Cli, mut config: AppConfig) -> anyhow::Result<()> {
    match cli.command {
        None => server::run(config).await,
        Some(Commands::Serve { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::run(config).await
        }
        Some(Commands::Spec { prompt }) => print_spec(&config, &prompt).await,
        Some(Commands::Tools) => {
            print_tools();
            Ok(())
        }
    }
}

async fn print_spec(config: &AppConfig, prompt: &str) -> anyhow::Result<()> {
    let llm = server::resolve_llm_provider(&config.llm);
    let tools = catalog();
    let generator = SpecGenerator::new(
        llm,
        agentable_core::GeneratorConfig {
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            timeout: Duration::from_secs(config.llm.timeout_secs.max(1)),
            tool_names: tools.list_names().into_iter().map(String::from).collect(),
        },
    );

    let generated = generator.generate(prompt).await;
    if let agentable_core::SpecOrigin::Fallback { reason } = &generated.origin {
        eprintln!("Using the default plan: {}", reason);
    }
    println!("{}", serde_json::to_string_pretty(&generated.spec)?);
    Ok(())
}

fn print_tools() {
    let tools = catalog();
    let mut definitions = tools.list_definitions();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));
    for def in definitions {
        println!("{:<22} {}", def.name, def.description);
    }
}

fn catalog() -> Arc<ToolRegistry> {
    let mut tools = ToolRegistry::new();
    register_catalog(&mut tools, &ToolCredentials::from_env());
    Arc::new(tools)
}
