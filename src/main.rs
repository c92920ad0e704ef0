//! Agentable - prompt-to-crew orchestration server
//!
//! CLI entry point for the Agentable server.

#![forbid(unsafe_code)]

use agentable::server::{config::LogFormat, load_config};
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let config = load_config()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "agentable=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.logging.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    let cli = cli::Cli::parse();
    cli::run(cli, config).await
}
