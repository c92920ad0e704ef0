//! Server module for Agentable
//!
//! Contains the server initialization and runtime logic.
//!
//! # Module Structure
//!
//! - `config`: Configuration structures for all server components
//! - `loader`: Configuration loading from files and environment
//! - `providers`: LLM provider resolution
//! - `init`: Service wiring, router assembly and the run loop

pub mod config;
mod init;
mod loader;
mod providers;

// Re-export public API
pub use config::AppConfig;
pub use init::{build_router, build_services, build_services_with_credentials, run, Services};
pub use loader::load_config;
pub use providers::resolve_llm_provider;
