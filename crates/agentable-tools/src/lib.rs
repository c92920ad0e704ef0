//! Agentable Tools - tool registry and catalog
//!
//! This crate provides the capabilities agents can be granted:
//! - Registry: `Tool` trait and name-to-tool lookup (with aliases)
//! - Builtins: web search (Exa), page loading (Browserbase), image generation (DALL-E)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builtins;
pub mod error;
pub mod registry;

pub use builtins::{register_catalog, ToolCredentials};
pub use error::{Error, Result};
pub use registry::{Tool, ToolCategory, ToolDefinition, ToolRegistry, ToolResult};
