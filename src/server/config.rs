//! Server configuration types

use agentable_core::{BackendMode, RemoteConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub remote: RemoteAppConfig,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origins; empty allows any
    #[serde(default)]
    pub cors_origins: Vec<String>,
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// LLM settings; credentials come from OPENAI_API_KEY / OPENAI_BASE_URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model used for specification generation
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Model used for agent steps
    #[serde(default = "default_model")]
    pub agent_model: String,
    #[serde(default = "default_agent_temperature")]
    pub agent_temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            temperature: default_temperature(),
            agent_model: default_model(),
            agent_temperature: default_agent_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_agent_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    60
}

/// Execution backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub backend: BackendMode,
    /// Always run in-process; FORCE_LOCAL_EXECUTION=true has the same effect
    #[serde(default)]
    pub force_local: bool,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_secs: u64,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            backend: BackendMode::default(),
            force_local: false,
            max_iterations: default_max_iterations(),
            remote_timeout_secs: default_remote_timeout(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl ExecutionConfig {
    /// `force_local` from config or the FORCE_LOCAL_EXECUTION variable
    #[must_use]
    pub fn force_local_with_env(&self) -> bool {
        self.force_local
            || std::env::var("FORCE_LOCAL_EXECUTION")
                .map(|v| is_truthy(&v))
                .unwrap_or(false)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn default_max_iterations() -> u32 {
    3
}

fn default_remote_timeout() -> u64 {
    300
}

fn default_poll_interval() -> u64 {
    2
}

/// Fly Machines settings; credentials come from FLY_API_TOKEN, FLY_APP_NAME, FLY_ORG_SLUG
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteAppConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_logs_api_base")]
    pub logs_api_base: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_image")]
    pub image: String,
    /// Init command; empty keeps the built-in echo worker
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_cpu_kind")]
    pub cpu_kind: String,
    #[serde(default = "default_cpus")]
    pub cpus: u32,
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u32,
}

impl Default for RemoteAppConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            logs_api_base: default_logs_api_base(),
            region: default_region(),
            image: default_image(),
            command: Vec::new(),
            cpu_kind: default_cpu_kind(),
            cpus: default_cpus(),
            memory_mb: default_memory_mb(),
        }
    }
}

impl RemoteAppConfig {
    /// Backend settings combined with the execution timeouts
    #[must_use]
    pub fn to_remote_config(&self, execution: &ExecutionConfig) -> RemoteConfig {
        let defaults = RemoteConfig::default();
        RemoteConfig {
            api_base: self.api_base.clone(),
            logs_api_base: self.logs_api_base.clone(),
            region: self.region.clone(),
            image: self.image.clone(),
            command: if self.command.is_empty() {
                defaults.command
            } else {
                self.command.clone()
            },
            cpu_kind: self.cpu_kind.clone(),
            cpus: self.cpus,
            memory_mb: self.memory_mb,
            timeout: Duration::from_secs(execution.remote_timeout_secs.max(1)),
            poll_interval: Duration::from_secs(execution.poll_interval_secs.max(1)),
        }
    }
}

fn default_api_base() -> String {
    "https://api.machines.dev".to_string()
}

fn default_logs_api_base() -> String {
    "https://api.fly.io".to_string()
}

fn default_region() -> String {
    "ord".to_string()
}

fn default_image() -> String {
    "python:3.11-slim".to_string()
}

fn default_cpu_kind() -> String {
    "shared".to_string()
}

fn default_cpus() -> u32 {
    1
}

fn default_memory_mb() -> u32 {
    512
}
