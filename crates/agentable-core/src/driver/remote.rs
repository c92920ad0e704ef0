//! Remote backend - runs a task on an ephemeral Fly Machine
//!
//! The machine is created through the Machines API, its output is tailed
//! from the Fly logs API line by line, and it is destroyed on every exit
//! path. Completion is detected from a marker line or from the machine
//! reaching a stopped state.

use crate::engine::EngineListener;
use crate::error::{Error, Result};
use crate::run::RunId;
use crate::specification::TaskSpecification;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Line printed by the worker when it is done
pub const FINISH_MARKER: &str = "[Process finished]";

/// Consecutive state lookups that may fail before giving up
const MAX_STATE_ERRORS: u32 = 3;

const REQUIRED_VARS: [&str; 3] = ["FLY_API_TOKEN", "FLY_APP_NAME", "FLY_ORG_SLUG"];

/// Fly credentials and target app
#[derive(Clone)]
pub struct RemoteCredentials {
    /// API token (bearer)
    pub api_token: String,
    /// App the machines are created in
    pub app_name: String,
    /// Organization slug
    pub org_slug: String,
}

impl fmt::Debug for RemoteCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCredentials")
            .field("api_token", &agentable_llm::util::mask_api_key(&self.api_token))
            .field("app_name", &self.app_name)
            .field("org_slug", &self.org_slug)
            .finish()
    }
}

impl RemoteCredentials {
    /// Read `FLY_API_TOKEN`, `FLY_APP_NAME` and `FLY_ORG_SLUG`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`; blank values count as missing
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let values: Vec<Option<String>> = REQUIRED_VARS
            .iter()
            .map(|name| lookup(name).filter(|v| !v.trim().is_empty()))
            .collect();
        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .zip(&values)
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            return Err(Error::Configuration(format!(
                "Backend not configured for Fly Machines. Set FLY_API_TOKEN, FLY_APP_NAME and FLY_ORG_SLUG (missing: {})",
                missing.join(", ")
            )));
        }

        let mut values = values.into_iter().flatten();
        Ok(Self {
            api_token: values.next().unwrap_or_default(),
            app_name: values.next().unwrap_or_default(),
            org_slug: values.next().unwrap_or_default(),
        })
    }
}

/// Machine shape and polling settings
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Machines API base URL
    pub api_base: String,
    /// Logs API base URL
    pub logs_api_base: String,
    /// Region to create machines in
    pub region: String,
    /// Container image
    pub image: String,
    /// Init command; the run's prompt and spec arrive as env vars
    pub command: Vec<String>,
    /// `shared` or `performance`
    pub cpu_kind: String,
    /// vCPU count
    pub cpus: u32,
    /// Memory in MB
    pub memory_mb: u32,
    /// Bound on provisioning plus tailing
    pub timeout: Duration,
    /// Delay between log/state polls
    pub poll_interval: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.machines.dev".to_string(),
            logs_api_base: "https://api.fly.io".to_string(),
            region: "ord".to_string(),
            image: "python:3.11-slim".to_string(),
            command: vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "echo \"Starting task $RUN_ID\" && echo \"Prompt: $PROMPT\" && echo '[Process finished]'"
                    .to_string(),
            ],
            cpu_kind: "shared".to_string(),
            cpus: 1,
            memory_mb: 512,
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// One page from the logs API
#[derive(Debug, Default, PartialEq)]
pub struct LogPage {
    /// Log lines in order
    pub lines: Vec<String>,
    /// Cursor for the next page
    pub next_token: Option<String>,
}

#[derive(Deserialize)]
struct LogResponse {
    #[serde(default)]
    data: Vec<LogEntry>,
    #[serde(default)]
    meta: Option<LogMeta>,
}

#[derive(Deserialize)]
struct LogEntry {
    attributes: LogAttributes,
}

#[derive(Deserialize)]
struct LogAttributes {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct LogMeta {
    #[serde(default)]
    next_token: Option<String>,
}

impl LogPage {
    /// Parse a logs API response body
    pub fn parse(body: &str) -> Result<Self> {
        let response: LogResponse = serde_json::from_str(body)
            .map_err(|e| Error::Remote(format!("unreadable log page: {}", e)))?;
        Ok(Self {
            lines: response
                .data
                .into_iter()
                .map(|entry| entry.attributes.message)
                .collect(),
            next_token: response
                .meta
                .and_then(|meta| meta.next_token)
                .filter(|token| !token.is_empty()),
        })
    }
}

#[derive(Deserialize)]
struct MachineInfo {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

/// Why tailing stopped successfully
enum TailEnd {
    Marker,
    Stopped(String),
}

/// Creates, tails and destroys Fly Machines
pub struct RemoteBackend {
    client: reqwest::Client,
    config: RemoteConfig,
    credentials: RemoteCredentials,
}

impl RemoteBackend {
    /// Create a backend
    pub fn new(config: RemoteConfig, credentials: RemoteCredentials) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Configuration(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            config,
            credentials,
        })
    }

    /// Machine shape and polling settings
    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn machines_url(&self) -> String {
        format!(
            "{}/v1/apps/{}/machines",
            self.config.api_base.trim_end_matches('/'),
            self.credentials.app_name
        )
    }

    /// Request body for machine creation
    #[must_use]
    pub fn create_body(
        &self,
        run_id: RunId,
        prompt: &str,
        spec: &TaskSpecification,
    ) -> serde_json::Value {
        let spec_json = serde_json::to_string(spec).unwrap_or_default();
        serde_json::json!({
            "name": format!("task-{}", run_id.short()),
            "region": self.config.region,
            "config": {
                "image": self.config.image,
                "init": { "exec": self.config.command },
                "env": {
                    "RUN_ID": run_id.to_string(),
                    "PROMPT": prompt,
                    "SPEC": spec_json,
                },
                "auto_destroy": true,
                "guest": {
                    "cpu_kind": self.config.cpu_kind,
                    "cpus": self.config.cpus,
                    "memory_mb": self.config.memory_mb,
                },
                "restart": { "policy": "no" },
            }
        })
    }

    /// Run a task remotely and return the last output line.
    ///
    /// Provisioning and tailing share one deadline. The machine is destroyed
    /// before returning, including on timeout and cancellation.
    #[instrument(skip_all, fields(run_id = %run_id))]
    pub async fn run(
        &self,
        run_id: RunId,
        prompt: &str,
        spec: &TaskSpecification,
        listener: &dyn EngineListener,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let deadline = Instant::now() + self.config.timeout;
        let timeout_secs = self.config.timeout.as_secs();

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // The create request runs as its own task so that giving up on it
        // never loses a machine the API already made.
        let mut create = tokio::spawn(create_machine(
            self.client.clone(),
            self.machines_url(),
            self.credentials.api_token.clone(),
            self.create_body(run_id, prompt, spec),
        ));
        let provisioned = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            joined = tokio::time::timeout_at(deadline, &mut create) => {
                joined.map_err(|_| Error::Timeout(timeout_secs))
            }
        };
        let lease = match provisioned {
            Ok(joined) => joined
                .map_err(|e| Error::Remote(format!("Machine creation failed: {}", e)))??,
            Err(e) => {
                settle_abandoned(create).await;
                return Err(e);
            }
        };
        listener.log(&format!(
            "Fly Machine {} created, launching...",
            lease.machine_id
        ));

        let mut last_line = None;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            tailed = tokio::time::timeout_at(deadline, self.tail(&lease.machine_id, listener, &mut last_line)) => {
                tailed.unwrap_or(Err(Error::Timeout(timeout_secs)))
            }
        };

        lease.release().await;

        match outcome? {
            TailEnd::Marker => info!("Remote task reported completion"),
            TailEnd::Stopped(state) => info!(state = %state, "Remote machine stopped"),
        }
        Ok(last_line.unwrap_or_else(|| "Remote task finished".to_string()))
    }

    async fn tail(
        &self,
        machine_id: &str,
        listener: &dyn EngineListener,
        last_line: &mut Option<String>,
    ) -> Result<TailEnd> {
        let mut cursor = String::new();
        let mut last_state = String::new();
        let mut state_errors = 0;

        loop {
            if self.drain_logs(machine_id, &mut cursor, listener, last_line).await {
                return Ok(TailEnd::Marker);
            }

            match self.machine_state(machine_id).await {
                Ok(state) => {
                    state_errors = 0;
                    if state != last_state {
                        listener.log(&format!("Machine status: {}", state));
                        last_state = state.clone();
                    }
                    match state.as_str() {
                        "stopped" | "destroyed" => {
                            // Pick up lines written just before exit.
                            if self.drain_logs(machine_id, &mut cursor, listener, last_line).await {
                                return Ok(TailEnd::Marker);
                            }
                            return Ok(TailEnd::Stopped(state));
                        }
                        "failed" => {
                            return Err(Error::Remote(format!("machine {} failed", machine_id)))
                        }
                        _ => {}
                    }
                }
                Err(e) => {
                    state_errors += 1;
                    warn!(error = %e, attempt = state_errors, "Machine status check failed");
                    if state_errors >= MAX_STATE_ERRORS {
                        return Err(e);
                    }
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Forward new log lines; returns true once the finish marker is seen
    async fn drain_logs(
        &self,
        machine_id: &str,
        cursor: &mut String,
        listener: &dyn EngineListener,
        last_line: &mut Option<String>,
    ) -> bool {
        let page = match self.fetch_logs(machine_id, cursor).await {
            Ok(page) => page,
            Err(e) => {
                debug!(error = %e, "Log fetch failed");
                return false;
            }
        };
        if let Some(next) = page.next_token {
            *cursor = next;
        }
        for line in page.lines {
            listener.log(&line);
            if line.contains(FINISH_MARKER) {
                return true;
            }
            if !line.trim().is_empty() {
                *last_line = Some(line);
            }
        }
        false
    }

    async fn fetch_logs(&self, machine_id: &str, cursor: &str) -> Result<LogPage> {
        let url = format!(
            "{}/api/v1/apps/{}/logs",
            self.config.logs_api_base.trim_end_matches('/'),
            self.credentials.app_name
        );
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.credentials.api_token)
            .query(&[("instance", machine_id), ("next_token", cursor)])
            .send()
            .await
            .map_err(|e| Error::Remote(format!("log request failed: {}", e)))?;
        if !response.status().is_success() {
            return Err(Error::Remote(format!(
                "log request returned {}",
                response.status().as_u16()
            )));
        }
        let body = response
            .text()
            .await
            .map_err(|e| Error::Remote(format!("log body: {}", e)))?;
        LogPage::parse(&body)
    }

    async fn machine_state(&self, machine_id: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/{}", self.machines_url(), machine_id))
            .bearer_auth(&self.credentials.api_token)
            .send()
            .await
            .map_err(|e| Error::Remote(format!("status request failed: {}", e)))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok("destroyed".to_string());
        }
        if !response.status().is_success() {
            return Err(Error::Remote(format!(
                "status request returned {}",
                response.status().as_u16()
            )));
        }
        let info: MachineInfo = response
            .json()
            .await
            .map_err(|e| Error::Remote(format!("status body: {}", e)))?;
        Ok(info.state.unwrap_or_else(|| "unknown".to_string()))
    }
}

/// POST the machine; the lease exists as soon as the API returns an id
async fn create_machine(
    client: reqwest::Client,
    url: String,
    token: String,
    body: serde_json::Value,
) -> Result<MachineLease> {
    let response = client
        .post(&url)
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await
        .map_err(|e| Error::Remote(format!("Machine creation failed: {}", e)))?;

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if !status.is_success() {
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
            .unwrap_or_else(|| format!("status {}: {}", status.as_u16(), body));
        return Err(Error::Remote(format!("Machine creation failed: {}", detail)));
    }

    let info: MachineInfo = serde_json::from_str(&body)
        .map_err(|e| Error::Remote(format!("unreadable machine response: {}", e)))?;
    let machine_id = info
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Remote("machine response has no id".to_string()))?;
    info!(machine_id = %machine_id, "Fly Machine created");

    Ok(MachineLease {
        client,
        url: format!("{}/{}", url, machine_id),
        token,
        machine_id,
        released: false,
    })
}

/// Wait out a create request the run stopped waiting for and destroy
/// whatever it produced. Bounded by the HTTP client timeout.
async fn settle_abandoned(create: tokio::task::JoinHandle<Result<MachineLease>>) {
    match create.await {
        Ok(Ok(lease)) => {
            warn!(
                machine_id = %lease.machine_id,
                "Machine finished provisioning after the run gave up; destroying it"
            );
            lease.release().await;
        }
        Ok(Err(e)) => debug!(error = %e, "Abandoned machine creation failed"),
        Err(e) => warn!(error = %e, "Abandoned machine creation task did not complete"),
    }
}

/// A provisioned machine that must be destroyed.
///
/// `release` destroys it in place; a lease dropped without release (panic,
/// aborted task) destroys it from a spawned task.
struct MachineLease {
    client: reqwest::Client,
    url: String,
    token: String,
    machine_id: String,
    released: bool,
}

impl MachineLease {
    async fn release(mut self) {
        self.released = true;
        destroy_machine(&self.client, &self.url, &self.token, &self.machine_id).await;
    }
}

impl Drop for MachineLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let client = self.client.clone();
        let url = std::mem::take(&mut self.url);
        let token = std::mem::take(&mut self.token);
        let machine_id = std::mem::take(&mut self.machine_id);
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    destroy_machine(&client, &url, &token, &machine_id).await;
                });
            }
            Err(_) => warn!(machine_id = %machine_id, "No runtime to destroy machine; it will auto-destroy on exit"),
        }
    }
}

async fn destroy_machine(client: &reqwest::Client, url: &str, token: &str, machine_id: &str) {
    let result = client
        .delete(url)
        .bearer_auth(token)
        .query(&[("force", "true")])
        .send()
        .await;
    match result {
        Ok(response)
            if response.status().is_success()
                || response.status() == reqwest::StatusCode::NOT_FOUND =>
        {
            info!(machine_id = %machine_id, "Fly Machine destroyed");
        }
        Ok(response) => warn!(
            machine_id = %machine_id,
            status = response.status().as_u16(),
            "Machine teardown rejected"
        ),
        Err(e) => warn!(machine_id = %machine_id, error = %e, "Machine teardown failed"),
    }
}
