//! Page loading through Browserbase
//!
//! The page is fetched by a Browserbase-hosted browser, reduced to readable
//! text and truncated so a single page cannot blow the model's context.

use super::{require, required_str};
use crate::error::{Error, Result};
use crate::registry::{Tool, ToolCategory, ToolDefinition, ToolResult};
use agentable_llm::util::truncate_safe;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, warn};
use url::Url;

pub(crate) const TOOL_NAME: &str = "BrowserbaseLoadTool";

const BROWSERBASE_FETCH_URL: &str = "https://api.browserbase.com/v1/fetch";

/// Roughly 150k tokens at ~4 bytes per token
const MAX_CONTENT_BYTES: usize = 600_000;

static NOISE_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b.*?</script>|<style\b.*?</style>|<nav\b.*?</nav>|<header\b.*?</header>|<footer\b.*?</footer>|<aside\b.*?</aside>|<!--.*?-->",
    )
    .expect("valid noise regex")
});

static TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").expect("valid tag regex"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FetchRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    project_id: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    status_code: Option<u16>,
}

/// Reduce an HTML document to whitespace-normalised text
pub(crate) fn html_to_text(html: &str) -> String {
    let without_noise = NOISE_BLOCKS.replace_all(html, " ");
    let without_tags = TAGS.replace_all(&without_noise, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::InvalidInput(format!("Invalid URL: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::InvalidInput(format!(
            "URL scheme '{}' is not allowed",
            scheme
        ))),
    }
}

/// Browserbase page loader.
pub struct BrowserLoadTool {
    definition: ToolDefinition,
    client: reqwest::Client,
    api_key: Option<String>,
    project_id: Option<String>,
}

impl BrowserLoadTool {
    /// Create a new page loader.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        project_id: Option<String>,
    ) -> Self {
        let definition = ToolDefinition::new(
            TOOL_NAME,
            "Load a web page in a hosted browser and return its readable text content.",
        )
        .with_category(ToolCategory::Browser)
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Absolute http(s) URL of the page to load"
                }
            },
            "required": ["url"]
        }));

        Self {
            definition,
            client,
            api_key,
            project_id,
        }
    }
}

#[async_trait::async_trait]
impl Tool for BrowserLoadTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        let start = Instant::now();
        let url = validate_url(required_str(&input, "url")?)?;
        let api_key = require(&self.api_key, "BROWSERBASE_API_KEY")?;

        debug!(url = %url, "Loading page through Browserbase");

        let response = self
            .client
            .post(BROWSERBASE_FETCH_URL)
            .header("X-BB-API-Key", api_key)
            .json(&FetchRequest {
                url: url.as_str(),
                project_id: self.project_id.as_deref(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Execution(format!(
                "page load failed with status {}",
                status
            )));
        }

        let body: FetchResponse = response.json().await?;
        if let Some(code) = body.status_code.filter(|c| *c >= 400) {
            warn!(url = %url, status = code, "Target page returned an error status");
        }

        let text = html_to_text(&body.content);
        let truncated = text.len() > MAX_CONTENT_BYTES;
        let content = truncate_safe(&text, MAX_CONTENT_BYTES);

        Ok(ToolResult::success(
            serde_json::json!({
                "url": url.as_str(),
                "content": content,
                "truncated": truncated,
            }),
            start.elapsed().as_millis() as u64,
        ))
    }
}
