//! Web search through the Exa search API

use super::{require, required_str};
use crate::error::{Error, Result};
use crate::registry::{Tool, ToolCategory, ToolDefinition, ToolResult};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

pub(crate) const TOOL_NAME: &str = "WebsiteSearchTool";

const EXA_SEARCH_URL: &str = "https://api.exa.ai/search";

/// Maximum number of search results to return
const MAX_RESULTS_CAP: u64 = 10;

/// Default number of results
const DEFAULT_MAX_RESULTS: u64 = 5;

/// Characters of page text requested per result
const SNIPPET_CHARS: u32 = 1000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    num_results: u64,
    contents: SearchContents,
}

#[derive(Debug, Serialize)]
struct SearchContents {
    text: SearchText,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchText {
    max_characters: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
}

/// A single search result entry.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SearchResult {
    title: String,
    url: String,
    snippet: String,
}

impl From<SearchHit> for SearchResult {
    fn from(hit: SearchHit) -> Self {
        Self {
            title: hit.title.unwrap_or_default(),
            url: hit.url,
            snippet: hit.text.unwrap_or_default().trim().to_string(),
        }
    }
}

/// Exa-backed web search tool.
pub struct WebSearchTool {
    definition: ToolDefinition,
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl WebSearchTool {
    /// Create a new web search tool.
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        let definition = ToolDefinition::new(
            TOOL_NAME,
            "Search the web for up-to-date information. Returns titles, URLs and \
             text snippets for the most relevant pages.",
        )
        .with_category(ToolCategory::Search)
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query string"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (1-10, default 5)"
                }
            },
            "required": ["query"]
        }));

        Self {
            definition,
            client,
            api_key,
            endpoint: EXA_SEARCH_URL.to_string(),
        }
    }

    /// Point the tool at a different search endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait::async_trait]
impl Tool for WebSearchTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        let start = Instant::now();
        let query = required_str(&input, "query")?;
        let api_key = require(&self.api_key, "EXA_API_KEY")?;

        let max_results = input
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| n.clamp(1, MAX_RESULTS_CAP))
            .unwrap_or(DEFAULT_MAX_RESULTS);

        debug!(query = %query, max_results, "Searching the web");

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .json(&SearchRequest {
                query,
                num_results: max_results,
                contents: SearchContents {
                    text: SearchText {
                        max_characters: SNIPPET_CHARS,
                    },
                },
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Execution(format!(
                "search request failed with status {}",
                status
            )));
        }

        let body: SearchResponse = response.json().await?;
        let results: Vec<SearchResult> = body.results.into_iter().map(Into::into).collect();

        Ok(ToolResult::success(
            serde_json::json!({
                "query": query,
                "results": results,
                "total": results.len(),
            }),
            start.elapsed().as_millis() as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_query_is_invalid() {
        let tool = WebSearchTool::new(reqwest::Client::new(), Some("key".to_string()));
        let err = tool.execute(serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_key_is_not_configured() {
        let tool = WebSearchTool::new(reqwest::Client::new(), None);
        let err = tool
            .execute(serde_json::json!({"query": "rust async"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("EXA_API_KEY"));
    }

    #[test]
    fn test_request_uses_exa_field_names() {
        let body = serde_json::to_value(SearchRequest {
            query: "q",
            num_results: 3,
            contents: SearchContents {
                text: SearchText { max_characters: 10 },
            },
        })
        .unwrap();
        assert_eq!(body["numResults"], 3);
        assert_eq!(body["contents"]["text"]["maxCharacters"], 10);
    }

    #[test]
    fn test_hit_conversion_defaults() {
        let hit: SearchHit = serde_json::from_value(serde_json::json!({
            "url": "https://example.com",
            "text": "  body  "
        }))
        .unwrap();
        let result = SearchResult::from(hit);
        assert_eq!(result.title, "");
        assert_eq!(result.snippet, "body");
    }
}
