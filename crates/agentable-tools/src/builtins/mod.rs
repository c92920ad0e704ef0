//! Builtins - the static tool catalog
//!
//! - `WebsiteSearchTool` (aliases `exa_search_tool`, `search`): Exa web search
//! - `BrowserbaseLoadTool`: fetch a page through Browserbase and return its text
//! - `DallETool`: OpenAI image generation

mod browser_load;
mod image;
mod web_search;

pub use browser_load::BrowserLoadTool;
pub use image::ImageGenerationTool;
pub use web_search::WebSearchTool;

use crate::error::{Error, Result};
use crate::registry::ToolRegistry;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// HTTP timeout for catalog tools (seconds)
const TOOL_HTTP_TIMEOUT_SECS: u64 = 30;

/// Credentials consumed by the catalog tools
#[derive(Clone, Default)]
pub struct ToolCredentials {
    /// Exa search API key
    pub exa_api_key: Option<String>,
    /// Browserbase API key
    pub browserbase_api_key: Option<String>,
    /// Browserbase project id
    pub browserbase_project_id: Option<String>,
    /// OpenAI key used for image generation
    pub openai_api_key: Option<String>,
}

impl fmt::Debug for ToolCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let present = |v: &Option<String>| if v.is_some() { "[SET]" } else { "[UNSET]" };
        f.debug_struct("ToolCredentials")
            .field("exa_api_key", &present(&self.exa_api_key))
            .field("browserbase_api_key", &present(&self.browserbase_api_key))
            .field("browserbase_project_id", &self.browserbase_project_id)
            .field("openai_api_key", &present(&self.openai_api_key))
            .finish()
    }
}

impl ToolCredentials {
    /// Read credentials from `EXA_API_KEY`, `BROWSERBASE_API_KEY`,
    /// `BROWSERBASE_PROJECT_ID` and `OPENAI_API_KEY`. Blank values count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            exa_api_key: var("EXA_API_KEY"),
            browserbase_api_key: var("BROWSERBASE_API_KEY"),
            browserbase_project_id: var("BROWSERBASE_PROJECT_ID"),
            openai_api_key: var("OPENAI_API_KEY"),
        }
    }
}

/// Require a credential, naming the variable when it is missing
pub(crate) fn require<'a>(value: &'a Option<String>, variable: &str) -> Result<&'a str> {
    value
        .as_deref()
        .ok_or_else(|| Error::NotConfigured(format!("{} is not set", variable)))
}

/// Read a required non-empty string field from tool input
pub(crate) fn required_str<'a>(input: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    input
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::InvalidInput(format!("Missing '{}' parameter", field)))
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(TOOL_HTTP_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}

/// Register the full catalog and its aliases
pub fn register_catalog(registry: &mut ToolRegistry, credentials: &ToolCredentials) {
    let client = http_client();

    registry.register(Arc::new(WebSearchTool::new(
        client.clone(),
        credentials.exa_api_key.clone(),
    )));
    registry.register(Arc::new(BrowserLoadTool::new(
        client.clone(),
        credentials.browserbase_api_key.clone(),
        credentials.browserbase_project_id.clone(),
    )));
    registry.register(Arc::new(ImageGenerationTool::new(
        client,
        credentials.openai_api_key.clone(),
    )));

    registry.alias("exa_search_tool", web_search::TOOL_NAME);
    registry.alias("search", web_search::TOOL_NAME);
    registry.alias("browserbase", browser_load::TOOL_NAME);
    registry.alias("dalle", image::TOOL_NAME);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_and_aliases() {
        let mut registry = ToolRegistry::new();
        register_catalog(&mut registry, &ToolCredentials::default());

        assert_eq!(
            registry.list_names(),
            vec!["BrowserbaseLoadTool", "DallETool", "WebsiteSearchTool"]
        );
        assert!(registry.has("exa_search_tool"));
        assert!(registry.has("search"));
        assert!(registry.has("dalle"));
        assert!(!registry.has("SlackSendMessageTool"));
    }

    #[test]
    fn test_credentials_debug_hides_keys() {
        let creds = ToolCredentials {
            exa_api_key: Some("exa-secret-value".to_string()),
            ..Default::default()
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("exa-secret-value"));
        assert!(debug.contains("[SET]"));
    }

    #[test]
    fn test_required_str() {
        let input = serde_json::json!({"query": "  rust  ", "blank": " "});
        assert_eq!(required_str(&input, "query").unwrap(), "rust");
        assert!(matches!(
            required_str(&input, "blank"),
            Err(Error::InvalidInput(_))
        ));
        assert!(required_str(&input, "missing").is_err());
    }
}
