//! Registry - tool registration and lookup
//!
//! Tools are registered once at startup under a canonical name. Specifications
//! produced by the LLM refer to tools by loose names, so the registry also
//! keeps aliases that resolve to a canonical entry.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Tool category for organization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCategory {
    /// Web search
    Search,
    /// Page loading / browsing
    Browser,
    /// Image generation
    Image,
    /// Anything else
    Utility,
}

impl ToolCategory {
    /// Returns the string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Browser => "browser",
            Self::Image => "image",
            Self::Utility => "utility",
        }
    }
}

/// Tool metadata and schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name
    pub name: String,
    /// Human-readable description
    pub description: String,
    /// JSON schema for parameters
    pub parameters: serde_json::Value,
    /// Tool category
    pub category: ToolCategory,
}

impl ToolDefinition {
    /// Create a new tool definition with an empty object schema
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
            category: ToolCategory::Utility,
        }
    }

    /// Set the parameters schema
    #[must_use]
    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the category
    #[must_use]
    pub fn with_category(mut self, category: ToolCategory) -> Self {
        self.category = category;
        self
    }

    /// Convert to the function-calling shape the LLM crate expects
    #[must_use]
    pub fn to_llm(&self) -> agentable_llm::ToolDefinition {
        agentable_llm::ToolDefinition::new(&self.name, &self.description, self.parameters.clone())
    }
}

/// Result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether execution succeeded
    pub success: bool,
    /// Output data
    pub output: serde_json::Value,
    /// Error message if failed
    pub error: Option<String>,
    /// Execution duration in milliseconds
    pub duration_ms: u64,
}

impl ToolResult {
    /// Create a successful result
    #[must_use]
    pub fn success(output: serde_json::Value, duration_ms: u64) -> Self {
        Self {
            success: true,
            output,
            error: None,
            duration_ms,
        }
    }

    /// Create a failed result
    #[must_use]
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error.into()),
            duration_ms,
        }
    }

    /// Render the result as text for an LLM conversation
    #[must_use]
    pub fn to_text(&self) -> String {
        if self.success {
            match &self.output {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            }
        } else {
            format!(
                "error: {}",
                self.error.as_deref().unwrap_or("unknown tool failure")
            )
        }
    }
}

/// Trait for tool implementations
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool definition
    fn definition(&self) -> &ToolDefinition;

    /// Execute the tool with given input
    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult>;
}

/// Registry for managing tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    aliases: HashMap<String, String>,
}

impl ToolRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its definition name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().name.clone();
        debug!(tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    /// Register an alternate name for an already registered tool
    pub fn alias(&mut self, alias: impl Into<String>, canonical: impl Into<String>) {
        self.aliases.insert(alias.into(), canonical.into());
    }

    /// Look up a tool by name or alias
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let name = name.trim();
        self.tools.get(name).cloned().or_else(|| {
            self.aliases
                .get(name)
                .and_then(|canonical| self.tools.get(canonical))
                .cloned()
        })
    }

    /// Check if a tool (or alias) exists
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// List canonical tool names, sorted
    #[must_use]
    pub fn list_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// List all tool definitions, sorted by name
    #[must_use]
    pub fn list_definitions(&self) -> Vec<&ToolDefinition> {
        let mut defs: Vec<&ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Get tool count
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool {
        definition: ToolDefinition,
    }

    #[async_trait::async_trait]
    impl Tool for EchoTool {
        fn definition(&self) -> &ToolDefinition {
            &self.definition
        }

        async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
            Ok(ToolResult::success(input, 0))
        }
    }

    fn echo(name: &str) -> Arc<dyn Tool> {
        Arc::new(EchoTool {
            definition: ToolDefinition::new(name, "echoes input"),
        })
    }

    #[test]
    fn test_register_and_alias() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("WebsiteSearchTool"));
        registry.alias("search", "WebsiteSearchTool");

        assert!(registry.has("WebsiteSearchTool"));
        assert!(registry.has("search"));
        assert!(registry.has(" search "));
        assert!(!registry.has("SlackTool"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.list_names(), vec!["WebsiteSearchTool"]);
    }

    #[test]
    fn test_dangling_alias_resolves_to_nothing() {
        let mut registry = ToolRegistry::new();
        registry.alias("ghost", "NotRegistered");
        assert!(registry.get("ghost").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_tool_result_text() {
        let ok = ToolResult::success(serde_json::json!("plain"), 3);
        assert_eq!(ok.to_text(), "plain");

        let structured = ToolResult::success(serde_json::json!({"n": 1}), 3);
        assert_eq!(structured.to_text(), r#"{"n":1}"#);

        let failed = ToolResult::failure("quota exceeded", 1);
        assert_eq!(failed.to_text(), "error: quota exceeded");
    }

    #[test]
    fn test_definition_to_llm() {
        let def = ToolDefinition::new("DallETool", "draws")
            .with_category(ToolCategory::Image)
            .with_parameters(serde_json::json!({"type": "object"}));
        let llm = def.to_llm();
        assert_eq!(llm.name, "DallETool");
        assert_eq!(llm.parameters["type"], "object");
        assert_eq!(def.category.as_str(), "image");
    }

    #[tokio::test]
    async fn test_execute_through_registry() {
        let mut registry = ToolRegistry::new();
        registry.register(echo("echo"));
        let tool = registry.get("echo").unwrap();
        let result = tool.execute(serde_json::json!({"a": 1})).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output["a"], 1);
    }
}
