//! Function-calling types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tool offered to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// JSON schema for parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A tool call requested by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id
    pub id: String,
    /// Tool name
    pub name: String,
    /// Arguments as a JSON string
    pub arguments: String,
}

impl ToolCall {
    /// Parse the arguments into a JSON value
    ///
    /// Empty argument strings are treated as `{}`.
    pub fn arguments_value(&self) -> Result<serde_json::Value> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments).map_err(|e| Error::InvalidResponse(e.to_string()))
    }
}
