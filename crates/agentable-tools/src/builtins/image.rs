//! Image generation through the OpenAI images endpoint

use super::{require, required_str};
use crate::error::{Error, Result};
use crate::registry::{Tool, ToolCategory, ToolDefinition, ToolResult};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

pub(crate) const TOOL_NAME: &str = "DallETool";

const OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";
const IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_SIZE: &str = "1024x1024";
const ALLOWED_SIZES: &[&str] = &["1024x1024", "1792x1024", "1024x1792"];

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

/// Markdown image link with the description as alt text
pub(crate) fn image_markdown(description: &str, url: &str) -> String {
    let alt: String = description
        .chars()
        .filter(|c| !matches!(c, '[' | ']'))
        .take(120)
        .collect();
    format!("![{}]({})", alt.trim(), url)
}

/// DALL-E image generation tool.
pub struct ImageGenerationTool {
    definition: ToolDefinition,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl ImageGenerationTool {
    /// Create a new image generation tool.
    #[must_use]
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        let definition = ToolDefinition::new(
            TOOL_NAME,
            "Generate an image from a text description. Returns a markdown image link.",
        )
        .with_category(ToolCategory::Image)
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "image_description": {
                    "type": "string",
                    "description": "Detailed description of the image to generate"
                },
                "size": {
                    "type": "string",
                    "enum": ALLOWED_SIZES,
                    "description": "Image size (default 1024x1024)"
                }
            },
            "required": ["image_description"]
        }));

        Self {
            definition,
            client,
            api_key,
        }
    }
}

#[async_trait::async_trait]
impl Tool for ImageGenerationTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(&self, input: serde_json::Value) -> Result<ToolResult> {
        let start = Instant::now();
        let description = required_str(&input, "image_description")?;
        let size = input
            .get("size")
            .and_then(|v| v.as_str())
            .filter(|s| ALLOWED_SIZES.contains(s))
            .unwrap_or(DEFAULT_SIZE);
        let api_key = require(&self.api_key, "OPENAI_API_KEY")?;

        debug!(size = %size, "Generating image");

        let response = self
            .client
            .post(OPENAI_IMAGES_URL)
            .bearer_auth(api_key)
            .json(&ImageRequest {
                model: IMAGE_MODEL,
                prompt: description,
                n: 1,
                size,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Execution(format!(
                "image generation failed with status {}",
                status
            )));
        }

        let body: ImageResponse = response.json().await?;
        let image = body
            .data
            .into_iter()
            .find_map(|d| d.url.map(|url| (url, d.revised_prompt)))
            .ok_or_else(|| Error::Execution("no image returned".to_string()))?;

        Ok(ToolResult::success(
            serde_json::json!({
                "markdown": image_markdown(description, &image.0),
                "url": image.0,
                "revised_prompt": image.1,
            }),
            start.elapsed().as_millis() as u64,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_markdown() {
        assert_eq!(
            image_markdown("a [red] fox", "https://img/x.png"),
            "![a red fox](https://img/x.png)"
        );
    }

    #[tokio::test]
    async fn test_requires_description() {
        let tool = ImageGenerationTool::new(reqwest::Client::new(), Some("sk".to_string()));
        let err = tool
            .execute(serde_json::json!({"size": "1024x1024"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_requires_key() {
        let tool = ImageGenerationTool::new(reqwest::Client::new(), None);
        let err = tool
            .execute(serde_json::json!({"image_description": "a fox"}))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
