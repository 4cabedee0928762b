// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Image generation tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ParleyError, Result};
use crate::llm::transport::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolEndpoint, ToolKind};

const STYLES: &[&str] = &["natural", "vivid", "sketch", "anime"];
const SIZES: &[&str] = &["256x256", "512x512", "1024x1024"];

/// Tool for generating images from a prompt
pub struct ImageGenerationTool {
    endpoint: Arc<ToolEndpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    #[serde(default, alias = "url")]
    image_url: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

impl ImageGenerationTool {
    pub fn new(endpoint: Arc<ToolEndpoint>) -> Self {
        Self { endpoint }
    }
}

#[async_trait]
impl Tool for ImageGenerationTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ImageGeneration
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolKind::ImageGeneration.to_string(),
            description: "Generate an image from a text prompt. Returns the image URL.".to_string(),
            parameters: SchemaBuilder::new()
                .string("prompt", "Description of the image", true)
                .string_enum("style", "Visual style (default: natural)", STYLES, false)
                .string_enum("size", "Image size (default: 1024x1024)", SIZES, false)
                .build(),
        }
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let prompt = required_str(&args, "prompt")?;
        let style = args["style"].as_str().unwrap_or("natural");
        let size = args["size"].as_str().unwrap_or("1024x1024");

        let payload = self
            .endpoint
            .post(
                "image-generation",
                serde_json::json!({ "prompt": prompt, "style": style, "size": size }),
            )
            .await?;
        let response: ImageResponse = serde_json::from_value(payload)?;

        let url = response.image_url.ok_or_else(|| {
            ParleyError::ToolExecution("image-generation returned no image URL".to_string())
        })?;

        Ok(match response.revised_prompt {
            Some(revised) => format!("Generated image ({}): {}\nPrompt used: {}", size, url, revised),
            None => format!("Generated image ({}): {}", size, url),
        })
    }
}
