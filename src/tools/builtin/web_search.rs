// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Web search tool

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::transport::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolEndpoint, ToolKind};

const MAX_RESULTS: usize = 5;

/// Tool for searching the web
pub struct WebSearchTool {
    endpoint: Arc<ToolEndpoint>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default, alias = "content", alias = "description")]
    snippet: String,
}

impl WebSearchTool {
    pub fn new(endpoint: Arc<ToolEndpoint>) -> Self {
        Self { endpoint }
    }
}

fn format_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!("No results found for \"{}\"", query);
    }

    let mut out = format!("Search results for \"{}\":\n", query);
    for (i, hit) in hits.iter().take(MAX_RESULTS).enumerate() {
        out.push_str(&format!("{}. {} - {}\n", i + 1, hit.title, hit.url));
        if !hit.snippet.is_empty() {
            out.push_str(&format!("   {}\n", hit.snippet));
        }
    }
    out.trim_end().to_string()
}

#[async_trait]
impl Tool for WebSearchTool {
    fn kind(&self) -> ToolKind {
        ToolKind::WebSearch
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolKind::WebSearch.to_string(),
            description: "Search the web for up-to-date information. Returns titles, URLs and snippets."
                .to_string(),
            parameters: SchemaBuilder::new()
                .string("query", "Search query", true)
                .build(),
        }
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let query = required_str(&args, "query")?;
        let payload = self
            .endpoint
            .post("web-search", serde_json::json!({ "query": query }))
            .await?;
        let response: SearchResponse = serde_json::from_value(payload)?;
        Ok(format_hits(query, &response.results))
    }
}
