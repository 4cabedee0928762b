// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for Parley
//!
//! Tools are keyed by [`ToolKind`] rather than by free-form strings. The model
//! still names tools on the wire, so lookups go through `ToolKind::from_str`
//! and an unknown name is a lookup miss rather than a panic.
//!
//! Executors may fail, but [`ToolRegistry::execute`] never does: failures are
//! folded into an error [`ToolResult`] whose text is fed back to the model.

pub mod builtin;
pub mod definition;
pub mod endpoint;

pub use definition::*;
pub use endpoint::ToolEndpoint;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ParleyError, Result};
use crate::llm::transport::ToolDefinition;

/// Identifiers of the tools the model may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    WebSearch,
    Weather,
    ImageGeneration,
    ComputerUse,
}

impl ToolKind {
    /// Every known tool
    pub const ALL: [ToolKind; 4] = [
        ToolKind::WebSearch,
        ToolKind::Weather,
        ToolKind::ImageGeneration,
        ToolKind::ComputerUse,
    ];

    /// Name used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::WebSearch => "web_search",
            ToolKind::Weather => "weather",
            ToolKind::ImageGeneration => "image_generation",
            ToolKind::ComputerUse => "computer_use",
        }
    }
}

impl FromStr for ToolKind {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self> {
        ToolKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| ParleyError::ToolNotFound(s.to_string()))
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of tool execution
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    /// The tool call this result corresponds to
    pub tool_call_id: String,
    /// The output of the tool
    pub output: ToolOutput,
}

/// Output from a tool
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Successful output
    Success(String),
    /// Error output
    Error(String),
}

impl ToolResult {
    /// Create a successful result
    pub fn success(tool_call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: ToolOutput::Success(output.into()),
        }
    }

    /// Create an error result
    pub fn error(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: ToolOutput::Error(error.into()),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self.output, ToolOutput::Error(_))
    }

    /// Get the output text
    pub fn output_text(&self) -> &str {
        match &self.output {
            ToolOutput::Success(s) => s,
            ToolOutput::Error(s) => s,
        }
    }
}

/// Capability implemented by every tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Which tool this is
    fn kind(&self) -> ToolKind;

    /// Get the tool definition for the model
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the model-provided arguments
    async fn execute(&self, args: Value) -> Result<String>;
}

/// Registry of available tools, shared read-only across sessions
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolKind, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with all built-in tools talking to `endpoint`
    pub fn with_builtins(endpoint: ToolEndpoint) -> Self {
        let endpoint = Arc::new(endpoint);
        let mut registry = Self::new();
        registry.register(Arc::new(builtin::WebSearchTool::new(endpoint.clone())));
        registry.register(Arc::new(builtin::WeatherTool::new(endpoint.clone())));
        registry.register(Arc::new(builtin::ImageGenerationTool::new(endpoint.clone())));
        registry.register(Arc::new(builtin::ComputerUseTool::new(endpoint)));
        registry
    }

    /// Register a tool, replacing any previous tool of the same kind
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.kind(), tool);
    }

    /// Get a tool by kind
    pub fn get(&self, kind: ToolKind) -> Option<&Arc<dyn Tool>> {
        self.tools.get(&kind)
    }

    /// Resolve a wire name to a registered tool
    pub fn lookup(&self, name: &str) -> Result<&Arc<dyn Tool>> {
        let kind: ToolKind = name.parse()?;
        self.get(kind)
            .ok_or_else(|| ParleyError::ToolNotFound(name.to_string()))
    }

    /// Registered tool kinds
    pub fn kinds(&self) -> Vec<ToolKind> {
        self.tools.keys().copied().collect()
    }

    /// Definitions for the enabled tools that are registered
    pub fn definitions(&self, enabled: &[ToolKind]) -> Vec<ToolDefinition> {
        enabled
            .iter()
            .filter_map(|k| self.get(*k))
            .map(|t| t.definition())
            .collect()
    }

    /// Execute a tool call; never fails
    pub async fn execute(&self, tool_call_id: &str, name: &str, args: Value) -> ToolResult {
        let tool = match self.lookup(name) {
            Ok(tool) => tool.clone(),
            Err(e) => {
                tracing::warn!(target: "parley.tools", tool = %name, "model requested unknown tool");
                return ToolResult::error(tool_call_id, e.to_string());
            }
        };

        match tool.execute(args).await {
            Ok(output) => ToolResult::success(tool_call_id, output),
            Err(e) => {
                tracing::warn!(target: "parley.tools", tool = %name, error = %e, "tool execution failed");
                let text = e.to_string();
                let text = if text.trim().is_empty() {
                    format!("{} failed", name)
                } else {
                    text
                };
                ToolResult::error(tool_call_id, text)
            }
        }
    }
}

/// Parse a list of wire names, rejecting unknown ones
pub fn parse_tool_kinds<S: AsRef<str>>(names: &[S]) -> Result<Vec<ToolKind>> {
    names.iter().map(|n| n.as_ref().parse()).collect()
}
