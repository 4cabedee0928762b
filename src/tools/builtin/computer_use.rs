// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Computer-use tool
//!
//! Delegates a task to the remote computer-use agent.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::transport::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolEndpoint, ToolKind};

/// Tool for running a task on a remote computer-use agent
pub struct ComputerUseTool {
    endpoint: Arc<ToolEndpoint>,
}

#[derive(Debug, Deserialize)]
struct ComputerUseResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    steps: Vec<Value>,
}

impl ComputerUseTool {
    pub fn new(endpoint: Arc<ToolEndpoint>) -> Self {
        Self { endpoint }
    }
}

fn step_text(step: &Value) -> String {
    match step {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("description")
            .or_else(|| map.get("action"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| step.to_string()),
        other => other.to_string(),
    }
}

fn format_response(response: &ComputerUseResponse, show_steps: bool) -> String {
    let mut out = response
        .result
        .clone()
        .unwrap_or_else(|| "Task finished without a result".to_string());

    if show_steps && !response.steps.is_empty() {
        out.push_str("\n\nSteps:");
        for (i, step) in response.steps.iter().enumerate() {
            out.push_str(&format!("\n{}. {}", i + 1, step_text(step)));
        }
    }
    out
}

#[async_trait]
impl Tool for ComputerUseTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ComputerUse
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolKind::ComputerUse.to_string(),
            description: "Carry out a task in a sandboxed desktop (browse, click, type) and report the outcome."
                .to_string(),
            parameters: SchemaBuilder::new()
                .string("task", "What to do", true)
                .boolean("showSteps", "Include the individual steps taken", false)
                .build(),
        }
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let task = required_str(&args, "task")?;
        let show_steps = args["showSteps"].as_bool().unwrap_or(false);

        let payload = self
            .endpoint
            .post(
                "computer-use",
                serde_json::json!({ "task": task, "showSteps": show_steps }),
            )
            .await?;
        let response: ComputerUseResponse = serde_json::from_value(payload)?;
        Ok(format_response(&response, show_steps))
    }
}
