// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Weather lookup tool
//!
//! Unlike the other tools, a failed lookup still produces a reading: the
//! fixed fallback below, annotated with what went wrong.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::llm::transport::ToolDefinition;
use crate::tools::{required_str, SchemaBuilder, Tool, ToolEndpoint, ToolKind};

const FALLBACK_READING: &str = "72°F, Partly cloudy";

/// Tool for current weather conditions
pub struct WeatherTool {
    endpoint: Arc<ToolEndpoint>,
}

#[derive(Debug, Deserialize)]
struct WeatherReport {
    temperature: Value,
    #[serde(default = "default_unit")]
    unit: String,
    #[serde(default)]
    conditions: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

fn default_unit() -> String {
    "F".to_string()
}

impl WeatherTool {
    pub fn new(endpoint: Arc<ToolEndpoint>) -> Self {
        Self { endpoint }
    }

    async fn lookup(&self, location: &str) -> Result<String> {
        let payload = self
            .endpoint
            .post("weather", serde_json::json!({ "location": location }))
            .await?;
        let report: WeatherReport = serde_json::from_value(payload)?;
        Ok(format_report(location, &report))
    }
}

fn format_report(requested: &str, report: &WeatherReport) -> String {
    let temperature = match &report.temperature {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let place = report.location.as_deref().unwrap_or(requested);
    match report.conditions.as_deref() {
        Some(conditions) => format!(
            "Weather in {}: {}°{}, {}",
            place, temperature, report.unit, conditions
        ),
        None => format!("Weather in {}: {}°{}", place, temperature, report.unit),
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Weather
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: ToolKind::Weather.to_string(),
            description: "Get the current weather for a location.".to_string(),
            parameters: SchemaBuilder::new()
                .string("location", "City or place name, e.g. 'Boston, MA'", true)
                .build(),
        }
    }

    async fn execute(&self, args: Value) -> Result<String> {
        let location = required_str(&args, "location")?;

        match self.lookup(location).await {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(target: "parley.tools", %location, error = %e, "weather lookup failed, using fallback reading");
                Ok(format!(
                    "Weather in {}: {} (fallback reading; live data unavailable: {})",
                    location, FALLBACK_READING, e
                ))
            }
        }
    }
}
