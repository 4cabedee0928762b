// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! HTTP client shared by the built-in tool executors

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{ParleyError, Result};

/// Client for the `/tools/*` routes
#[derive(Debug, Clone)]
pub struct ToolEndpoint {
    client: Client,
    base_url: String,
}

impl ToolEndpoint {
    /// Create an endpoint client against `base_url`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build from settings, applying the request timeout
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.endpoints.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.endpoints.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.endpoints.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// POST `body` to `/tools/{route}` and return the JSON payload.
    ///
    /// A non-2xx status or an `{error}` body becomes a `ToolExecution` error.
    pub async fn post(&self, route: &str, body: Value) -> Result<Value> {
        let url = format!("{}/tools/{}", self.base_url, route);
        tracing::debug!(target: "parley.tools", %url, "calling tool endpoint");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ParleyError::ToolExecution(format!("{} request failed: {}", route, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ParleyError::ToolExecution(format!("{} response unreadable: {}", route, e)))?;
        let payload: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(error) = payload
            .as_ref()
            .and_then(|p| p.get("error"))
            .and_then(error_text)
        {
            return Err(ParleyError::ToolExecution(error));
        }

        if !status.is_success() {
            return Err(ParleyError::ToolExecution(format!(
                "{} returned HTTP {}",
                route,
                status.as_u16()
            )));
        }

        payload.ok_or_else(|| {
            ParleyError::ToolExecution(format!("{} returned invalid JSON", route))
        })
    }
}

fn error_text(error: &Value) -> Option<String> {
    match error {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
