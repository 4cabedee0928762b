// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool definition helpers
//!
//! Builds the JSON-schema-like parameter specs sent with each chat request.

use serde_json::Value;

use crate::llm::transport::ToolInputSchema;

/// Helper to create a tool input schema
#[derive(Default)]
pub struct SchemaBuilder {
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a string property
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "string", "description": description }),
            required,
        )
    }

    /// Add a string property restricted to `choices`
    pub fn string_enum(
        self,
        name: &str,
        description: &str,
        choices: &[&str],
        required: bool,
    ) -> Self {
        self.property(
            name,
            serde_json::json!({
                "type": "string",
                "description": description,
                "enum": choices,
            }),
            required,
        )
    }

    /// Add a boolean property
    pub fn boolean(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "boolean", "description": description }),
            required,
        )
    }

    fn property(mut self, name: &str, spec: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), spec);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Build the schema
    pub fn build(self) -> ToolInputSchema {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: Value::Object(self.properties),
            required: self.required,
        }
    }
}

/// Read a required string argument
pub fn required_str<'a>(args: &'a Value, name: &str) -> crate::error::Result<&'a str> {
    args[name]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| crate::error::ParleyError::ToolExecution(format!("{} is required", name)))
}
