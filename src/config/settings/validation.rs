// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{ParleyError, Result};
use crate::tools::ToolKind;

use super::Settings;

impl Settings {
    /// Check that the settings can drive a chat session.
    pub fn validate(&self) -> Result<()> {
        if self.chat.model.trim().is_empty() {
            return Err(ParleyError::Config("chat.model must not be empty".into()));
        }
        if self.chat.provider.trim().is_empty() {
            return Err(ParleyError::Config("chat.provider must not be empty".into()));
        }
        if !(0.0..=2.0).contains(&self.chat.temperature) {
            return Err(ParleyError::Config(format!(
                "chat.temperature must be between 0.0 and 2.0, got {}",
                self.chat.temperature
            )));
        }
        if self.chat.max_tokens == 0 {
            return Err(ParleyError::Config(
                "chat.max_tokens must be greater than zero".into(),
            ));
        }
        for name in &self.chat.enabled_tools {
            if name.parse::<ToolKind>().is_err() {
                return Err(ParleyError::Config(format!("unknown tool: {}", name)));
            }
        }
        if self.endpoints.base_url.trim().is_empty() {
            return Err(ParleyError::Config(
                "endpoints.base_url must not be empty".into(),
            ));
        }
        Ok(())
    }
}
