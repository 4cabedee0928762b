// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for Parley
//!
//! Handles loading and saving settings from ~/.parley/settings.json

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

mod io;
mod validation;

/// Main settings structure, stored in ~/.parley/settings.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Chat request defaults for new sessions
    #[serde(default)]
    pub chat: ChatConfig,

    /// Remote endpoints (chat, threads, tools)
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Retry and fallback settings for chat requests
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Fallback model per provider, used after repeated failures
    #[serde(default = "default_fallback_models")]
    pub fallback_models: HashMap<String, String>,
}

/// Defaults applied to each chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Provider name forwarded to the chat endpoint (e.g. "openai", "anthropic", "google")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Primary model id
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens for response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// System prompt sent with every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Tools offered to the model (wire names)
    #[serde(default = "default_enabled_tools")]
    pub enabled_tools: Vec<String>,

    /// Opaque middleware configuration forwarded to the chat endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub middleware: Option<serde_json::Value>,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Base URL for the chat, thread and tool routes
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key (if stored directly, not recommended)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable name for the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout for establishing a connection, in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Timeout for non-streaming requests (threads, tools), in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Retry and fallback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResilienceConfig {
    /// Automatic retries before escalating to the fallback model
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds; retry n waits `retry_delay_ms * n`
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Delay before the single fallback attempt, in milliseconds
    #[serde(default = "default_fallback_delay_ms")]
    pub fallback_delay_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chat: ChatConfig::default(),
            endpoints: EndpointsConfig::default(),
            resilience: ResilienceConfig::default(),
            fallback_models: default_fallback_models(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            system_prompt: None,
            enabled_tools: default_enabled_tools(),
            middleware: None,
        }
    }
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            api_key_env: default_api_key_env(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            fallback_delay_ms: default_fallback_delay_ms(),
        }
    }
}

impl Settings {
    /// Look up the fallback model configured for a provider.
    pub fn fallback_model_for(&self, provider: &str) -> Option<&str> {
        self.fallback_models
            .get(&provider.to_lowercase())
            .map(String::as_str)
            .filter(|m| !m.is_empty())
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_enabled_tools() -> Vec<String> {
    vec!["web_search".to_string(), "weather".to_string()]
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_api_key_env() -> String {
    "PARLEY_API_KEY".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_fallback_delay_ms() -> u64 {
    1000
}

fn default_fallback_models() -> HashMap<String, String> {
    HashMap::from([
        ("google".to_string(), "gemini-2.0-flash".to_string()),
        ("openai".to_string(), "gpt-4o-mini".to_string()),
        ("anthropic".to_string(), "claude-3-haiku".to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.chat.provider, "openai");
        assert_eq!(settings.resilience.max_retries, 3);
        assert_eq!(settings.resilience.retry_delay_ms, 1000);
        assert_eq!(settings.resilience.fallback_delay_ms, 1000);
    }

    #[test]
    fn test_empty_json_matches_default() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.fallback_models, Settings::default().fallback_models);
        assert_eq!(settings.chat.model, "gpt-4o");
    }

    #[test]
    fn test_fallback_model_for_known_providers() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.fallback_model_for("google"), Some("gemini-2.0-flash"));
        assert_eq!(settings.fallback_model_for("openai"), Some("gpt-4o-mini"));
        assert_eq!(settings.fallback_model_for("Anthropic"), Some("claude-3-haiku"));
        assert_eq!(settings.fallback_model_for("mistral"), None);
    }

    #[test]
    fn test_partial_json_uses_field_defaults() {
        let json = r#"{"chat": {"model": "gemini-1.5-pro", "provider": "google"}}"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.chat.model, "gemini-1.5-pro");
        assert!((settings.chat.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(settings.chat.max_tokens, 4096);
        assert_eq!(settings.endpoints.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_resilience_roundtrip_preserves_values() {
        let config = ResilienceConfig {
            max_retries: 5,
            retry_delay_ms: 250,
            fallback_delay_ms: 500,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ResilienceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_retries, 5);
        assert_eq!(back.retry_delay_ms, 250);
        assert_eq!(back.fallback_delay_ms, 500);
    }
}
