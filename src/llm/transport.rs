// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat transport trait and related types
//!
//! Defines the abstraction the session controller uses to talk to the
//! streaming chat endpoint.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;
use crate::llm::message::Message;

/// Stream of events for one chat response.
///
/// Dropping the stream cancels the request; no further events are delivered.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// Main trait for chat transports
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Transport name used in logs
    fn name(&self) -> &str;

    /// Send the conversation and start streaming the response
    async fn send(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// Request body for the chat endpoint
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// Full conversation history
    pub messages: Vec<Message>,

    /// Model to use (primary or fallback)
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens in response
    pub max_tokens: u32,

    /// Provider the model belongs to
    pub provider: String,

    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Image attachments (URLs or data URIs)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Tools available for the model to use
    pub tools: Vec<ToolDefinition>,

    /// Opaque middleware configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middleware: Option<serde_json::Value>,

    /// Thread the conversation belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

/// Streaming response from the chat endpoint
pub struct ChatResponse {
    /// Thread id announced by the endpoint (for newly created threads)
    pub thread_id: Option<String>,

    /// Events in delivery order
    pub events: EventStream,
}

impl std::fmt::Debug for ChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatResponse")
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

/// Events from a streaming response
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A chunk of assistant text
    Token(String),

    /// The model requested a tool invocation
    ToolCall(ToolCallRequest),

    /// End of this response
    Finish { reason: FinishReason },

    /// Error reported inside the stream
    Error { message: String },
}

/// A tool invocation as it arrives on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    /// Tool call id
    pub tool_call_id: String,
    /// Tool name
    pub tool_name: String,
    /// Tool arguments
    #[serde(default)]
    pub args: serde_json::Value,
}

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    /// Natural end of message
    Stop,
    /// Hit max tokens
    Length,
    /// Wants tool results before continuing
    ToolCalls,
    /// Anything the endpoint reports that we don't model
    #[serde(other)]
    Other,
}

/// Tool definition sent to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name
    pub name: String,

    /// Tool description
    pub description: String,

    /// Parameter schema (JSON Schema)
    pub parameters: ToolInputSchema,
}

/// Input schema for a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    /// Schema type (always "object")
    #[serde(rename = "type")]
    pub schema_type: String,

    /// Property definitions
    pub properties: serde_json::Value,

    /// Required properties
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
}

impl ChatRequest {
    /// Create a new chat request with defaults
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
            provider: String::new(),
            system_prompt: None,
            images: vec![],
            tools: vec![],
            middleware: None,
            thread_id: None,
        }
    }

    /// Set the provider
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, system: Option<String>) -> Self {
        self.system_prompt = system;
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set tools
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    /// Set image attachments
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    /// Set middleware configuration
    pub fn with_middleware(mut self, middleware: Option<serde_json::Value>) -> Self {
        self.middleware = middleware;
        self
    }

    /// Set the thread id
    pub fn with_thread_id(mut self, thread_id: Option<String>) -> Self {
        self.thread_id = thread_id;
        self
    }
}
