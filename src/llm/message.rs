// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Message types for chat sessions
//!
//! Defines the conversation turns exchanged with the chat endpoint and the
//! tool calls the model requests along the way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ParleyError, Result};

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Opaque identifier for the message
    pub id: String,

    /// Role of the message sender
    pub role: Role,

    /// Text content of the message
    pub content: String,

    /// When the message was created
    pub created_at: DateTime<Utc>,

    /// Tool calls requested by the assistant in this turn
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Tool call this message answers (tool role only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Role of the message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant response
    Assistant,
    /// System prompt
    System,
    /// Tool output fed back to the model
    Tool,
}

/// Lifecycle of a tool call
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Completed,
    Error,
}

/// A model-requested tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Opaque id assigned by the model
    pub id: String,
    /// Tool name as requested by the model
    pub name: String,
    /// Structured arguments
    pub args: serde_json::Value,
    /// Current status
    pub status: ToolCallStatus,
    /// Result text once resolved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl ToolCall {
    /// Create a pending tool call
    pub fn pending(
        id: impl Into<String>,
        name: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            args,
            status: ToolCallStatus::Pending,
            result: None,
        }
    }

    /// Resolve the call successfully. Fails if already resolved.
    pub fn complete(&mut self, result: impl Into<String>) -> Result<()> {
        self.resolve(ToolCallStatus::Completed, result.into())
    }

    /// Resolve the call as failed. Fails if already resolved.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.resolve(ToolCallStatus::Error, error.into())
    }

    /// Whether the call is still awaiting its result
    pub fn is_pending(&self) -> bool {
        self.status == ToolCallStatus::Pending
    }

    fn resolve(&mut self, status: ToolCallStatus, text: String) -> Result<()> {
        if !self.is_pending() {
            return Err(ParleyError::InvalidInput(format!(
                "tool call {} already resolved",
                self.id
            )));
        }
        self.status = status;
        self.result = Some(text);
        Ok(())
    }
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a tool result message answering `tool_call_id`
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::with_role(Role::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    /// Check if message has any tool calls
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Find a tool call on this message by id
    pub fn tool_call_mut(&mut self, id: &str) -> Option<&mut ToolCall> {
        self.tool_calls.iter_mut().find(|c| c.id == id)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// Append-only conversation history
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    /// All messages in the conversation
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation from loaded messages
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    /// Add a message to the conversation
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get the last message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Get the last message mutably
    pub fn last_mut(&mut self) -> Option<&mut Message> {
        self.messages.last_mut()
    }

    /// Get the last assistant message
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
    }

    /// Find a message by id
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Drop everything after the first `len` messages
    pub fn truncate(&mut self, len: usize) {
        self.messages.truncate(len);
    }

    /// Check if the conversation is empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Clear all messages
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.tool_call_id.is_none());
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn test_message_ids_are_unique() {
        assert_ne!(Message::user("a").id, Message::user("a").id);
    }

    #[test]
    fn test_tool_result_message() {
        let msg = Message::tool_result("call_1", "72°F");
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert_eq!(Role::System.to_string(), "system");
        assert_eq!(Role::Tool.to_string(), "tool");
    }

    #[test]
    fn test_tool_call_resolves_once() {
        let mut call = ToolCall::pending("c1", "weather", serde_json::json!({"location": "Boston"}));
        assert!(call.is_pending());

        call.complete("sunny").unwrap();
        assert_eq!(call.status, ToolCallStatus::Completed);
        assert_eq!(call.result.as_deref(), Some("sunny"));

        assert!(call.fail("late failure").is_err());
        assert_eq!(call.status, ToolCallStatus::Completed);
        assert_eq!(call.result.as_deref(), Some("sunny"));
    }

    #[test]
    fn test_tool_call_fail() {
        let mut call = ToolCall::pending("c1", "weather", serde_json::json!({}));
        call.fail("boom").unwrap();
        assert_eq!(call.status, ToolCallStatus::Error);
        assert!(call.complete("ok").is_err());
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let msg = Message::tool_result("call_9", "done");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["toolCallId"], "call_9");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("toolCalls").is_none());
    }

    #[test]
    fn test_message_deserializes_without_optional_fields() {
        let json = r#"{"id":"m1","role":"assistant","content":"hi","createdAt":"2025-01-01T00:00:00Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.role, Role::Assistant);
        assert!(msg.tool_calls.is_empty());
    }

    #[test]
    fn test_conversation_truncate_and_last_assistant() {
        let mut conv = Conversation::new();
        conv.push(Message::user("Hello"));
        conv.push(Message::assistant("Hi"));
        conv.push(Message::user("How are you?"));

        assert_eq!(conv.last_assistant().unwrap().content, "Hi");
        conv.truncate(1);
        assert_eq!(conv.len(), 1);
        assert!(conv.last_assistant().is_none());
    }

    #[test]
    fn test_conversation_get_mut() {
        let mut conv = Conversation::new();
        let msg = Message::assistant("");
        let id = msg.id.clone();
        conv.push(msg);

        conv.get_mut(&id).unwrap().content.push_str("Hel");
        assert_eq!(conv.last().unwrap().content, "Hel");
        assert!(conv.get_mut("missing").is_none());
    }
}
