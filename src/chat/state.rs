// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session state and its transitions
//!
//! Every change to a session goes through [`SessionState::apply`]. Status,
//! model selection, recovery mode and connection state are separate enums,
//! so a session cannot be "on the fallback model" without a model id.

use crate::error::{ErrorClass, ParleyError, Result};
use crate::llm::message::{Conversation, Message, ToolCall};
use crate::llm::transport::ToolCallRequest;
use crate::tools::ToolResult;

/// Request lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    /// Request sent, nothing received yet
    Submitted,
    /// Response is streaming in
    Streaming,
    /// Last attempt failed
    Error,
}

impl SessionStatus {
    /// A request is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionStatus::Submitted | SessionStatus::Streaming)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Submitted => "submitted",
            SessionStatus::Streaming => "streaming",
            SessionStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Which model requests go to
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ModelSelection {
    #[default]
    Primary,
    Fallback { model_id: String },
}

/// Automatic recovery in progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryMode {
    #[default]
    None,
    Retry,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connected,
    Interrupted,
}

/// An error shown to the user, with the actions the error card offers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfacedError {
    pub message: String,
    pub class: ErrorClass,
    /// "Retry" can resend the last request
    pub retry_available: bool,
    /// "Use Fallback Model" is possible
    pub fallback_available: bool,
}

impl SurfacedError {
    pub fn new(error: &ParleyError, retry_available: bool, fallback_available: bool) -> Self {
        Self {
            message: error.to_string(),
            class: ErrorClass::classify(error),
            retry_available,
            fallback_available,
        }
    }
}

/// Transitions of a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A request went out. `Some` carries the new user message.
    Submitted(Option<Message>),
    /// A chunk of assistant text arrived
    Token(String),
    /// The model asked for a tool
    ToolCallRequested(ToolCallRequest),
    /// A tool finished
    ToolResolved(ToolResult),
    /// The endpoint announced the thread this session belongs to
    ThreadAnnounced(String),
    /// The exchange finished normally
    Completed,
    /// An attempt failed and recovery is about to start
    AttemptFailed,
    /// A same-model retry is scheduled
    RetryScheduled { retries: u32 },
    /// The stream dropped; a reconnect is scheduled
    ConnectionInterrupted { retries: u32 },
    /// Connection considered restored
    Reconnected,
    /// Requests now go to the fallback model
    FallbackSelected { model_id: String, retries: u32 },
    /// Back to the primary model for a fresh exchange
    PrimaryRestored,
    /// Recovery gave up, or the error is not recoverable
    Failed { error: SurfacedError, retries: u32 },
    /// The user stopped the exchange
    Stopped,
    /// History cut back to `len` messages before a resend
    Rewound { len: usize },
}

/// Everything the UI needs to render a session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub conversation: Conversation,
    /// Draft input
    pub input: String,
    pub status: SessionStatus,
    pub current_thread_id: Option<String>,
    pub model: ModelSelection,
    pub connection_retries: u32,
    pub recovery: RecoveryMode,
    pub connection: ConnectionState,
    pub error: Option<SurfacedError>,
    /// Set after a successful fallback completion; the next submit returns
    /// to the primary model.
    pub fallback_pending_reset: bool,
    /// Assistant message receiving tokens in the current turn
    streaming_message: Option<String>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// State for a loaded thread
    pub fn for_thread(thread_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            conversation: Conversation::from_messages(messages),
            current_thread_id: Some(thread_id.into()),
            ..Self::default()
        }
    }

    pub fn is_using_fallback_model(&self) -> bool {
        matches!(self.model, ModelSelection::Fallback { .. })
    }

    /// Model id requests currently go to
    pub fn model_id<'a>(&'a self, primary: &'a str) -> &'a str {
        match &self.model {
            ModelSelection::Primary => primary,
            ModelSelection::Fallback { model_id } => model_id,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.conversation.messages
    }

    /// The assistant message being streamed, if any
    pub fn streaming_message(&self) -> Option<&Message> {
        let id = self.streaming_message.as_deref()?;
        self.conversation.messages.iter().rev().find(|m| m.id == id)
    }

    /// Find a tool call anywhere in the history, newest first
    pub fn tool_call(&self, id: &str) -> Option<&ToolCall> {
        self.conversation
            .messages
            .iter()
            .rev()
            .find_map(|m| m.tool_calls.iter().find(|c| c.id == id))
    }

    /// Apply a transition.
    ///
    /// Only tool resolution can fail: resolving an unknown or already
    /// resolved call leaves the state untouched.
    pub fn apply(&mut self, event: SessionEvent) -> Result<()> {
        match event {
            SessionEvent::Submitted(message) => {
                if let Some(message) = message {
                    self.conversation.push(message);
                    self.input.clear();
                    self.recovery = RecoveryMode::None;
                    self.connection_retries = 0;
                }
                self.error = None;
                self.status = SessionStatus::Submitted;
                self.streaming_message = None;
            }
            SessionEvent::Token(chunk) => {
                self.assistant_message().content.push_str(&chunk);
                self.mark_streaming();
            }
            SessionEvent::ToolCallRequested(request) => {
                let call = ToolCall::pending(request.tool_call_id, request.tool_name, request.args);
                self.assistant_message().tool_calls.push(call);
                self.mark_streaming();
            }
            SessionEvent::ToolResolved(result) => {
                let call = self.tool_call_mut(&result.tool_call_id).ok_or_else(|| {
                    ParleyError::InvalidInput(format!(
                        "no tool call with id {}",
                        result.tool_call_id
                    ))
                })?;
                if result.is_error() {
                    call.fail(result.output_text())?;
                } else {
                    call.complete(result.output_text())?;
                }
                self.conversation
                    .push(Message::tool_result(result.tool_call_id.clone(), result.output_text()));
            }
            SessionEvent::ThreadAnnounced(id) => {
                if self.current_thread_id.is_none() {
                    self.current_thread_id = Some(id);
                }
            }
            SessionEvent::Completed => {
                self.status = SessionStatus::Idle;
                self.connection_retries = 0;
                self.recovery = RecoveryMode::None;
                self.connection = ConnectionState::Connected;
                self.streaming_message = None;
                if self.is_using_fallback_model() {
                    self.fallback_pending_reset = true;
                }
            }
            SessionEvent::AttemptFailed => {
                self.status = SessionStatus::Error;
                self.streaming_message = None;
            }
            SessionEvent::RetryScheduled { retries } => {
                self.connection_retries = retries;
                self.recovery = RecoveryMode::Retry;
            }
            SessionEvent::ConnectionInterrupted { retries } => {
                self.connection_retries = retries;
                self.recovery = RecoveryMode::Retry;
                self.connection = ConnectionState::Interrupted;
            }
            SessionEvent::Reconnected => {
                self.connection = ConnectionState::Connected;
            }
            SessionEvent::FallbackSelected { model_id, retries } => {
                self.model = ModelSelection::Fallback { model_id };
                self.recovery = RecoveryMode::Fallback;
                self.connection_retries = retries;
                self.fallback_pending_reset = false;
            }
            SessionEvent::PrimaryRestored => {
                self.model = ModelSelection::Primary;
                self.fallback_pending_reset = false;
                self.recovery = RecoveryMode::None;
                self.connection_retries = 0;
            }
            SessionEvent::Failed { error, retries } => {
                self.status = SessionStatus::Error;
                self.connection_retries = retries;
                self.streaming_message = None;
                self.error = Some(error);
            }
            SessionEvent::Stopped => {
                self.status = SessionStatus::Idle;
                self.streaming_message = None;
            }
            SessionEvent::Rewound { len } => {
                self.conversation.truncate(len);
                self.streaming_message = None;
            }
        }
        Ok(())
    }

    fn mark_streaming(&mut self) {
        if self.status == SessionStatus::Submitted {
            self.status = SessionStatus::Streaming;
        }
    }

    /// The in-progress assistant message, created on first use
    fn assistant_message(&mut self) -> &mut Message {
        let index = self
            .streaming_message
            .as_deref()
            .and_then(|id| self.conversation.messages.iter().rposition(|m| m.id == id));

        let index = match index {
            Some(index) => index,
            None => {
                let message = Message::assistant("");
                self.streaming_message = Some(message.id.clone());
                self.conversation.push(message);
                self.conversation.len() - 1
            }
        };
        &mut self.conversation.messages[index]
    }

    fn tool_call_mut(&mut self, id: &str) -> Option<&mut ToolCall> {
        self.conversation
            .messages
            .iter_mut()
            .rev()
            .find_map(|m| m.tool_call_mut(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::{Role, ToolCallStatus};

    fn tool_request(id: &str, name: &str) -> ToolCallRequest {
        ToolCallRequest {
            tool_call_id: id.to_string(),
            tool_name: name.to_string(),
            args: serde_json::json!({}),
        }
    }

    #[test]
    fn test_submit_then_tokens() {
        let mut state = SessionState::new();
        state.input = "draft".to_string();
        state.apply(SessionEvent::Submitted(Some(Message::user("Hi")))).unwrap();
        assert_eq!(state.status, SessionStatus::Submitted);
        assert!(state.input.is_empty());

        state.apply(SessionEvent::Token("Hel".into())).unwrap();
        assert_eq!(state.status, SessionStatus::Streaming);
        state.apply(SessionEvent::Token("lo".into())).unwrap();

        assert_eq!(state.messages().len(), 2);
        let last = state.messages().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "Hello");
        assert_eq!(state.streaming_message().unwrap().content, "Hello");
    }

    #[test]
    fn test_completion_resets_recovery() {
        let mut state = SessionState::new();
        state.apply(SessionEvent::Submitted(None)).unwrap();
        state.apply(SessionEvent::AttemptFailed).unwrap();
        state.apply(SessionEvent::ConnectionInterrupted { retries: 2 }).unwrap();
        assert_eq!(state.connection, ConnectionState::Interrupted);
        assert_eq!(state.status, SessionStatus::Error);

        state.apply(SessionEvent::Submitted(None)).unwrap();
        state.apply(SessionEvent::Completed).unwrap();
        assert_eq!(state.status, SessionStatus::Idle);
        assert_eq!(state.connection_retries, 0);
        assert_eq!(state.recovery, RecoveryMode::None);
        assert_eq!(state.connection, ConnectionState::Connected);
        assert!(!state.fallback_pending_reset);
    }

    #[test]
    fn test_fallback_completion_marks_pending_reset() {
        let mut state = SessionState::new();
        state
            .apply(SessionEvent::FallbackSelected {
                model_id: "gpt-4o-mini".into(),
                retries: 3,
            })
            .unwrap();
        assert!(state.is_using_fallback_model());
        assert_eq!(state.model_id("gpt-4o"), "gpt-4o-mini");
        assert_eq!(state.recovery, RecoveryMode::Fallback);

        state.apply(SessionEvent::Completed).unwrap();
        assert!(state.fallback_pending_reset);
        assert!(state.is_using_fallback_model());

        state.apply(SessionEvent::PrimaryRestored).unwrap();
        assert!(!state.is_using_fallback_model());
        assert!(!state.fallback_pending_reset);
        assert_eq!(state.model_id("gpt-4o"), "gpt-4o");
    }

    #[test]
    fn test_tool_resolution_is_exactly_once() {
        let mut state = SessionState::new();
        state.apply(SessionEvent::Submitted(None)).unwrap();
        state
            .apply(SessionEvent::ToolCallRequested(tool_request("c1", "weather")))
            .unwrap();

        state
            .apply(SessionEvent::ToolResolved(ToolResult::success("c1", "sunny")))
            .unwrap();
        let again = state.apply(SessionEvent::ToolResolved(ToolResult::error("c1", "late")));
        assert!(again.is_err());

        let assistant = &state.messages()[0];
        assert_eq!(assistant.tool_calls[0].status, ToolCallStatus::Completed);
        assert_eq!(assistant.tool_calls[0].result.as_deref(), Some("sunny"));
        let tool_messages: Vec<_> = state
            .messages()
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 1);
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_unknown_tool_result_is_rejected() {
        let mut state = SessionState::new();
        let result = state.apply(SessionEvent::ToolResolved(ToolResult::success("nope", "x")));
        assert!(result.is_err());
        assert!(state.messages().is_empty());
    }

    #[test]
    fn test_thread_adopted_once() {
        let mut state = SessionState::new();
        state.apply(SessionEvent::ThreadAnnounced("t1".into())).unwrap();
        state.apply(SessionEvent::ThreadAnnounced("t2".into())).unwrap();
        assert_eq!(state.current_thread_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_failed_fills_error_slot_and_submit_clears_it() {
        let mut state = SessionState::new();
        let err = ParleyError::InvalidInput("bad".into());
        state
            .apply(SessionEvent::Failed {
                error: SurfacedError::new(&err, true, false),
                retries: 3,
            })
            .unwrap();
        assert_eq!(state.status, SessionStatus::Error);
        assert_eq!(state.connection_retries, 3);
        assert_eq!(state.error.as_ref().unwrap().class, ErrorClass::Generic);

        state.apply(SessionEvent::Submitted(None)).unwrap();
        assert!(state.error.is_none());
    }

    #[test]
    fn test_new_user_turn_restores_retry_budget() {
        let mut state = SessionState::new();
        let err = ParleyError::InvalidInput("overloaded".into());
        state
            .apply(SessionEvent::Failed {
                error: SurfacedError::new(&err, true, false),
                retries: 3,
            })
            .unwrap();

        // A resend of the same turn keeps the spent budget
        state.apply(SessionEvent::Submitted(None)).unwrap();
        assert_eq!(state.connection_retries, 3);

        state.apply(SessionEvent::Submitted(Some(Message::user("again")))).unwrap();
        assert_eq!(state.connection_retries, 0);
    }

    #[test]
    fn test_stop_keeps_partial_message() {
        let mut state = SessionState::new();
        state.apply(SessionEvent::Submitted(Some(Message::user("Hi")))).unwrap();
        state.apply(SessionEvent::Token("Hel".into())).unwrap();
        state.apply(SessionEvent::Stopped).unwrap();

        assert_eq!(state.status, SessionStatus::Idle);
        assert_eq!(state.messages().last().unwrap().content, "Hel");
        assert!(state.streaming_message().is_none());
    }

    #[test]
    fn test_rewind_drops_partial_attempt() {
        let mut state = SessionState::new();
        state.apply(SessionEvent::Submitted(Some(Message::user("Hi")))).unwrap();
        state.apply(SessionEvent::Token("partial".into())).unwrap();
        state.apply(SessionEvent::Rewound { len: 1 }).unwrap();
        assert_eq!(state.messages().len(), 1);

        // The next token starts a fresh assistant message
        state.apply(SessionEvent::Submitted(None)).unwrap();
        state.apply(SessionEvent::Token("fresh".into())).unwrap();
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[1].content, "fresh");
    }

    #[test]
    fn test_status_is_busy() {
        assert!(SessionStatus::Submitted.is_busy());
        assert!(SessionStatus::Streaming.is_busy());
        assert!(!SessionStatus::Idle.is_busy());
        assert!(!SessionStatus::Error.is_busy());
        assert_eq!(SessionStatus::Streaming.to_string(), "streaming");
    }
}
