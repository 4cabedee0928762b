// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming response handling
//!
//! Keeps the bookkeeping for one streamed turn (text so far, requested tool
//! calls, finish reason) separate from the I/O that drives it.

use crate::llm::transport::{FinishReason, StreamEvent, ToolCallRequest};

/// Accumulator for one streamed turn
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    tool_calls: Vec<ToolCallRequest>,
    finish_reason: Option<FinishReason>,
    stats: StreamStats,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text received so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Tool calls requested so far, in arrival order
    pub fn tool_calls(&self) -> &[ToolCallRequest] {
        &self.tool_calls
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    /// Process a stream event and report what the session should do with it
    pub fn process_event(&mut self, event: StreamEvent) -> StreamEventResult {
        let result = match event {
            StreamEvent::Token(text) => {
                self.text.push_str(&text);
                StreamEventResult::TextDelta(text)
            }
            StreamEvent::ToolCall(call) => {
                self.tool_calls.push(call.clone());
                StreamEventResult::ToolCall(call)
            }
            StreamEvent::Finish { reason } => {
                self.finish_reason = Some(reason);
                StreamEventResult::Finished(reason)
            }
            StreamEvent::Error { message } => StreamEventResult::Error(message),
        };
        self.stats.update(&result);
        result
    }

    /// Consume the accumulator, returning the turn's tool calls
    pub fn into_tool_calls(self) -> Vec<ToolCallRequest> {
        self.tool_calls
    }
}

/// Result of processing a stream event
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEventResult {
    /// Text to append to the assistant message
    TextDelta(String),
    /// Tool invocation to record as pending
    ToolCall(ToolCallRequest),
    /// The turn ended
    Finished(FinishReason),
    /// The endpoint reported an error inside the stream
    Error(String),
}

impl StreamEventResult {
    /// Displayable text, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEventResult::TextDelta(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StreamEventResult::Error(_))
    }
}

/// Statistics about a streaming response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Total text characters received
    pub total_text_chars: usize,
    /// Number of text deltas received
    pub text_delta_count: usize,
    /// Number of tool calls requested
    pub tool_call_count: usize,
}

impl StreamStats {
    /// Update stats from a stream event result
    pub fn update(&mut self, result: &StreamEventResult) {
        match result {
            StreamEventResult::TextDelta(text) => {
                self.total_text_chars += text.chars().count();
                self.text_delta_count += 1;
            }
            StreamEventResult::ToolCall(_) => self.tool_call_count += 1,
            _ => {}
        }
    }
}
