// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock chat transport for testing
//!
//! Provides a scripted implementation of the ChatTransport trait that can be
//! used in tests and offline demos without making real HTTP calls.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{ApiError, ParleyError, Result};
use crate::llm::transport::{
    ChatRequest, ChatResponse, ChatTransport, FinishReason, StreamEvent, ToolCallRequest,
};

/// A scripted transport for tests
#[derive(Clone, Default)]
pub struct MockTransport {
    /// Scripted replies, consumed in order (the last one repeats)
    replies: Arc<Mutex<Vec<MockReply>>>,
    /// Call counter
    call_count: Arc<AtomicUsize>,
    /// Recorded requests
    recorded_requests: Arc<Mutex<Vec<ChatRequest>>>,
}

/// One scripted reply
#[derive(Clone, Debug)]
pub enum MockReply {
    /// The request is accepted and the events are streamed
    Stream {
        thread_id: Option<String>,
        events: Vec<MockEvent>,
        /// Keep the stream open after the scripted events
        hang: bool,
    },
    /// The request itself fails
    Fail(MockFailure),
}

/// A scripted stream item
#[derive(Clone, Debug)]
pub enum MockEvent {
    Event(StreamEvent),
    /// The stream breaks with a network error
    Disconnect(String),
}

/// Failure modes for a rejected request
#[derive(Clone, Debug)]
pub enum MockFailure {
    ServerError { status: u16, message: String },
    Network(String),
    Timeout,
}

impl MockFailure {
    fn to_error(&self) -> ParleyError {
        match self {
            MockFailure::ServerError { status, message } => {
                ParleyError::Api(ApiError::ServerError {
                    status: *status,
                    message: message.clone(),
                })
            }
            MockFailure::Network(message) => ParleyError::Api(ApiError::Network(message.clone())),
            MockFailure::Timeout => ParleyError::Api(ApiError::Timeout),
        }
    }
}

impl MockReply {
    /// Stream the given text chunks, then finish
    pub fn tokens<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut events: Vec<MockEvent> = chunks
            .into_iter()
            .map(|c| MockEvent::Event(StreamEvent::Token(c.into())))
            .collect();
        events.push(MockEvent::Event(StreamEvent::Finish {
            reason: FinishReason::Stop,
        }));
        MockReply::Stream {
            thread_id: None,
            events,
            hang: false,
        }
    }

    /// Stream the given chunks and then stall until the stream is dropped
    pub fn tokens_then_hang<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MockReply::Stream {
            thread_id: None,
            events: chunks
                .into_iter()
                .map(|c| MockEvent::Event(StreamEvent::Token(c.into())))
                .collect(),
            hang: true,
        }
    }

    /// Request the given tool calls, then finish with `tool-calls`
    pub fn tool_calls(calls: Vec<(&str, &str, serde_json::Value)>) -> Self {
        let mut events: Vec<MockEvent> = calls
            .into_iter()
            .map(|(id, name, args)| {
                MockEvent::Event(StreamEvent::ToolCall(ToolCallRequest {
                    tool_call_id: id.to_string(),
                    tool_name: name.to_string(),
                    args,
                }))
            })
            .collect();
        events.push(MockEvent::Event(StreamEvent::Finish {
            reason: FinishReason::ToolCalls,
        }));
        MockReply::Stream {
            thread_id: None,
            events,
            hang: false,
        }
    }

    /// Reject the request with an HTTP error
    pub fn server_error(status: u16, message: impl Into<String>) -> Self {
        MockReply::Fail(MockFailure::ServerError {
            status,
            message: message.into(),
        })
    }

    /// Reject the request with a network error
    pub fn network_error(message: impl Into<String>) -> Self {
        MockReply::Fail(MockFailure::Network(message.into()))
    }

    /// Announce a thread id with this reply
    pub fn with_thread_id(self, id: impl Into<String>) -> Self {
        match self {
            MockReply::Stream { events, hang, .. } => MockReply::Stream {
                thread_id: Some(id.into()),
                events,
                hang,
            },
            other => other,
        }
    }
}

impl MockTransport {
    /// Create a transport that answers every request with "Mock response"
    pub fn new() -> Self {
        Self::with_replies(vec![MockReply::tokens(["Mock response"])])
    }

    /// Create a transport with scripted replies
    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies)),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Get the number of times send() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get all recorded requests
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        lock(&self.recorded_requests).clone()
    }

    /// Get the last request made
    pub fn last_request(&self) -> Option<ChatRequest> {
        lock(&self.recorded_requests).last().cloned()
    }

    fn next_reply(&self) -> MockReply {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        let replies = lock(&self.replies);
        if replies.is_empty() {
            MockReply::tokens(["Mock response"])
        } else {
            replies[count.min(replies.len() - 1)].clone()
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock transport lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResponse> {
        lock(&self.recorded_requests).push(request);

        match self.next_reply() {
            MockReply::Fail(failure) => Err(failure.to_error()),
            MockReply::Stream {
                thread_id,
                events,
                hang,
            } => {
                let items: Vec<Result<StreamEvent>> = events
                    .into_iter()
                    .map(|e| match e {
                        MockEvent::Event(event) => Ok(event),
                        MockEvent::Disconnect(message) => {
                            Err(ParleyError::Api(ApiError::Network(message)))
                        }
                    })
                    .collect();
                let scripted = stream::iter(items);
                let events = if hang {
                    scripted.chain(stream::pending()).boxed()
                } else {
                    scripted.boxed()
                };
                Ok(ChatResponse { thread_id, events })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::message::Message;

    fn request() -> ChatRequest {
        ChatRequest::new("mock-model", vec![Message::user("Hello")])
    }

    #[tokio::test]
    async fn test_mock_transport_default_reply() {
        let transport = MockTransport::new();
        let response = transport.send(request()).await.unwrap();
        let events: Vec<_> = response.events.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(
            *events[0].as_ref().unwrap(),
            StreamEvent::Token("Mock response".to_string())
        );
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_transport_replies_in_order_then_repeat_last() {
        let transport = MockTransport::with_replies(vec![
            MockReply::server_error(500, "model overloaded"),
            MockReply::tokens(["ok"]),
        ]);

        assert!(transport.send(request()).await.is_err());
        assert!(transport.send(request()).await.is_ok());
        assert!(transport.send(request()).await.is_ok());
        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_transport_thread_id() {
        let transport =
            MockTransport::with_replies(vec![MockReply::tokens(["hi"]).with_thread_id("t-42")]);
        let response = transport.send(request()).await.unwrap();
        assert_eq!(response.thread_id.as_deref(), Some("t-42"));
    }

    #[tokio::test]
    async fn test_mock_transport_disconnect_item() {
        let transport = MockTransport::with_replies(vec![MockReply::Stream {
            thread_id: None,
            events: vec![
                MockEvent::Event(StreamEvent::Token("a".to_string())),
                MockEvent::Disconnect("connection reset".to_string()),
            ],
            hang: false,
        }]);
        let response = transport.send(request()).await.unwrap();
        let events: Vec<_> = response.events.collect().await;
        assert!(events[0].is_ok());
        assert!(events[1].is_err());
    }

    #[tokio::test]
    async fn test_mock_transport_records_last_request() {
        let transport = MockTransport::new();
        transport
            .send(ChatRequest::new("fallback-model", vec![]))
            .await
            .unwrap();
        assert_eq!(transport.last_request().unwrap().model, "fallback-model");
    }
}
