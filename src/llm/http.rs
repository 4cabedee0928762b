// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! HTTP chat transport
//!
//! Posts the conversation to `{base_url}/api/chat` and decodes the streamed
//! data-stream body into [`StreamEvent`]s.

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::Settings;
use crate::error::{ApiError, ParleyError, Result};
use crate::llm::transport::{
    ChatRequest, ChatResponse, ChatTransport, FinishReason, StreamEvent,
};
use crate::llm::wire;

/// Response header carrying the id of a newly created thread
pub const THREAD_ID_HEADER: &str = "x-thread-id";

const CHAT_PATH: &str = "/api/chat";

/// Streaming transport for the chat endpoint
pub struct HttpChatTransport {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpChatTransport {
    /// Create a transport against `base_url`
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            client: Client::new(),
            url: join_url(base_url.as_ref(), CHAT_PATH),
            api_key: None,
        }
    }

    /// Build a transport from settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.endpoints.connect_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: join_url(&settings.endpoints.base_url, CHAT_PATH),
            api_key: settings.api_key(),
        })
    }

    /// Set the bearer token
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Endpoint URL requests are posted to
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat { error: String },
    Message { message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Turn a non-2xx response body into an [`ApiError`]
pub(crate) fn parse_error(status: u16, body: &str) -> ParleyError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Nested { error }) => error.message,
        Ok(ErrorBody::Flat { error }) => error,
        Ok(ErrorBody::Message { message }) => message,
        Err(_) if body.trim().is_empty() => format!("HTTP {}", status),
        Err(_) => body.trim().to_string(),
    };
    ParleyError::Api(ApiError::ServerError { status, message })
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Decode a streamed response body into session events.
///
/// Chunks are buffered as bytes and split on newlines before decoding. A
/// `Finish` is added when the body ends without one.
pub(crate) fn decode_body<S, B>(body: S) -> impl Stream<Item = Result<StreamEvent>> + Send
where
    S: Stream<Item = std::result::Result<B, reqwest::Error>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    async_stream::try_stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut finished = false;

        for await chunk_result in body {
            let chunk = chunk_result.map_err(|e| ParleyError::Api(ApiError::from(e)))?;
            buffer.extend_from_slice(chunk.as_ref());

            for line in wire::drain_lines(&mut buffer)? {
                if let Some(event) = wire::decode_line(&line)? {
                    if matches!(event, StreamEvent::Finish { .. }) {
                        finished = true;
                    }
                    yield event;
                }
            }
        }

        // Body may end without a trailing newline
        let tail = wire::decode_utf8(buffer)?;
        if let Some(event) = wire::decode_line(&tail)? {
            if matches!(event, StreamEvent::Finish { .. }) {
                finished = true;
            }
            yield event;
        }

        if !finished {
            yield StreamEvent::Finish { reason: FinishReason::Stop };
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    fn name(&self) -> &str {
        "http"
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResponse> {
        tracing::debug!(
            target: "parley.transport",
            url = %self.url,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "sending chat request"
        );

        let mut req = self.client.post(&self.url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req
            .send()
            .await
            .map_err(|e| ParleyError::Api(ApiError::from(e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(target: "parley.transport", status, "chat endpoint returned an error");
            return Err(parse_error(status, &body));
        }

        let thread_id = response
            .headers()
            .get(THREAD_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .filter(|v| !v.is_empty());

        let events = decode_body(response.bytes_stream());

        Ok(ChatResponse {
            thread_id,
            events: Box::pin(events),
        })
    }
}
