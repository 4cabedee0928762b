// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Thread store backed by the `/threads` REST API

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{ParleyError, Result};
use crate::llm::http::join_url;
use crate::llm::message::{Message, Role};
use crate::threads::store::{sort_recent_first, Thread, ThreadStore};

/// Remote thread store
pub struct HttpThreadStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// `GET /threads` answers either a bare array or `{threads: [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum ThreadList {
    Bare(Vec<Thread>),
    Wrapped { threads: Vec<Thread> },
}

/// Single-thread responses may be wrapped in `{thread: {...}}`
#[derive(Deserialize)]
#[serde(untagged)]
enum ThreadEnvelope {
    Wrapped { thread: Thread },
    Bare(Thread),
}

#[derive(Deserialize)]
struct ThreadWithMessages {
    #[serde(default)]
    messages: Vec<StoredMessage>,
}

/// Stored messages may predate ids and timestamps
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredMessage {
    #[serde(default)]
    id: Option<String>,
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    tool_call_id: Option<String>,
}

impl From<StoredMessage> for Message {
    fn from(stored: StoredMessage) -> Self {
        Message {
            id: stored.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            role: stored.role,
            content: stored.content,
            created_at: stored.created_at.unwrap_or_else(Utc::now),
            tool_calls: Vec::new(),
            tool_call_id: stored.tool_call_id,
        }
    }
}

impl HttpThreadStore {
    /// Create a store against `base_url`
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Build a store from settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(settings.endpoints.connect_timeout_secs))
            .timeout(Duration::from_secs(settings.endpoints.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: settings.endpoints.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key(),
        })
    }

    /// Set the bearer token
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = join_url(&self.base_url, path);
        tracing::debug!(target: "parley.threads", %method, %url, "thread store request");
        let req = self.client.request(method, url);
        match self.api_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder, action: &str) -> Result<Response> {
        let response = req
            .send()
            .await
            .map_err(|e| ParleyError::Thread(format!("{} failed: {}", action, e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}", status));
            return Err(ParleyError::Thread(format!("{} failed: {}", action, detail)));
        }
        Ok(response)
    }

    async fn json<T: DeserializeOwned>(&self, req: RequestBuilder, action: &str) -> Result<T> {
        let response = self.send(req, action).await?;
        let text = response
            .text()
            .await
            .map_err(|e| ParleyError::Thread(format!("{} failed: {}", action, e)))?;
        serde_json::from_str(&text)
            .map_err(|e| ParleyError::Thread(format!("{} returned invalid JSON: {}", action, e)))
    }
}

#[async_trait]
impl ThreadStore for HttpThreadStore {
    async fn list(&self) -> Result<Vec<Thread>> {
        let list: ThreadList = self
            .json(self.request(Method::GET, "/threads"), "list threads")
            .await?;
        let mut threads = match list {
            ThreadList::Bare(threads) | ThreadList::Wrapped { threads } => threads,
        };
        sort_recent_first(&mut threads);
        Ok(threads)
    }

    async fn create(&self, name: &str) -> Result<Thread> {
        let req = self
            .request(Method::POST, "/threads")
            .json(&serde_json::json!({ "name": name }));
        let envelope: ThreadEnvelope = self.json(req, "create thread").await?;
        Ok(envelope.into_thread())
    }

    async fn rename(&self, id: &str, name: &str) -> Result<Thread> {
        let req = self
            .request(Method::PATCH, &format!("/threads/{}", id))
            .json(&serde_json::json!({ "name": name }));
        let envelope: ThreadEnvelope = self.json(req, "rename thread").await?;
        Ok(envelope.into_thread())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.send(
            self.request(Method::DELETE, &format!("/threads/{}", id)),
            "delete thread",
        )
        .await?;
        Ok(())
    }

    async fn get_messages(&self, id: &str) -> Result<Vec<Message>> {
        let req = self
            .request(Method::GET, &format!("/threads/{}", id))
            .query(&[("messages", "true")]);
        let thread: ThreadWithMessages = self.json(req, "load thread").await?;
        Ok(thread.messages.into_iter().map(Message::from).collect())
    }
}

impl ThreadEnvelope {
    fn into_thread(self) -> Thread {
        match self {
            ThreadEnvelope::Wrapped { thread } | ThreadEnvelope::Bare(thread) => thread,
        }
    }
}
