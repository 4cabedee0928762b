// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Thread metadata and the store trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::llm::message::Message;

/// A saved conversation thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Thread id, assigned by the store
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Last time the thread changed
    pub updated_at: DateTime<Utc>,
    /// When the thread was created
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Thread {
    /// Create a thread stamped with the current time
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            updated_at: now,
            created_at: Some(now),
        }
    }

    /// Name for display, falling back to the id for unnamed threads
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// Sort threads most recently updated first
pub fn sort_recent_first(threads: &mut [Thread]) {
    threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Persistence for thread metadata and history
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// All threads, most recently updated first
    async fn list(&self) -> Result<Vec<Thread>>;

    /// Create a thread with the given name
    async fn create(&self, name: &str) -> Result<Thread>;

    /// Rename a thread
    async fn rename(&self, id: &str, name: &str) -> Result<Thread>;

    /// Delete a thread
    async fn delete(&self, id: &str) -> Result<()>;

    /// Full message history of a thread
    async fn get_messages(&self, id: &str) -> Result<Vec<Message>>;
}
