// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-memory thread store for offline use and tests

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::{ParleyError, Result};
use crate::llm::message::Message;
use crate::threads::store::{sort_recent_first, Thread, ThreadStore};

#[derive(Default)]
struct Inner {
    threads: Vec<Thread>,
    messages: HashMap<String, Vec<Message>>,
}

/// Thread store that keeps everything in process memory
#[derive(Clone, Default)]
pub struct MemoryThreadStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a thread together with its history
    pub fn insert(&self, thread: Thread, messages: Vec<Message>) {
        let mut inner = self.lock();
        inner.messages.insert(thread.id.clone(), messages);
        inner.threads.retain(|t| t.id != thread.id);
        inner.threads.push(thread);
    }

    /// Number of stored threads
    pub fn len(&self) -> usize {
        self.lock().threads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!(target: "parley.threads", "Thread store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn not_found(id: &str) -> ParleyError {
    ParleyError::Thread(format!("thread not found: {}", id))
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn list(&self) -> Result<Vec<Thread>> {
        let mut threads = self.lock().threads.clone();
        sort_recent_first(&mut threads);
        Ok(threads)
    }

    async fn create(&self, name: &str) -> Result<Thread> {
        let thread = Thread::new(Uuid::new_v4().to_string(), name);
        self.insert(thread.clone(), Vec::new());
        Ok(thread)
    }

    async fn rename(&self, id: &str, name: &str) -> Result<Thread> {
        let mut inner = self.lock();
        let thread = inner
            .threads
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| not_found(id))?;
        thread.name = name.to_string();
        thread.updated_at = Utc::now();
        Ok(thread.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.threads.len();
        inner.threads.retain(|t| t.id != id);
        if inner.threads.len() == before {
            return Err(not_found(id));
        }
        inner.messages.remove(id);
        Ok(())
    }

    async fn get_messages(&self, id: &str) -> Result<Vec<Message>> {
        self.lock()
            .messages
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_rename_delete() {
        let store = MemoryThreadStore::new();
        let thread = store.create("Draft").await.unwrap();
        assert_eq!(store.len(), 1);

        let renamed = store.rename(&thread.id, "Final").await.unwrap();
        assert_eq!(renamed.name, "Final");
        assert!(renamed.updated_at >= thread.updated_at);

        store.delete(&thread.id).await.unwrap();
        assert!(store.is_empty());
        assert!(store.delete(&thread.id).await.is_err());
    }

    #[tokio::test]
    async fn test_get_messages() {
        let store = MemoryThreadStore::new();
        store.insert(
            Thread::new("t1", "Seeded"),
            vec![Message::user("hi"), Message::assistant("hello")],
        );
        let messages = store.get_messages("t1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "hello");
        assert!(store.get_messages("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_rename_missing_thread() {
        let store = MemoryThreadStore::new();
        let err = store.rename("nope", "x").await.unwrap_err();
        assert!(err.to_string().contains("thread not found: nope"));
    }
}
