// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Thread store over HTTP and the controller's thread operations

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use parley::chat::{SessionController, SessionStatus};
use parley::config::Settings;
use parley::error::ParleyError;
use parley::llm::message::{Message, Role};
use parley::llm::mock_transport::{MockReply, MockTransport};
use parley::threads::{HttpThreadStore, MemoryThreadStore, Thread, ThreadStore};
use parley::tools::ToolRegistry;

#[tokio::test]
async fn test_list_sorts_most_recent_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/threads"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "threads": [
                {"id": "old", "name": "Old", "updatedAt": "2024-01-01T00:00:00Z"},
                {"id": "new", "name": "New", "updatedAt": "2024-06-01T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;

    let store = HttpThreadStore::new(server.uri());
    let threads = store.list().await.unwrap();
    let ids: Vec<&str> = threads.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["new", "old"]);
}

#[tokio::test]
async fn test_create_rename_delete_routes() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/threads"))
        .and(body_json(json!({"name": "Trip planning"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "thread": {"id": "t1", "name": "Trip planning", "updatedAt": "2024-06-01T00:00:00Z"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/threads/t1"))
        .and(body_json(json!({"name": "Japan trip"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1", "name": "Japan trip", "updatedAt": "2024-06-02T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/threads/t1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = HttpThreadStore::new(server.uri());
    let created = store.create("Trip planning").await.unwrap();
    assert_eq!(created.id, "t1");
    let renamed = store.rename("t1", "Japan trip").await.unwrap();
    assert_eq!(renamed.display_name(), "Japan trip");
    store.delete("t1").await.unwrap();
}

#[tokio::test]
async fn test_get_messages_requests_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/threads/t1"))
        .and(query_param("messages", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "t1",
            "messages": [
                {"role": "user", "content": "Hi"},
                {"id": "m2", "role": "assistant", "content": "Hello!", "createdAt": "2024-06-01T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;

    let store = HttpThreadStore::new(server.uri());
    let messages = store.get_messages("t1").await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert!(!messages[0].id.is_empty());
    assert_eq!(messages[1].id, "m2");
}

#[tokio::test]
async fn test_error_body_becomes_thread_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/threads/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "Thread not found"})))
        .mount(&server)
        .await;

    let store = HttpThreadStore::new(server.uri());
    let err = store.delete("missing").await.unwrap_err();
    assert!(matches!(err, ParleyError::Thread(ref m) if m.contains("Thread not found")));
}

fn controller(transport: MockTransport, store: MemoryThreadStore) -> SessionController {
    SessionController::new(
        Settings::default(),
        Arc::new(transport),
        Arc::new(ToolRegistry::new()),
        Arc::new(store),
    )
    .unwrap()
}

#[tokio::test]
async fn test_load_thread_replaces_history_and_continues_it() {
    let store = MemoryThreadStore::new();
    store.insert(
        Thread::new("t1", "Recipes"),
        vec![Message::user("Pasta?"), Message::assistant("Boil water.")],
    );
    let transport = MockTransport::with_replies(vec![MockReply::tokens(["Add salt."])]);
    let mut session = controller(transport.clone(), store);

    session.load_thread("t1").await.unwrap();
    assert_eq!(session.current_thread_id(), Some("t1"));
    assert_eq!(session.messages().len(), 2);

    session.submit("Then?").await.unwrap();
    let request = transport.last_request().unwrap();
    assert_eq!(request.thread_id.as_deref(), Some("t1"));
    assert_eq!(request.messages.len(), 3);
}

#[tokio::test]
async fn test_load_missing_thread_keeps_session() {
    let transport = MockTransport::new();
    let mut session = controller(transport, MemoryThreadStore::new());
    session.submit("Hello").await.unwrap();

    assert!(session.load_thread("nope").await.is_err());
    assert_eq!(session.messages().len(), 2);
}

#[tokio::test]
async fn test_create_thread_switches_session() {
    let store = MemoryThreadStore::new();
    let mut session = controller(MockTransport::new(), store.clone());
    session.submit("Scratch").await.unwrap();

    let thread = session.create_thread("Fresh start").await.unwrap();

    assert_eq!(session.current_thread_id(), Some(thread.id.as_str()));
    assert!(session.messages().is_empty());
    assert_eq!(session.status(), SessionStatus::Idle);
    assert_eq!(session.threads()[0].id, thread.id);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_rename_and_delete_update_cache() {
    let store = MemoryThreadStore::new();
    store.insert(Thread::new("t1", "One"), vec![]);
    store.insert(Thread::new("t2", "Two"), vec![]);
    let mut session = controller(MockTransport::new(), store.clone());

    assert_eq!(session.refresh_threads().await.unwrap().len(), 2);

    session.rename_thread("t1", "Uno").await.unwrap();
    let renamed = session.threads().into_iter().find(|t| t.id == "t1").unwrap();
    assert_eq!(renamed.name, "Uno");

    session.load_thread("t2").await.unwrap();
    session.delete_thread("t2").await.unwrap();
    assert!(session.current_thread_id().is_none());
    assert!(session.threads().iter().all(|t| t.id != "t2"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_completed_exchange_refreshes_thread_list() {
    let store = MemoryThreadStore::new();
    store.insert(Thread::new("t1", "Existing"), vec![]);
    let mut session = controller(MockTransport::new(), store);
    assert!(session.threads().is_empty());

    session.submit("Hello").await.unwrap();

    // The refresh runs in the background
    for _ in 0..50 {
        if !session.threads().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(session.threads().len(), 1);
}
