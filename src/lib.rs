// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Parley - conversational session controller for streaming chat endpoints.
//!
//! This crate exposes the runtime used by the `parley` CLI (`src/main.rs`)
//! and by any other frontend that wants to drive a chat session.
//!
//! Architecture highlights:
//! - `chat`: session controller, session state transitions, observer hooks
//! - `llm`: messages, the chat transport (HTTP and mock), wire codec, retry policy
//! - `tools`: tool registry and the built-in tool executors
//! - `threads`: thread metadata store (HTTP and in-memory)
//! - `config`: settings loading and validation

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod threads;
pub mod tools;

pub use error::{ParleyError, Result};
