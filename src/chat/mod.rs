// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat session management
//!
//! The [`SessionController`] owns one session's [`SessionState`] and drives
//! requests through a [`ChatTransport`](crate::llm::transport::ChatTransport).
//! Frontends render progress through a [`SessionObserver`].

pub mod controller;
pub mod observer;
pub mod state;
pub mod streaming;

pub use controller::{SessionController, StopHandle};
pub use observer::{NoopObserver, RecoveryKind, RecoveryNotice, SessionObserver};
pub use state::{
    ConnectionState, ModelSelection, RecoveryMode, SessionEvent, SessionState, SessionStatus,
    SurfacedError,
};
