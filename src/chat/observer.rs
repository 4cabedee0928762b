// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Output hooks for a chat session
//!
//! Frontends implement [`SessionObserver`] to render tokens, tool activity
//! and recovery badges. Every method defaults to a no-op.

use std::time::Duration;

use crate::chat::state::{SessionStatus, SurfacedError};
use crate::error::Result;
use crate::llm::message::ToolCall;

/// Kind of automatic recovery shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryKind {
    /// Connection dropped, reconnecting
    Reconnecting,
    /// Same model, another attempt
    Retrying,
    /// Switching to the fallback model
    Fallback,
}

impl std::fmt::Display for RecoveryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecoveryKind::Reconnecting => "Reconnecting",
            RecoveryKind::Retrying => "Retrying",
            RecoveryKind::Fallback => "Using fallback model",
        };
        f.write_str(s)
    }
}

/// A scheduled recovery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryNotice {
    pub kind: RecoveryKind,
    /// Wait before the next attempt
    pub delay: Duration,
    /// Retry counter after the failure
    pub attempt: u32,
    /// Model the next attempt goes to
    pub model: String,
}

pub trait SessionObserver: Send {
    fn on_status(&mut self, _status: SessionStatus) -> Result<()> {
        Ok(())
    }

    fn on_token(&mut self, _chunk: &str) -> Result<()> {
        Ok(())
    }

    /// A tool call was requested or resolved
    fn on_tool_call(&mut self, _call: &ToolCall) -> Result<()> {
        Ok(())
    }

    fn on_recovery(&mut self, _notice: &RecoveryNotice) -> Result<()> {
        Ok(())
    }

    fn on_error(&mut self, _error: &SurfacedError) -> Result<()> {
        Ok(())
    }
}

/// Observer that ignores everything
#[derive(Debug, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_observer_accepts_everything() {
        let mut observer = NoopObserver;
        assert!(observer.on_status(SessionStatus::Streaming).is_ok());
        assert!(observer.on_token("hi").is_ok());
        let notice = RecoveryNotice {
            kind: RecoveryKind::Retrying,
            delay: Duration::from_millis(1000),
            attempt: 1,
            model: "gpt-4o".into(),
        };
        assert!(observer.on_recovery(&notice).is_ok());
    }

    #[test]
    fn test_recovery_kind_labels() {
        assert_eq!(RecoveryKind::Reconnecting.to_string(), "Reconnecting");
        assert_eq!(RecoveryKind::Fallback.to_string(), "Using fallback model");
    }
}
