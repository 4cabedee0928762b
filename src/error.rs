// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for Parley
//!
//! This module defines all error types used throughout the crate, plus the
//! classification the session controller uses to pick a recovery strategy.

use thiserror::Error;

/// Main error type for Parley operations
#[derive(Error, Debug)]
pub enum ParleyError {
    /// API-related errors
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Tool execution errors (only ever surfaced as tool output text)
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// The model asked for a tool that is not registered
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// A request is already in flight for this session
    #[error("Session busy: a request is already in flight")]
    SessionBusy,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Thread store errors
    #[error("Thread error: {0}")]
    Thread(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// API-specific error types
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network connectivity error
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout waiting for response
    #[error("Request timed out")]
    Timeout,

    /// Request aborted before completion
    #[error("Request aborted")]
    Aborted,

    /// API returned an error
    #[error("API error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Streaming error reported inside the response body
    #[error("Streaming error: {0}")]
    StreamError(String),

    /// Invalid response from API
    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    /// Provider reported the model as unavailable or over capacity
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
}

/// Result type alias for Parley operations
pub type Result<T> = std::result::Result<T, ParleyError>;

/// Coarse error class driving the recovery policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Provider overloaded or model unavailable
    ModelCapacity,
    /// Network failure, timeout or abort
    Connection,
    /// Anything else (validation failures, auth, malformed bodies)
    Generic,
}

const CAPACITY_MARKERS: &[&str] = &["model", "capacity", "unavailable", "overloaded"];
const CONNECTION_MARKERS: &[&str] = &["network", "connection", "timeout", "timed out", "abort"];

impl ErrorClass {
    /// Classify an error by variant first, then by message text.
    ///
    /// Capacity markers win over connection markers when both appear.
    pub fn classify(error: &ParleyError) -> Self {
        if let ParleyError::Api(ApiError::ModelUnavailable(_)) = error {
            return ErrorClass::ModelCapacity;
        }

        let message = error.to_string().to_lowercase();
        if CAPACITY_MARKERS.iter().any(|m| message.contains(m)) {
            return ErrorClass::ModelCapacity;
        }

        match error {
            ParleyError::Api(ApiError::Network(_))
            | ParleyError::Api(ApiError::Timeout)
            | ParleyError::Api(ApiError::Aborted) => return ErrorClass::Connection,
            ParleyError::Http(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                return ErrorClass::Connection
            }
            _ => {}
        }

        if CONNECTION_MARKERS.iter().any(|m| message.contains(m)) {
            ErrorClass::Connection
        } else {
            ErrorClass::Generic
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(err.to_string())
        }
    }
}
