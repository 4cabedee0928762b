// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! LLM module for Parley
//!
//! Message model, the chat transport abstraction and its HTTP and mock
//! implementations, the data-stream codec, and the retry policy.

pub mod http;
pub mod message;
pub mod mock_transport;
pub mod retry;
pub mod transport;
pub mod wire;

pub use message::*;
pub use transport::*;
