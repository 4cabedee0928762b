// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation threads
//!
//! Thread metadata lives behind the [`ThreadStore`] trait. The remote API is
//! the source of truth; [`MemoryThreadStore`] stands in for it offline.

pub mod http;
pub mod memory;
pub mod store;

pub use http::HttpThreadStore;
pub use memory::MemoryThreadStore;
pub use store::*;
