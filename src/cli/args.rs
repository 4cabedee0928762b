// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for Parley.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parley - chat sessions against a streaming model endpoint
#[derive(Parser, Debug)]
#[command(name = "parley")]
#[command(version, about = "Chat sessions against a streaming model endpoint")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat session (default when no command given)
    Chat(ChatArgs),

    /// Ask a single question (non-interactive)
    Ask(AskArgs),

    /// Manage saved threads
    Threads(ThreadsArgs),

    /// Show or initialize settings
    #[command(alias = "config")]
    Settings(SettingsArgs),
}

/// Options shared by `chat` and `ask`
#[derive(clap::Args, Debug, Default, Clone)]
pub struct SessionArgs {
    /// Model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Provider the model belongs to (openai, anthropic, google)
    #[arg(short, long)]
    pub provider: Option<String>,

    /// Tools to offer the model, comma separated (e.g. web_search,weather)
    #[arg(long, value_delimiter = ',')]
    pub tools: Option<Vec<String>>,
}

/// Arguments for the chat subcommand
#[derive(clap::Args, Debug, Default)]
pub struct ChatArgs {
    /// Resume a saved thread
    #[arg(short, long)]
    pub thread: Option<String>,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Arguments for the ask subcommand
#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The prompt to send
    pub prompt: String,

    /// Image attachments (URLs or data URIs)
    #[arg(long = "image")]
    pub images: Vec<String>,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Arguments for the threads subcommand
#[derive(clap::Args, Debug)]
pub struct ThreadsArgs {
    #[command(subcommand)]
    pub command: ThreadsCommands,
}

#[derive(Subcommand, Debug)]
pub enum ThreadsCommands {
    /// List threads, most recent first
    List,
    /// Create a thread
    Create {
        /// Thread name
        name: String,
    },
    /// Rename a thread
    Rename {
        /// Thread id
        id: String,
        /// New name
        name: String,
    },
    /// Delete a thread
    Delete {
        /// Thread id
        id: String,
    },
    /// Print a thread's messages
    Show {
        /// Thread id
        id: String,
    },
}

/// Arguments for the settings subcommand
#[derive(clap::Args, Debug)]
pub struct SettingsArgs {
    #[command(subcommand)]
    pub command: SettingsCommands,
}

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Print the effective settings as JSON
    Show,
    /// Print the settings file path
    Path,
    /// Write default settings to the settings file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}
