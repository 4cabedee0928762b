// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Parley - chat sessions against a streaming model endpoint
//!
//! Entry point for the Parley CLI application.

use std::sync::Arc;

use clap::Parser;

use parley::chat::{SessionController, SessionObserver};
use parley::cli::{ChatArgs, Cli, Commands, SessionArgs};
use parley::config::Settings;
use parley::error::Result;
use parley::llm::http::HttpChatTransport;
use parley::threads::HttpThreadStore;
use parley::tools::{ToolEndpoint, ToolRegistry};

#[path = "main/chat_ui.rs"]
mod chat_ui;
#[path = "main/cli_commands.rs"]
mod cli_commands;

use cli_commands::{run_ask, run_chat, run_settings_command, run_threads_command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on session diagnostics without knowing target names.
    // `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        let directives: &[&str] = if cli.verbose > 1 {
            &["parley=debug"]
        } else {
            &[
                "parley.chat.controller=debug",
                "parley.transport=debug",
                "parley.tools=debug",
                "parley.threads=debug",
            ]
        };
        for directive in directives {
            if let Ok(parsed) = directive.parse() {
                env_filter = env_filter.add_directive(parsed);
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load_from(&settings_path)?;

    match cli.command {
        None => run_chat(ChatArgs::default(), settings).await?,
        Some(Commands::Chat(args)) => run_chat(args, settings).await?,
        Some(Commands::Ask(args)) => run_ask(args, settings).await?,
        Some(Commands::Threads(args)) => run_threads_command(args, &settings).await?,
        Some(Commands::Settings(args)) => {
            run_settings_command(args, &settings, &settings_path)?
        }
    }

    Ok(())
}

/// Apply per-invocation overrides from the command line
fn apply_session_args(settings: &mut Settings, args: &SessionArgs) {
    if let Some(ref provider) = args.provider {
        settings.chat.provider = provider.clone();
    }
    if let Some(ref model) = args.model {
        settings.chat.model = model.clone();
    }
    if let Some(ref tools) = args.tools {
        settings.chat.enabled_tools = tools
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
}

/// Wire up a session against the configured endpoints
fn build_session(
    settings: &Settings,
    observer: impl SessionObserver + 'static,
) -> Result<SessionController> {
    let transport = Arc::new(HttpChatTransport::from_settings(settings)?);
    let tools = Arc::new(ToolRegistry::with_builtins(ToolEndpoint::from_settings(
        settings,
    )?));
    let threads = Arc::new(HttpThreadStore::from_settings(settings)?);
    Ok(SessionController::new(settings.clone(), transport, tools, threads)?.with_observer(observer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_session_args_overrides() {
        let mut settings = Settings::default();
        apply_session_args(
            &mut settings,
            &SessionArgs {
                model: Some("claude-3-5-sonnet".into()),
                provider: Some("anthropic".into()),
                tools: Some(vec!["weather".into(), " ".into()]),
            },
        );
        assert_eq!(settings.chat.model, "claude-3-5-sonnet");
        assert_eq!(settings.chat.provider, "anthropic");
        assert_eq!(settings.chat.enabled_tools, vec!["weather"]);
    }

    #[test]
    fn test_apply_session_args_keeps_defaults() {
        let mut settings = Settings::default();
        apply_session_args(&mut settings, &SessionArgs::default());
        assert_eq!(settings.chat.model, "gpt-4o");
        assert_eq!(settings.chat.enabled_tools, vec!["web_search", "weather"]);
    }

    #[test]
    fn test_build_session_rejects_unknown_tool() {
        let mut settings = Settings::default();
        settings.chat.enabled_tools = vec!["teleport".into()];
        let result = build_session(&settings, parley::chat::NoopObserver);
        assert!(result.is_err());
    }
}
