// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use parley::chat::{SessionObserver, SessionStatus};
use parley::cli::{
    AskArgs, ChatArgs, SettingsArgs, SettingsCommands, ThreadsArgs, ThreadsCommands,
};
use parley::config::Settings;
use parley::error::{ApiError, ParleyError, Result};
use parley::threads::{HttpThreadStore, ThreadStore};

use super::chat_ui::{
    print_error, print_history, print_notice, print_welcome, read_user_input, TerminalObserver,
};
use super::{apply_session_args, build_session};

/// REPL commands
enum ReplCommand {
    Quit,
    Retry,
    Fallback,
    New,
    Help,
    Unknown(String),
    Message(String),
}

fn parse_repl_input(input: &str) -> ReplCommand {
    match input {
        "/quit" | "/exit" => ReplCommand::Quit,
        "/retry" => ReplCommand::Retry,
        "/fallback" => ReplCommand::Fallback,
        "/new" => ReplCommand::New,
        "/help" => ReplCommand::Help,
        other if other.starts_with('/') => ReplCommand::Unknown(other.to_string()),
        other => ReplCommand::Message(other.to_string()),
    }
}

/// What Ctrl-C does in the REPL
#[derive(Debug, PartialEq, Eq)]
enum InterruptAction {
    /// Stop the response in flight
    StopExchange,
    /// Nothing is running; leave the REPL
    Exit,
}

fn interrupt_action(exchange_running: bool) -> InterruptAction {
    if exchange_running {
        InterruptAction::StopExchange
    } else {
        InterruptAction::Exit
    }
}

/// Run the interactive chat REPL
pub(super) async fn run_chat(args: ChatArgs, mut settings: Settings) -> Result<()> {
    apply_session_args(&mut settings, &args.session);
    let mut session = build_session(&settings, TerminalObserver::new())?;

    if let Some(ref thread_id) = args.thread {
        session.load_thread(thread_id).await?;
        print_history(session.messages())?;
    }
    print_welcome(session.model_id(), session.current_thread_id())?;

    // Ctrl-C stops the response in flight, or exits at the prompt
    let stop = session.stop_handle();
    let running = Arc::new(AtomicBool::new(false));
    let interrupt_running = running.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match interrupt_action(interrupt_running.load(Ordering::SeqCst)) {
                InterruptAction::StopExchange => stop.stop(),
                InterruptAction::Exit => {
                    println!();
                    std::process::exit(130);
                }
            }
        }
    });

    while let Some(input) = read_user_input()? {
        if input.is_empty() {
            continue;
        }

        let command = parse_repl_input(&input);
        running.store(
            matches!(
                command,
                ReplCommand::Retry | ReplCommand::Fallback | ReplCommand::Message(_)
            ),
            Ordering::SeqCst,
        );
        let outcome = match command {
            ReplCommand::Quit => break,
            ReplCommand::Help => {
                print_notice("/retry  /fallback  /new  /quit")?;
                continue;
            }
            ReplCommand::Unknown(cmd) => {
                print_notice(&format!("unknown command: {}", cmd))?;
                continue;
            }
            ReplCommand::New => {
                session.new_thread()?;
                print_notice("started a new thread")?;
                continue;
            }
            ReplCommand::Retry => session.reload().await,
            ReplCommand::Fallback => session.use_fallback_model().await,
            ReplCommand::Message(text) => session.submit(&text).await,
        };
        running.store(false, Ordering::SeqCst);

        if let Err(e) = outcome {
            print_error(&e.to_string())?;
        } else if session.status() == SessionStatus::Idle {
            println!();
        }
    }

    Ok(())
}

/// Single exchange, printed to stdout
pub(super) async fn run_ask(args: AskArgs, mut settings: Settings) -> Result<()> {
    apply_session_args(&mut settings, &args.session);

    struct AskObserver;

    impl SessionObserver for AskObserver {
        fn on_token(&mut self, chunk: &str) -> Result<()> {
            print!("{}", chunk);
            io::stdout().flush()?;
            Ok(())
        }
    }

    let mut session = build_session(&settings, AskObserver)?;
    session.submit_with_images(&args.prompt, args.images).await?;
    println!();

    match session.state().error {
        Some(ref error) => Err(ParleyError::Api(ApiError::StreamError(error.message.clone()))),
        None => Ok(()),
    }
}

/// Run thread subcommands
pub(super) async fn run_threads_command(args: ThreadsArgs, settings: &Settings) -> Result<()> {
    let store = HttpThreadStore::from_settings(settings)?;
    let mut stdout = io::stdout();

    match args.command {
        ThreadsCommands::List => {
            let threads = store.list().await?;
            if threads.is_empty() {
                println!("No threads.");
            }
            for thread in threads {
                stdout.execute(SetForegroundColor(Color::Cyan))?;
                print!("{}", thread.id);
                stdout.execute(ResetColor)?;
                println!(
                    "  {}  ({})",
                    thread.display_name(),
                    thread.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        ThreadsCommands::Create { name } => {
            let thread = store.create(&name).await?;
            println!("Created thread {} ({})", thread.id, thread.display_name());
        }
        ThreadsCommands::Rename { id, name } => {
            let thread = store.rename(&id, &name).await?;
            println!("Renamed thread {} to {}", thread.id, thread.display_name());
        }
        ThreadsCommands::Delete { id } => {
            store.delete(&id).await?;
            println!("Deleted thread {}", id);
        }
        ThreadsCommands::Show { id } => {
            let messages = store.get_messages(&id).await?;
            print_history(&messages)?;
        }
    }
    Ok(())
}

/// Run settings subcommands
pub(super) fn run_settings_command(
    args: SettingsArgs,
    settings: &Settings,
    path: &Path,
) -> Result<()> {
    match args.command {
        SettingsCommands::Show => {
            println!("{}", serde_json::to_string_pretty(settings)?);
        }
        SettingsCommands::Path => {
            println!("{}", path.display());
        }
        SettingsCommands::Init { force } => {
            if path.exists() && !force {
                return Err(ParleyError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            Settings::default().save_to(path)?;
            println!("Wrote default settings to {}", path.display());
        }
    }
    Ok(())
}
