// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use parley::chat::{RecoveryNotice, SessionObserver, SessionStatus, SurfacedError};
use parley::error::Result;
use parley::llm::message::{Message, Role, ToolCall, ToolCallStatus};

/// Renders a session to the terminal
#[derive(Debug, Default)]
pub(super) struct TerminalObserver {
    /// Print the "assistant:" prefix before the next token
    prefix_pending: bool,
}

impl TerminalObserver {
    pub(super) fn new() -> Self {
        Self::default()
    }
}

impl SessionObserver for TerminalObserver {
    fn on_status(&mut self, status: SessionStatus) -> Result<()> {
        if status == SessionStatus::Submitted {
            self.prefix_pending = true;
        }
        Ok(())
    }

    fn on_token(&mut self, chunk: &str) -> Result<()> {
        if self.prefix_pending {
            print_response_prefix()?;
            self.prefix_pending = false;
        }
        print!("{}", chunk);
        io::stdout().flush()?;
        Ok(())
    }

    fn on_tool_call(&mut self, call: &ToolCall) -> Result<()> {
        let mut stdout = io::stdout();
        match call.status {
            ToolCallStatus::Pending => {
                stdout.execute(SetForegroundColor(Color::Yellow))?;
                println!("\n  ⚙ {} {}", call.name, call.args);
            }
            ToolCallStatus::Completed => {
                stdout.execute(SetForegroundColor(Color::DarkGrey))?;
                println!("  ✓ {}: {}", call.name, first_line(call.result.as_deref()));
            }
            ToolCallStatus::Error => {
                stdout.execute(SetForegroundColor(Color::Red))?;
                println!("  ✗ {}: {}", call.name, first_line(call.result.as_deref()));
            }
        }
        stdout.execute(ResetColor)?;
        // Continuation text starts a fresh line
        self.prefix_pending = true;
        Ok(())
    }

    fn on_recovery(&mut self, notice: &RecoveryNotice) -> Result<()> {
        let mut stdout = io::stdout();
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        println!(
            "\n[{}: attempt {} on {} in {:.1}s]",
            notice.kind,
            notice.attempt,
            notice.model,
            notice.delay.as_secs_f32()
        );
        stdout.execute(ResetColor)?;
        self.prefix_pending = true;
        Ok(())
    }

    fn on_error(&mut self, error: &SurfacedError) -> Result<()> {
        print_error(&error.message)?;
        let mut hints = Vec::new();
        if error.retry_available {
            hints.push("/retry");
        }
        if error.fallback_available {
            hints.push("/fallback");
        }
        if !hints.is_empty() {
            println!("  try {}", hints.join(" or "));
        }
        Ok(())
    }
}

fn first_line(text: Option<&str>) -> &str {
    text.and_then(|t| t.lines().next()).unwrap_or("")
}

pub(super) fn print_response_prefix() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    print!("\nassistant: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

pub(super) fn print_error(message: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Red))?;
    println!("\nerror: {}", message);
    stdout.execute(ResetColor)?;
    Ok(())
}

pub(super) fn print_notice(message: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Yellow))?;
    println!("{}", message);
    stdout.execute(ResetColor)?;
    Ok(())
}

/// Print stored history, e.g. after loading a thread
pub(super) fn print_history(messages: &[Message]) -> Result<()> {
    let mut stdout = io::stdout();
    for message in messages {
        let color = match message.role {
            Role::User => Color::Green,
            Role::Assistant => Color::Cyan,
            Role::System | Role::Tool => Color::DarkGrey,
        };
        stdout.execute(SetForegroundColor(color))?;
        print!("{}: ", message.role);
        stdout.execute(ResetColor)?;
        println!("{}", message.content);
    }
    Ok(())
}

pub(super) fn print_welcome(model: &str, thread: Option<&str>) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("parley - {}", model);
    stdout.execute(ResetColor)?;
    if let Some(thread) = thread {
        println!("thread: {}", thread);
    }
    println!("/retry  /fallback  /new  /quit   (Ctrl-C stops a response)\n");
    Ok(())
}

/// Read user input
pub(super) fn read_user_input() -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("\nyou: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim().to_string()))
}
