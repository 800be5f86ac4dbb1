//! Terminal surfaces: the interactive `chat` loop and one-shot `ask`.
//!
//! `chat` owns exactly one [`ChatSession`] for the life of the process.
//! Prompts are printed only when stdin is a TTY, so piped input produces
//! answers alone.

use anyhow::Result;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::config::{Config, Secrets};
use crate::controller::{ChatController, TurnOutcome};
use crate::gate::AccessGate;
use crate::models::Role;
use crate::page;
use crate::prompt;
use crate::session::ChatSession;

/// Entry point for `aa-chat chat`.
pub async fn run_chat(config: &Config, secrets: &Secrets) -> Result<()> {
    let controller = ChatController::from_config(config, secrets)?;
    let password = secrets
        .app_password
        .as_deref()
        .filter(|_| config.chat.variant.supports_gate());
    let interactive = atty::is(atty::Stream::Stdin);
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();

    chat_loop(&controller, password, stdin, &mut stdout, interactive).await
}

/// Read questions line by line until EOF or `/quit`.
///
/// Upstream failures are reported and the loop continues; the failed turn
/// keeps its user message but gets no answer.
pub async fn chat_loop<R, W>(
    controller: &ChatController,
    password: Option<&str>,
    input: R,
    out: &mut W,
    interactive: bool,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let gate = match password {
        Some(_) => AccessGate::locked(),
        None => AccessGate::open(),
    };
    let mut session = ChatSession::new(gate);
    let mut lines = input.lines();

    let copy = page::copy_for(controller.variant());
    writeln!(out, "{}", copy.title)?;
    if interactive {
        for p in copy.intro {
            writeln!(out, "{}", p)?;
        }
        writeln!(out)?;
    }

    if let Some(shared) = password {
        loop {
            if interactive {
                write!(out, "Password: ")?;
                out.flush()?;
            }
            let Some(line) = lines.next_line().await? else {
                return Ok(());
            };
            if session.gate.attempt(&line, shared) {
                break;
            }
            if let Some(err) = session.gate.error() {
                writeln!(out, "{}", err)?;
            }
        }
    }

    loop {
        if interactive {
            write!(out, "you> ")?;
            out.flush()?;
        }
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/history" => {
                for turn in session.transcript.turns() {
                    let who = match turn.role {
                        Role::User => "you",
                        Role::Assistant => "assistant",
                    };
                    writeln!(out, "[{}] {}: {}", turn.at.format("%H:%M:%S"), who, turn.content)?;
                }
                continue;
            }
            _ => {}
        }

        match controller.submit(&mut session, &line).await {
            Ok(Some(outcome)) => print_outcome(out, &outcome)?,
            Ok(None) => {}
            Err(e) => writeln!(out, "Error: {:#}", e)?,
        }
    }

    tracing::debug!(session = %session.id, turns = session.transcript.len(), "chat session ended");
    Ok(())
}

fn print_outcome<W: Write>(out: &mut W, outcome: &TurnOutcome) -> Result<()> {
    writeln!(out, "{}", outcome.answer)?;
    if !outcome.sources.is_empty() {
        writeln!(out)?;
        writeln!(out, "--- Source Material ({}) ---", outcome.sources.len())?;
        write!(out, "{}", prompt::render_sources(&outcome.sources))?;
    }
    writeln!(out)?;
    Ok(())
}

/// Entry point for `aa-chat ask`. Uses a throwaway session with no gate.
pub async fn run_ask(config: &Config, secrets: &Secrets, question: &str) -> Result<()> {
    let controller = ChatController::from_config(config, secrets)?;
    let mut session = ChatSession::new(AccessGate::open());

    match controller.submit(&mut session, question).await? {
        Some(outcome) => print_outcome(&mut std::io::stdout(), &outcome),
        None => {
            println!("Nothing to ask.");
            Ok(())
        }
    }
}
