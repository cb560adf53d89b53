//! Interactive chat loop.
//!
//! Generic over the input and output streams so the loop can be driven from tests.

use crate::commands::{HELP_LINES, ReplCommand};
use ac_llm::Conversation;
use std::future::Future;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

const RULE: &str = "==================================================";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplExit {
    Quit,
    EndOfInput,
    Interrupted,
}

pub fn print_banner<W: Write>(out: &mut W, title: &str) -> std::io::Result<()> {
    writeln!(out, "{RULE}")?;
    writeln!(out, "{title} Command Line Chatbot")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "Commands:")?;
    for line in HELP_LINES {
        writeln!(out, "{line}")?;
    }
    writeln!(out, "{RULE}")
}

/// Runs until `quit`/`exit`, end of input, or `shutdown` resolves.
///
/// `shutdown` is raced against both line reads and in-flight turns; an interrupted turn is
/// abandoned along with the session.
#[tracing::instrument(level = "debug", skip_all, fields(provider = %conversation.provider()))]
pub async fn run<R, W, S>(
    conversation: &mut dyn Conversation,
    input: R,
    out: &mut W,
    shutdown: S,
) -> anyhow::Result<ReplExit>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    S: Future<Output = ()>,
{
    let speaker = conversation.provider().speaker();
    let mut lines = input.lines();
    tokio::pin!(shutdown);

    let exit = loop {
        write!(out, "\nYou: ")?;
        out.flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut shutdown => break ReplExit::Interrupted,
        };
        let Some(line) = line else {
            break ReplExit::EndOfInput;
        };

        match ReplCommand::parse(&line) {
            ReplCommand::Quit => break ReplExit::Quit,
            ReplCommand::Clear => {
                conversation.clear();
                writeln!(out, "Conversation cleared.")?;
            }
            ReplCommand::System => {
                write!(out, "Enter new system message: ")?;
                out.flush()?;
                let next = tokio::select! {
                    line = lines.next_line() => line?,
                    _ = &mut shutdown => break ReplExit::Interrupted,
                };
                let Some(text) = next else {
                    break ReplExit::EndOfInput;
                };
                conversation.set_system_instruction(&text);
                writeln!(out, "System message updated.")?;
            }
            ReplCommand::Turn(text) => {
                if text.trim().is_empty() {
                    continue;
                }
                writeln!(out, "\n{speaker}:")?;
                out.flush()?;
                let outcome = tokio::select! {
                    outcome = conversation.send_turn(&text) => outcome,
                    _ = &mut shutdown => break ReplExit::Interrupted,
                };
                match outcome {
                    Ok(reply) => writeln!(out, "{reply}")?,
                    Err(e) => writeln!(out, "Error: {e}")?,
                }
            }
        }
    };

    match exit {
        ReplExit::Interrupted => writeln!(out, "\nInterrupted. Goodbye!")?,
        ReplExit::Quit | ReplExit::EndOfInput => writeln!(out, "Goodbye!")?,
    }
    out.flush()?;
    Ok(exit)
}
