//! Control words understood by the interactive chat loop.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Clear,
    /// Replace the system instruction; the new text is read from the next line.
    System,
    /// Anything else is a chat turn, forwarded verbatim.
    Turn(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        match line.trim().to_ascii_lowercase().as_str() {
            "quit" | "exit" => ReplCommand::Quit,
            "clear" => ReplCommand::Clear,
            "system" => ReplCommand::System,
            _ => ReplCommand::Turn(line.to_string()),
        }
    }
}

pub const HELP_LINES: &[&str] = &[
    "  • Type 'quit' or 'exit' to end",
    "  • Type 'clear' to reset conversation",
    "  • Type 'system' to change system message",
];
