//! Slash commands available inside the chat loop.

use console::style;

#[derive(Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    /// Show this conversation's stored history.
    History,
    /// Forget this conversation's stored history.
    Clear,
    /// Clear the terminal screen.
    ClearScreen,
    /// Switch to a new conversation, or to the named one.
    New(Option<String>),
    Exit,
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (trimmed, None),
    };

    let command = match cmd.to_lowercase().as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/history" => ChatCommand::History,
        "/clear" | "/forget" => ChatCommand::Clear,
        "/cls" => ChatCommand::ClearScreen,
        "/new" | "/switch" => ChatCommand::New(arg.map(String::from)),
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        other => ChatCommand::Unknown(other.to_string()),
    };
    Some(command)
}

pub fn print_help() {
    let rows = [
        ("/help", "Show this help message"),
        ("/history", "Show this conversation's history"),
        ("/clear", "Forget this conversation"),
        ("/cls", "Clear the screen"),
        ("/new [id]", "Start (or switch to) another conversation"),
        ("/exit", "End the session"),
    ];

    println!();
    println!("  {}", style("Available commands:").bold());
    println!();
    for (name, description) in rows {
        println!("  {} {}", style(format!("{name:<10}")).cyan(), description);
    }
    println!();
    println!("  {}", style("Ctrl+D to exit").dim());
    println!();
}
