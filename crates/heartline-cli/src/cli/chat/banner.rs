//! Welcome banner display for chat sessions.

use console::style;

/// Print the welcome banner at the start of an interactive session.
pub fn print_welcome_banner(provider: &str, model: &str, conversation_id: &str) {
    println!();
    println!("  {} {}", style("♥").red(), style("Heartline").magenta().bold());
    println!(
        "  {}",
        style("Share what is going on and we'll work through it together.").dim()
    );
    println!();
    println!(
        "  {}         {}",
        style("Model:").bold(),
        style(format!("{provider} / {model}")).dim()
    );
    println!("  {}  {}", style("Conversation:").bold(), style(conversation_id).dim());
    println!();
    println!("  {}", style("Type /help for commands, Ctrl+D to exit").dim());
    println!("  {}", style("---").dim());
    println!();
}
