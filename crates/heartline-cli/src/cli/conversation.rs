//! Non-interactive conversation commands: history, clear and status.

use console::style;

use heartline_types::chat::{ChatMessage, ConversationId, MessageRole};

use crate::state::AppState;

/// A user-supplied conversation id with surrounding whitespace removed,
/// or `None` when nothing is left.
pub fn normalize_conversation_id(raw: &str) -> Option<ConversationId> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| ConversationId::new(trimmed))
}

fn required_conversation_id(raw: &str) -> anyhow::Result<ConversationId> {
    normalize_conversation_id(raw)
        .ok_or_else(|| anyhow::anyhow!("conversation id must not be empty"))
}

/// Styled speaker label for a stored message.
pub fn role_label(role: MessageRole) -> String {
    match role {
        MessageRole::User => format!("{}", style("You").green().bold()),
        MessageRole::Assistant => format!("{}", style("Heartline").magenta().bold()),
        MessageRole::System => format!("{}", style("System").dim()),
    }
}

/// Single-line preview of a message, cut at `max_chars` characters.
pub fn preview(content: &str, max_chars: usize) -> String {
    let flat = content.replace('\n', " ");
    if flat.chars().count() > max_chars {
        let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    } else {
        flat
    }
}

/// Print messages as a styled transcript.
pub fn print_transcript(messages: &[ChatMessage]) {
    println!();
    for msg in messages {
        println!(
            "  {} {} {}",
            style(msg.created_at.format("%Y-%m-%d %H:%M").to_string()).dim(),
            role_label(msg.role),
            preview(&msg.content, 100)
        );
    }
    println!();
}

pub async fn show_history(
    state: &AppState,
    conversation: &str,
    last: usize,
    json: bool,
) -> anyhow::Result<()> {
    let conversation_id = required_conversation_id(conversation)?;
    let messages = state.memory.get(&conversation_id, last).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!(
            "\n  {} No stored messages for '{}'.\n",
            style("i").cyan().bold(),
            conversation_id
        );
        return Ok(());
    }
    print_transcript(&messages);
    Ok(())
}

pub async fn clear_conversation(state: &AppState, conversation: &str, json: bool) -> anyhow::Result<()> {
    let conversation_id = required_conversation_id(conversation)?;
    state.memory.clear(&conversation_id).await?;

    if json {
        let out = serde_json::json!({
            "conversation_id": conversation_id.as_str(),
            "cleared": true,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "\n  {} Cleared conversation '{}'.\n",
            style("✓").green().bold(),
            style(&conversation_id).cyan()
        );
    }
    Ok(())
}

pub fn status(state: &AppState, json: bool) -> anyhow::Result<()> {
    let config = &state.config;
    let documents = config
        .retrieval
        .documents_dir
        .as_ref()
        .map(|d| d.display().to_string());

    if json {
        let out = serde_json::json!({
            "data_dir": state.data_dir.display().to_string(),
            "memory_backend": config.memory.backend.to_string(),
            "retrieve_size": config.memory.retrieve_size,
            "provider": config.provider.name,
            "model": config.provider.model,
            "api_key_env": config.provider.api_key_env,
            "banned_words": config.filter.banned_words.len(),
            "documents_dir": documents,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let key_set = std::env::var(&config.provider.api_key_env).is_ok_and(|v| !v.trim().is_empty());
    let mark = |ok: bool| {
        if ok {
            format!("{}", style("✓").green())
        } else {
            format!("{}", style("✗").red())
        }
    };

    println!();
    println!("  {}", style("Heartline status").bold());
    println!();
    println!("  {}      {}", style("Data:").bold(), state.data_dir.display());
    println!(
        "  {}    {} (last {} messages)",
        style("Memory:").bold(),
        config.memory.backend,
        config.memory.retrieve_size
    );
    println!(
        "  {}     {} / {}",
        style("Model:").bold(),
        config.provider.name,
        config.provider.model
    );
    println!(
        "  {}    {} banned terms",
        style("Filter:").bold(),
        config.filter.banned_words.len()
    );
    println!(
        "  {} {}",
        style("Retrieval:").bold(),
        documents.as_deref().unwrap_or("disabled")
    );
    println!();
    println!("  {} {} set", mark(key_set), config.provider.api_key_env);
    println!();
    Ok(())
}
