//! Chat loop orchestration.
//!
//! Runs the interactive session (banner, prompt, slash commands, streamed
//! answers) and the one-shot `heartline chat "<message>"` path.

use std::io::Write;
use std::time::Duration;

use console::style;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use uuid::Uuid;

use heartline_core::chat::ChatService;
use heartline_types::chat::ConversationId;
use heartline_types::error::ChatError;

use crate::cli::conversation::{normalize_conversation_id, print_transcript};
use crate::state::AppState;

use super::banner::print_welcome_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};

const HISTORY_PREVIEW: usize = 20;

/// The given conversation id, or a fresh time-ordered one.
pub fn conversation_or_new(conversation: Option<String>) -> ConversationId {
    conversation
        .as_deref()
        .and_then(normalize_conversation_id)
        .unwrap_or_else(|| ConversationId::new(Uuid::now_v7().to_string()))
}

fn thinking_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(spinner_style) = ProgressStyle::default_spinner().template("{spinner:.magenta} {msg}") {
        spinner.set_style(spinner_style);
    }
    spinner.set_message("thinking...");
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn print_speaker() {
    print!("\n  {} ", style("Heartline").magenta().bold());
    let _ = std::io::stdout().flush();
}

/// Stream one answer to stdout, returning the full text.
async fn stream_answer(
    service: &ChatService,
    message: &str,
    conversation_id: &ConversationId,
    decorate: bool,
) -> Result<String, ChatError> {
    let spinner = decorate.then(thinking_spinner);
    let mut stream = service.chat_stream(message, conversation_id);
    let mut full = String::new();
    let mut started = false;

    let result = loop {
        match stream.next().await {
            Some(Ok(fragment)) => {
                if !started {
                    if let Some(ref spinner) = spinner {
                        spinner.finish_and_clear();
                    }
                    if decorate {
                        print_speaker();
                    }
                    started = true;
                }
                print!("{fragment}");
                let _ = std::io::stdout().flush();
                full.push_str(&fragment);
            }
            Some(Err(e)) => break Err(e),
            None => break Ok(full),
        }
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    if started {
        println!();
    }
    result
}

/// Wait for the whole answer, then print it.
async fn blocking_answer(
    service: &ChatService,
    message: &str,
    conversation_id: &ConversationId,
    decorate: bool,
) -> Result<String, ChatError> {
    let spinner = decorate.then(thinking_spinner);
    let result = service.chat(message, conversation_id).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    if let Ok(ref answer) = result {
        if decorate {
            print_speaker();
        }
        println!("{answer}");
    }
    result
}

/// Send a single message and print the answer.
pub async fn send_once(
    service: &ChatService,
    message: &str,
    conversation_id: &ConversationId,
    stream: bool,
    json: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if json {
        let answer = service.chat(message, conversation_id).await?;
        let out = serde_json::json!({
            "conversation_id": conversation_id.as_str(),
            "response": answer,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let decorate = !quiet;
    if stream {
        stream_answer(service, message, conversation_id, decorate).await?;
    } else {
        blocking_answer(service, message, conversation_id, decorate).await?;
    }

    if decorate {
        println!();
        println!(
            "  {}",
            style(format!("Continue with: heartline chat -c {conversation_id}")).dim()
        );
        println!();
    }
    Ok(())
}

/// Run the interactive chat session.
pub async fn run_chat_loop(
    state: &AppState,
    service: &ChatService,
    mut conversation_id: ConversationId,
    stream: bool,
) -> anyhow::Result<()> {
    print_welcome_banner(
        &state.config.provider.name,
        &state.config.provider.model,
        conversation_id.as_str(),
    );

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, _writer) = ChatInput::new(prompt)
        .map_err(|e| anyhow::anyhow!("Failed to initialize input: {e}"))?;

    loop {
        let text = match chat_input.read_line().await {
            InputEvent::Eof => {
                println!("\n  {}", style("Session ended.").dim());
                break;
            }
            InputEvent::Interrupted => {
                println!("\n  {}", style("Press Ctrl+D to exit, or keep chatting.").dim());
                continue;
            }
            InputEvent::Line(text) if text.is_empty() => continue,
            InputEvent::Line(text) => text,
        };

        if let Some(cmd) = commands::parse(&text) {
            match cmd {
                ChatCommand::Help => commands::print_help(),
                ChatCommand::History => {
                    let messages = service.history(&conversation_id, HISTORY_PREVIEW).await?;
                    if messages.is_empty() {
                        println!("\n  {}\n", style("Nothing stored yet.").dim());
                    } else {
                        print_transcript(&messages);
                    }
                }
                ChatCommand::Clear => match service.clear_conversation(&conversation_id).await {
                    Ok(()) => println!(
                        "\n  {} Conversation forgotten.\n",
                        style("✓").green().bold()
                    ),
                    Err(e) => println!("\n  {} Failed to clear: {e}\n", style("!").red().bold()),
                },
                ChatCommand::ClearScreen => chat_input.clear_screen(),
                ChatCommand::New(id) => {
                    conversation_id = conversation_or_new(id);
                    println!(
                        "\n  {} Now in conversation {}\n",
                        style("*").cyan().bold(),
                        style(&conversation_id).cyan()
                    );
                }
                ChatCommand::Exit => {
                    println!("\n  {}", style("Session ended.").dim());
                    break;
                }
                ChatCommand::Unknown(name) => println!(
                    "\n  {} Unknown command: {}. Type /help for available commands.\n",
                    style("?").yellow().bold(),
                    style(name).dim()
                ),
            }
            continue;
        }

        let result = if stream {
            stream_answer(service, &text, &conversation_id, true).await
        } else {
            blocking_answer(service, &text, &conversation_id, true).await
        };

        match result {
            Ok(_) => println!(),
            Err(e) => {
                tracing::warn!(error = %e, conversation_id = %conversation_id, "Chat turn failed");
                eprintln!("\n  {} {e}", style("!").red().bold());
                eprintln!("  {}", style("Type a message to retry, /exit to quit.").dim());
            }
        }
    }

    chat_input.flush();
    Ok(())
}
