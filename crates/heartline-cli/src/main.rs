//! Heartline CLI entry point.
//!
//! Binary name: `heartline`
//!
//! Parses CLI arguments, sets up tracing, wires configuration, memory and
//! the chat service, then dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;

use heartline_observe::{TracingOptions, init_tracing, shutdown_tracing};

use cli::chat::loop_runner::{conversation_or_new, run_chat_loop, send_once};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let tracing_options = TracingOptions::from_verbosity(cli.verbose, cli.quiet)
        .with_json(cli.json)
        .with_otel(cli.otel);
    init_tracing(&tracing_options).map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let state = AppState::init().await?;

    match cli.command {
        Commands::Chat {
            conversation,
            message,
            no_stream,
        } => {
            let service = state.chat_service().await?;
            tracing::debug!(advisors = ?service.advisor_names(), "Chat service ready");
            let conversation_id = conversation_or_new(conversation);

            match message {
                Some(message) => {
                    send_once(&service, &message, &conversation_id, !no_stream, cli.json, cli.quiet)
                        .await?;
                }
                None => run_chat_loop(&state, &service, conversation_id, !no_stream).await?,
            }
        }

        Commands::History { conversation, last } => {
            cli::conversation::show_history(&state, &conversation, last, cli.json).await?;
        }

        Commands::Clear { conversation } => {
            cli::conversation::clear_conversation(&state, &conversation, cli.json).await?;
        }

        Commands::Status => {
            cli::conversation::status(&state, cli.json)?;
        }
    }

    Ok(())
}
