//! CLI command definitions for the `heartline` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod conversation;

use clap::{Parser, Subcommand};

/// Talk through relationship troubles with an AI counsellor.
#[derive(Parser)]
#[command(name = "heartline", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true, env = "HEARTLINE_OTEL")]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Chat with the counsellor. Interactive unless a message is given.
    Chat {
        /// Conversation to continue (a new one is started when omitted).
        #[arg(short, long)]
        conversation: Option<String>,

        /// Send a single message and print the answer.
        message: Option<String>,

        /// Wait for the whole answer instead of streaming it.
        #[arg(long)]
        no_stream: bool,
    },

    /// Show the stored history of a conversation.
    History {
        /// Conversation id.
        conversation: String,

        /// How many of the most recent messages to show.
        #[arg(short = 'n', long, default_value = "20")]
        last: usize,
    },

    /// Forget a conversation's stored history.
    Clear {
        /// Conversation id.
        conversation: String,
    },

    /// Show the resolved configuration.
    Status,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_one_shot_chat() {
        let cli = Cli::try_parse_from([
            "heartline",
            "--json",
            "chat",
            "-c",
            "c-42",
            "We keep fighting about money",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Chat {
                conversation,
                message,
                no_stream,
            } => {
                assert_eq!(conversation.as_deref(), Some("c-42"));
                assert_eq!(message.as_deref(), Some("We keep fighting about money"));
                assert!(!no_stream);
            }
            _ => panic!("expected chat command"),
        }
    }

    #[test]
    fn test_parse_history_defaults() {
        let cli = Cli::try_parse_from(["heartline", "history", "c-42", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::History { conversation, last } => {
                assert_eq!(conversation, "c-42");
                assert_eq!(last, 20);
            }
            _ => panic!("expected history command"),
        }
    }

    #[test]
    fn test_clear_requires_conversation() {
        assert!(Cli::try_parse_from(["heartline", "clear"]).is_err());
    }
}
