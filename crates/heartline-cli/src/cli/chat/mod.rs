//! Interactive chat experience for Heartline.
//!
//! Streams counsellor answers into the terminal with a thinking spinner,
//! slash commands and a welcome banner. Entry points:
//! `loop_runner::run_chat_loop` and `loop_runner::send_once`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
