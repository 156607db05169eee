//! Infrastructure layer for Heartline.
//!
//! Contains implementations of the ports defined in `heartline-core`:
//! SQLite and file-backed conversation memory, the OpenAI-compatible model
//! provider, configuration loading and filesystem adapters.

pub mod config;
pub mod filesystem;
pub mod llm;
pub mod memory;
pub mod sqlite;
