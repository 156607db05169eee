//! Shared domain types for Heartline.
//!
//! Conversation messages, LLM request/response shapes, configuration and
//! the error types used across the workspace.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod retrieval;
