//! Advisor chain, content filter and conversation memory for Heartline.
//!
//! This crate defines the ports (`LlmProvider`, `ConversationMemory`,
//! `DocumentRetriever`) that the infrastructure layer implements, and the
//! advisor pipeline built on them. It depends only on `heartline-types` --
//! never on `heartline-infra` or any database/IO crate.

pub mod advisor;
pub mod chat;
pub mod filter;
pub mod llm;
pub mod memory;
pub mod retrieval;

#[cfg(test)]
pub(crate) mod test_support;
