//! The chat entry point for Heartline.

pub mod service;

pub use service::{ChatService, ChatServiceBuilder, TextStream};
