//! Conversation memory for Heartline.
//!
//! `ConversationMemory` is the storage port the memory advisor reads history
//! from and appends completed exchanges to. The in-process implementation
//! lives here; durable backends live in heartline-infra.

pub mod box_memory;
pub mod in_memory;
pub mod store;

pub use box_memory::BoxConversationMemory;
pub use in_memory::InMemoryConversationMemory;
pub use store::ConversationMemory;
