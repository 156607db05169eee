//! Process-local conversation memory backed by a concurrent map.

use dashmap::DashMap;

use heartline_types::chat::{ChatMessage, ConversationId};
use heartline_types::error::RepositoryError;

use super::store::ConversationMemory;

/// Conversation memory that lives for the lifetime of the process.
///
/// Each conversation's log sits behind its own shard lock, so appends to one
/// conversation are serialized while other conversations proceed in parallel.
#[derive(Debug, Default)]
pub struct InMemoryConversationMemory {
    conversations: DashMap<ConversationId, Vec<ChatMessage>>,
}

impl InMemoryConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations currently holding at least one message.
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }
}

impl ConversationMemory for InMemoryConversationMemory {
    async fn add_all(
        &self,
        conversation_id: &ConversationId,
        messages: &[ChatMessage],
    ) -> Result<(), RepositoryError> {
        if messages.is_empty() {
            return Ok(());
        }
        self.conversations
            .entry(conversation_id.clone())
            .or_default()
            .extend_from_slice(messages);
        Ok(())
    }

    async fn get(
        &self,
        conversation_id: &ConversationId,
        last_n: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = self
            .conversations
            .get(conversation_id)
            .map(|log| {
                let start = log.len().saturating_sub(last_n);
                log[start..].to_vec()
            })
            .unwrap_or_default();
        Ok(messages)
    }

    async fn clear(&self, conversation_id: &ConversationId) -> Result<(), RepositoryError> {
        self.conversations.remove(conversation_id);
        Ok(())
    }
}
