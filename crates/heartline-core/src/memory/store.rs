//! ConversationMemory trait definition.
//!
//! An ordered, append-only message log per conversation. Follows the same
//! RPITIT pattern as `LlmProvider`; `BoxConversationMemory` provides the
//! dynamic-dispatch form.

use heartline_types::chat::{ChatMessage, ConversationId};
use heartline_types::error::RepositoryError;

/// Per-conversation message history.
///
/// Implementations live here (`InMemoryConversationMemory`) and in
/// heartline-infra (file and SQLite backends). Every implementation must be
/// safe for concurrent use: appends to one conversation are serialized and
/// never interleave, appends to different conversations are independent.
pub trait ConversationMemory: Send + Sync {
    /// Append a single message to the end of a conversation.
    fn add(
        &self,
        conversation_id: &ConversationId,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send {
        self.add_all(conversation_id, std::slice::from_ref(message))
    }

    /// Append messages in order, atomically with respect to concurrent
    /// appends on the same conversation. Creates the conversation if absent.
    fn add_all(
        &self,
        conversation_id: &ConversationId,
        messages: &[ChatMessage],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// The last `last_n` messages in chronological order (oldest first).
    ///
    /// Unknown conversations yield an empty list; `last_n == 0` yields an
    /// empty list.
    fn get(
        &self,
        conversation_id: &ConversationId,
        last_n: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Remove all messages of a conversation. Clearing an unknown
    /// conversation is a no-op.
    fn clear(
        &self,
        conversation_id: &ConversationId,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
