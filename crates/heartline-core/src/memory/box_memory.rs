//! BoxConversationMemory -- object-safe dynamic dispatch wrapper for ConversationMemory.
//!
//! Same blanket-impl pattern as `BoxLlmProvider`, but backed by an `Arc` so
//! the memory advisor can move a handle into deferred commits and streams.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use heartline_types::chat::{ChatMessage, ConversationId};
use heartline_types::error::RepositoryError;

use super::store::ConversationMemory;

/// Object-safe version of [`ConversationMemory`] with boxed futures.
pub trait ConversationMemoryDyn: Send + Sync {
    fn add_all_boxed<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
        messages: &'a [ChatMessage],
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>>;

    fn get_boxed<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
        last_n: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send + 'a>>;

    fn clear_boxed<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>>;
}

impl<T: ConversationMemory> ConversationMemoryDyn for T {
    fn add_all_boxed<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
        messages: &'a [ChatMessage],
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>> {
        Box::pin(self.add_all(conversation_id, messages))
    }

    fn get_boxed<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
        last_n: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send + 'a>> {
        Box::pin(self.get(conversation_id, last_n))
    }

    fn clear_boxed<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
    ) -> Pin<Box<dyn Future<Output = Result<(), RepositoryError>> + Send + 'a>> {
        Box::pin(self.clear(conversation_id))
    }
}

/// Type-erased, cheaply cloneable conversation memory handle.
#[derive(Clone)]
pub struct BoxConversationMemory {
    inner: Arc<dyn ConversationMemoryDyn + Send + Sync>,
}

impl BoxConversationMemory {
    /// Wrap a concrete `ConversationMemory` in a type-erased handle.
    pub fn new<T: ConversationMemory + 'static>(memory: T) -> Self {
        Self {
            inner: Arc::new(memory),
        }
    }

    /// Share an existing memory behind an `Arc` (lets callers keep a typed handle).
    pub fn from_arc<T: ConversationMemory + 'static>(memory: Arc<T>) -> Self {
        Self { inner: memory }
    }

    pub async fn add(
        &self,
        conversation_id: &ConversationId,
        message: &ChatMessage,
    ) -> Result<(), RepositoryError> {
        self.inner
            .add_all_boxed(conversation_id, std::slice::from_ref(message))
            .await
    }

    pub async fn add_all(
        &self,
        conversation_id: &ConversationId,
        messages: &[ChatMessage],
    ) -> Result<(), RepositoryError> {
        self.inner.add_all_boxed(conversation_id, messages).await
    }

    pub async fn get(
        &self,
        conversation_id: &ConversationId,
        last_n: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        self.inner.get_boxed(conversation_id, last_n).await
    }

    pub async fn clear(&self, conversation_id: &ConversationId) -> Result<(), RepositoryError> {
        self.inner.clear_boxed(conversation_id).await
    }
}

impl std::fmt::Debug for BoxConversationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxConversationMemory").finish_non_exhaustive()
    }
}
