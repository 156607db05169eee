//! Conversation memory selection.
//!
//! Maps the configured [`MemoryBackend`] to a concrete store and erases it
//! behind a [`BoxConversationMemory`].

use std::path::Path;

use heartline_core::memory::{BoxConversationMemory, InMemoryConversationMemory};
use heartline_types::config::{MemoryBackend, MemoryConfig};
use heartline_types::error::RepositoryError;

use crate::filesystem::chat_memory_dir;
use crate::filesystem::memory::FileConversationMemory;
use crate::sqlite::memory::SqliteConversationMemory;
use crate::sqlite::pool::{DatabasePool, database_url};

/// Build the conversation memory described by `config`, rooted at `data_dir`.
pub async fn build_conversation_memory(
    config: &MemoryConfig,
    data_dir: &Path,
) -> Result<BoxConversationMemory, RepositoryError> {
    let memory = match config.backend {
        MemoryBackend::InMemory => BoxConversationMemory::new(InMemoryConversationMemory::new()),
        MemoryBackend::File => {
            let dir = config
                .directory
                .clone()
                .unwrap_or_else(|| chat_memory_dir(data_dir));
            BoxConversationMemory::new(FileConversationMemory::new(dir).await?)
        }
        MemoryBackend::Sqlite => {
            tokio::fs::create_dir_all(data_dir)
                .await
                .map_err(|e| RepositoryError::Io(format!("create {}: {e}", data_dir.display())))?;
            let pool = DatabasePool::new(&database_url(data_dir))
                .await
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to open chat memory database");
                    RepositoryError::Connection
                })?;
            BoxConversationMemory::new(SqliteConversationMemory::new(pool))
        }
    };

    tracing::info!(backend = %config.backend, "Conversation memory ready");
    Ok(memory)
}

#[cfg(test)]
mod tests {
    use heartline_types::chat::{ChatMessage, ConversationId};
    use tempfile::TempDir;

    use super::*;

    fn config(backend: MemoryBackend) -> MemoryConfig {
        MemoryConfig {
            backend,
            ..MemoryConfig::default()
        }
    }

    async fn exercise(memory: &BoxConversationMemory) {
        let id = ConversationId::new("factory");
        memory.add(&id, &ChatMessage::user("hello")).await.unwrap();
        let history = memory.get(&id, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "hello");
    }

    #[tokio::test]
    async fn test_build_in_memory() {
        let tmp = TempDir::new().unwrap();
        let memory = build_conversation_memory(&config(MemoryBackend::InMemory), tmp.path())
            .await
            .unwrap();
        exercise(&memory).await;
        assert!(!chat_memory_dir(tmp.path()).exists());
    }

    #[tokio::test]
    async fn test_build_file_uses_default_directory() {
        let tmp = TempDir::new().unwrap();
        let memory = build_conversation_memory(&config(MemoryBackend::File), tmp.path())
            .await
            .unwrap();
        exercise(&memory).await;
        assert!(chat_memory_dir(tmp.path()).is_dir());
    }

    #[tokio::test]
    async fn test_build_file_honours_directory_override() {
        let tmp = TempDir::new().unwrap();
        let custom = tmp.path().join("elsewhere");
        let config = MemoryConfig {
            directory: Some(custom.clone()),
            ..config(MemoryBackend::File)
        };
        let memory = build_conversation_memory(&config, tmp.path()).await.unwrap();
        exercise(&memory).await;
        assert!(custom.is_dir());
    }

    #[tokio::test]
    async fn test_build_sqlite_creates_database() {
        let tmp = TempDir::new().unwrap();
        let data_dir = tmp.path().join("nested");
        let memory = build_conversation_memory(&config(MemoryBackend::Sqlite), &data_dir)
            .await
            .unwrap();
        exercise(&memory).await;
        assert!(data_dir.join("heartline.db").exists());
    }
}
