//! File-backed conversation memory.
//!
//! One JSON document per conversation under a single directory. File names
//! are the SHA-256 of the conversation id, so any id is a safe file name.
//! Every operation on a conversation holds that conversation's async lock;
//! writes go to a temp file that is renamed over the original.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use heartline_core::memory::ConversationMemory;
use heartline_types::chat::{ChatMessage, ConversationId};
use heartline_types::error::RepositoryError;

#[derive(Debug, Serialize, Deserialize)]
struct ConversationFile {
    conversation_id: ConversationId,
    messages: Vec<ChatMessage>,
}

/// Conversation memory persisted as JSON files.
#[derive(Debug)]
pub struct FileConversationMemory {
    dir: PathBuf,
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl FileConversationMemory {
    /// Open (creating if needed) a memory directory.
    pub async fn new(dir: impl Into<PathBuf>) -> Result<Self, RepositoryError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| RepositoryError::Io(format!("create {}: {e}", dir.display())))?;
        Ok(Self {
            dir,
            locks: DashMap::new(),
        })
    }

    fn path_for(&self, conversation_id: &ConversationId) -> PathBuf {
        let digest = Sha256::digest(conversation_id.as_str().as_bytes());
        self.dir.join(format!("{:x}.json", digest))
    }

    fn lock_for(&self, conversation_id: &ConversationId) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation_id.clone())
            .or_default()
            .value()
            .clone()
    }

    /// Give back a lock taken with `lock_for`, forgetting it when no other
    /// operation holds it.
    fn release(&self, conversation_id: &ConversationId, lock: Arc<Mutex<()>>) {
        drop(lock);
        self.locks
            .remove_if(conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn append(
        &self,
        conversation_id: &ConversationId,
        messages: &[ChatMessage],
    ) -> Result<(), RepositoryError> {
        let path = self.path_for(conversation_id);
        let mut stored = read_messages(&path).await?;
        stored.extend_from_slice(messages);
        let file = ConversationFile {
            conversation_id: conversation_id.clone(),
            messages: stored,
        };
        write_messages(&path, &file).await?;

        tracing::debug!(
            conversation_id = %conversation_id,
            appended = messages.len(),
            total = file.messages.len(),
            "Conversation file updated"
        );
        Ok(())
    }

    async fn remove(&self, conversation_id: &ConversationId) -> Result<(), RepositoryError> {
        let path = self.path_for(conversation_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RepositoryError::Io(format!("remove {}: {e}", path.display()))),
        }
    }
}

async fn read_messages(path: &Path) -> Result<Vec<ChatMessage>, RepositoryError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RepositoryError::Io(format!("read {}: {e}", path.display()))),
    };
    let file: ConversationFile = serde_json::from_slice(&bytes)
        .map_err(|e| RepositoryError::Query(format!("corrupt {}: {e}", path.display())))?;
    Ok(file.messages)
}

async fn write_messages(path: &Path, file: &ConversationFile) -> Result<(), RepositoryError> {
    let json = serde_json::to_vec_pretty(file)
        .map_err(|e| RepositoryError::Query(format!("serialize conversation: {e}")))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(|e| RepositoryError::Io(format!("write {}: {e}", tmp.display())))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| RepositoryError::Io(format!("rename {}: {e}", path.display())))?;
    Ok(())
}

impl ConversationMemory for FileConversationMemory {
    async fn add_all(
        &self,
        conversation_id: &ConversationId,
        messages: &[ChatMessage],
    ) -> Result<(), RepositoryError> {
        if messages.is_empty() {
            return Ok(());
        }
        let lock = self.lock_for(conversation_id);
        let result = {
            let _guard = lock.lock().await;
            self.append(conversation_id, messages).await
        };
        self.release(conversation_id, lock);
        result
    }

    async fn get(
        &self,
        conversation_id: &ConversationId,
        last_n: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let lock = self.lock_for(conversation_id);
        let result = {
            let _guard = lock.lock().await;
            read_messages(&self.path_for(conversation_id)).await
        };
        self.release(conversation_id, lock);

        let mut messages = result?;
        let start = messages.len().saturating_sub(last_n);
        Ok(messages.split_off(start))
    }

    async fn clear(&self, conversation_id: &ConversationId) -> Result<(), RepositoryError> {
        let lock = self.lock_for(conversation_id);
        let result = {
            let _guard = lock.lock().await;
            self.remove(conversation_id).await
        };
        self.release(conversation_id, lock);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn memory() -> (TempDir, FileConversationMemory) {
        let tmp = TempDir::new().unwrap();
        let memory = FileConversationMemory::new(tmp.path().join("chat-memory"))
            .await
            .unwrap();
        (tmp, memory)
    }

    fn conv(id: &str) -> ConversationId {
        ConversationId::new(id)
    }

    #[tokio::test]
    async fn test_add_get_roundtrip() {
        let (_tmp, memory) = memory().await;
        let m1 = ChatMessage::user("hi");
        let m2 = ChatMessage::assistant("hello");
        memory.add(&conv("c1"), &m1).await.unwrap();
        memory.add(&conv("c1"), &m2).await.unwrap();

        let history = memory.get(&conv("c1"), 10).await.unwrap();
        assert_eq!(history, vec![m1, m2]);
    }

    #[tokio::test]
    async fn test_persists_across_instances() {
        let (tmp, memory) = memory().await;
        memory
            .add(&conv("c1"), &ChatMessage::user("remember me"))
            .await
            .unwrap();
        drop(memory);

        let reopened = FileConversationMemory::new(tmp.path().join("chat-memory"))
            .await
            .unwrap();
        let history = reopened.get(&conv("c1"), 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "remember me");
    }

    #[tokio::test]
    async fn test_get_last_n() {
        let (_tmp, memory) = memory().await;
        let messages: Vec<_> = (0..5).map(|i| ChatMessage::user(format!("m{i}"))).collect();
        memory.add_all(&conv("c1"), &messages).await.unwrap();

        let history = memory.get(&conv("c1"), 2).await.unwrap();
        let contents: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["m3", "m4"]);
        assert!(memory.get(&conv("c1"), 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_and_clear() {
        let (_tmp, memory) = memory().await;
        assert!(memory.get(&conv("nobody"), 10).await.unwrap().is_empty());
        memory.clear(&conv("nobody")).await.unwrap();

        memory.add(&conv("c1"), &ChatMessage::user("x")).await.unwrap();
        memory.clear(&conv("c1")).await.unwrap();
        assert!(memory.get(&conv("c1"), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ids_with_path_characters_are_safe() {
        let (tmp, memory) = memory().await;
        let id = conv("../../etc/passwd");
        memory.add(&id, &ChatMessage::user("x")).await.unwrap();

        let path = memory.path_for(&id);
        assert!(path.starts_with(tmp.path().join("chat-memory")));
        assert_eq!(memory.get(&id, 10).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_appends_lose_nothing() {
        let (_tmp, memory) = memory().await;
        let memory = Arc::new(memory);

        let handles: Vec<_> = (0..12)
            .map(|i| {
                let memory = Arc::clone(&memory);
                tokio::spawn(async move {
                    let pair = [
                        ChatMessage::user(format!("q{i}")),
                        ChatMessage::assistant(format!("a{i}")),
                    ];
                    memory.add_all(&conv("shared"), &pair).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let history = memory.get(&conv("shared"), 100).await.unwrap();
        assert_eq!(history.len(), 24);
        assert!(memory.locks.is_empty());
        for pair in history.chunks(2) {
            assert_eq!(
                pair[0].content.trim_start_matches('q'),
                pair[1].content.trim_start_matches('a')
            );
        }
    }

    #[tokio::test]
    async fn test_locks_are_forgotten_after_use() {
        let (_tmp, memory) = memory().await;
        for i in 0..5 {
            let id = conv(&format!("c{i}"));
            memory.add(&id, &ChatMessage::user("x")).await.unwrap();
            memory.get(&id, 10).await.unwrap();
        }
        assert!(memory.locks.is_empty());

        memory.clear(&conv("c0")).await.unwrap();
        assert!(memory.locks.is_empty());
    }

    #[tokio::test]
    async fn test_held_lock_survives_release() {
        let (_tmp, memory) = memory().await;
        let id = conv("c1");
        let held = memory.lock_for(&id);

        memory.add(&id, &ChatMessage::user("x")).await.unwrap();
        assert_eq!(memory.locks.len(), 1);
        let again = memory.lock_for(&id);
        assert!(Arc::ptr_eq(&held, &again));

        memory.release(&id, again);
        memory.release(&id, held);
        assert!(memory.locks.is_empty());
    }
}
