//! SQLite conversation memory implementation.
//!
//! Implements `ConversationMemory` from `heartline-core` over the
//! `chat_message` table. Appends run in a single writer transaction;
//! `clear` is a logical delete.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use heartline_core::memory::ConversationMemory;
use heartline_types::chat::{ChatMessage, ConversationId, MessageRole};
use heartline_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationMemory`.
pub struct SqliteConversationMemory {
    pool: DatabasePool,
}

impl SqliteConversationMemory {
    /// Create a new memory backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct ChatMessageRow {
    id: String,
    message_type: String,
    content: String,
    metadata: String,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            message_type: row.try_get("message_type")?,
            content: row.try_get("content")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let role: MessageRole = self
            .message_type
            .parse()
            .map_err(RepositoryError::Query)?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_str(&self.metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?;

        Ok(ChatMessage {
            id: parse_uuid(&self.id)?,
            role,
            content: self.content,
            created_at: parse_datetime(&self.created_at)?,
            metadata,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// ConversationMemory impl
// ---------------------------------------------------------------------------

impl ConversationMemory for SqliteConversationMemory {
    async fn add_all(
        &self,
        conversation_id: &ConversationId,
        messages: &[ChatMessage],
    ) -> Result<(), RepositoryError> {
        if messages.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .writer
            .begin()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let now = format_datetime(&Utc::now());
        for message in messages {
            let metadata = serde_json::to_string(&message.metadata)
                .map_err(|e| RepositoryError::Query(format!("serialize metadata: {e}")))?;

            sqlx::query(
                r#"INSERT INTO chat_message
                   (id, conversation_id, message_type, content, metadata, created_at, updated_at, is_deleted)
                   VALUES (?, ?, ?, ?, ?, ?, ?, 0)"#,
            )
            .bind(message.id.to_string())
            .bind(conversation_id.as_str())
            .bind(message.role.to_string())
            .bind(&message.content)
            .bind(&metadata)
            .bind(format_datetime(&message.created_at))
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.message().contains("UNIQUE") {
                        return RepositoryError::Conflict(format!(
                            "message {} already stored",
                            message.id
                        ));
                    }
                }
                RepositoryError::Query(e.to_string())
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tracing::debug!(
            conversation_id = %conversation_id,
            appended = messages.len(),
            "Stored chat messages"
        );
        Ok(())
    }

    async fn get(
        &self,
        conversation_id: &ConversationId,
        last_n: usize,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        if last_n == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(last_n).unwrap_or(i64::MAX);

        let rows = sqlx::query(
            r#"SELECT * FROM (
                   SELECT * FROM chat_message
                   WHERE conversation_id = ? AND is_deleted = 0
                   ORDER BY seq DESC
                   LIMIT ?
               ) ORDER BY seq ASC"#,
        )
        .bind(conversation_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ChatMessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(r.into_message()?);
        }
        Ok(messages)
    }

    async fn clear(&self, conversation_id: &ConversationId) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE chat_message SET is_deleted = 1, updated_at = ? WHERE conversation_id = ? AND is_deleted = 0",
        )
        .bind(format_datetime(&Utc::now()))
        .bind(conversation_id.as_str())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        tracing::debug!(
            conversation_id = %conversation_id,
            cleared = result.rows_affected(),
            "Cleared chat messages"
        );
        Ok(())
    }
}
