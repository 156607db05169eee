use thiserror::Error;

use crate::llm::LlmError;

/// Errors from repository operations (used by trait definitions in heartline-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors surfaced by a chat call.
///
/// A content violation is not represented here: it produces a refusal
/// response rather than an error.
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("memory store failure: {0}")]
    Memory(#[from] RepositoryError),

    #[error("model invocation failed: {0}")]
    Model(#[from] LlmError),

    #[error("retrieval failed: {0}")]
    Retrieval(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_chat_error_from_repository() {
        let err: ChatError = RepositoryError::Connection.into();
        assert!(matches!(err, ChatError::Memory(RepositoryError::Connection)));
        assert_eq!(err.to_string(), "memory store failure: database connection error");
    }

    #[test]
    fn test_chat_error_from_llm() {
        let err: ChatError = LlmError::AuthenticationFailed.into();
        assert!(matches!(err, ChatError::Model(LlmError::AuthenticationFailed)));
    }
}
