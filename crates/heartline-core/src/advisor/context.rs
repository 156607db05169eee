//! Request and response values that flow through the advisor chain.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;

use heartline_types::chat::{ChatMessage, ConversationId};
use heartline_types::error::ChatError;

/// Metadata key set on responses produced by the content filter.
pub const CONTENT_VIOLATION_KEY: &str = "content_violation";

/// A side effect an advisor wants applied only if the chain completes
/// successfully (e.g. appending the exchange to memory).
pub type DeferredCommit = Pin<Box<dyn Future<Output = Result<(), ChatError>> + Send + 'static>>;

/// Commits registered during one pass through the chain.
///
/// Every continuation of a single `call` or `stream` shares one collector,
/// so commits never travel inside responses or stream fragments and survive
/// any advisor that rebuilds them. The chain applies the collected commits
/// once the outermost advisor has returned or the outermost stream has
/// ended. Only [`PendingCommits::discard`] drops them, which the content
/// filter does when it replaces the response with a refusal.
#[derive(Clone, Default)]
pub struct PendingCommits {
    commits: Arc<Mutex<Vec<DeferredCommit>>>,
}

impl PendingCommits {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DeferredCommit>> {
        self.commits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a side effect to run after the whole chain succeeds.
    pub fn defer(&self, commit: impl Future<Output = Result<(), ChatError>> + Send + 'static) {
        self.lock().push(Box::pin(commit));
    }

    /// Drop every commit registered so far.
    pub fn discard(&self) {
        let dropped = std::mem::take(&mut *self.lock()).len();
        if dropped > 0 {
            debug!(dropped, "Discarded pending commits");
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Await the registered commits in registration order.
    pub(crate) async fn apply(&self) -> Result<(), ChatError> {
        let commits = std::mem::take(&mut *self.lock());
        for commit in commits {
            commit.await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for PendingCommits {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCommits")
            .field("len", &self.len())
            .finish()
    }
}

/// The request as it travels inward through the chain.
#[derive(Debug, Clone)]
pub struct AdvisedRequest {
    /// Text of the user's turn. Advisors may rewrite it on the way in.
    pub user_text: String,
    pub conversation_id: ConversationId,
    pub system_prompt: String,
    /// Prior messages sent to the model before the user turn.
    pub messages: Vec<ChatMessage>,
    /// Per-request parameters shared by all advisors.
    pub context: HashMap<String, Value>,
}

impl AdvisedRequest {
    pub fn new(
        user_text: impl Into<String>,
        conversation_id: ConversationId,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            user_text: user_text.into(),
            conversation_id,
            system_prompt: system_prompt.into(),
            messages: Vec::new(),
            context: HashMap::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Read a non-negative integer parameter from the context.
    pub fn param_usize(&self, key: &str) -> Option<usize> {
        self.context
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
    }
}

/// The response (or one streamed fragment of it) as it travels outward.
#[derive(Debug, Clone)]
pub struct AdvisedResponse {
    pub result_text: String,
    pub metadata: HashMap<String, Value>,
    pub context: HashMap<String, Value>,
}

impl AdvisedResponse {
    pub fn new(result_text: impl Into<String>, context: HashMap<String, Value>) -> Self {
        Self {
            result_text: result_text.into(),
            metadata: HashMap::new(),
            context,
        }
    }

    /// The fixed reply returned in place of violating content.
    pub fn refusal(message: impl Into<String>, context: HashMap<String, Value>) -> Self {
        Self::new(message, context).with_metadata(CONTENT_VIOLATION_KEY, Value::Bool(true))
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn is_refusal(&self) -> bool {
        self.metadata.get(CONTENT_VIOLATION_KEY) == Some(&Value::Bool(true))
    }
}
