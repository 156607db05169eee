//! Retrieval types shared between the retrieval advisor and its backends.

use serde::{Deserialize, Serialize};

/// A ranked passage returned by a document retriever.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: String,
    pub content: String,
    /// Similarity score in `[0, 1]`, higher is more relevant.
    pub score: f32,
}
