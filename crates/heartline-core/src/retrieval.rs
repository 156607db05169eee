//! Document retrieval port and a small in-process keyword retriever.

use std::collections::HashSet;

use heartline_types::error::RepositoryError;
use heartline_types::retrieval::Passage;

/// Source of ranked passages for retrieval augmentation.
pub trait DocumentRetriever: Send + Sync {
    /// Up to `top_k` passages relevant to `query`, best first.
    fn retrieve(
        &self,
        query: &str,
        top_k: usize,
    ) -> impl std::future::Future<Output = Result<Vec<Passage>, RepositoryError>> + Send;
}

/// A document held by [`KeywordRetriever`].
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub content: String,
    tokens: HashSet<String>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let tokens = tokenize(&content).collect();
        Self {
            id: id.into(),
            content,
            tokens,
        }
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 1)
        .map(str::to_lowercase)
}

/// Ranks documents by the share of query words they contain.
///
/// Scores fall in `[0, 1]`; documents sharing no words with the query are
/// never returned.
#[derive(Debug, Clone, Default)]
pub struct KeywordRetriever {
    documents: Vec<Document>,
}

impl KeywordRetriever {
    pub fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn rank(&self, query: &str, top_k: usize) -> Vec<Passage> {
        let query_tokens: HashSet<String> = tokenize(query).collect();
        if query_tokens.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<Passage> = self
            .documents
            .iter()
            .filter_map(|doc| {
                let hits = query_tokens.intersection(&doc.tokens).count();
                (hits > 0).then(|| Passage {
                    id: doc.id.clone(),
                    content: doc.content.clone(),
                    score: hits as f32 / query_tokens.len() as f32,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        scored
    }
}

impl DocumentRetriever for KeywordRetriever {
    async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<Passage>, RepositoryError> {
        Ok(self.rank(query, top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retriever() -> KeywordRetriever {
        KeywordRetriever::new(vec![
            Document::new("listening", "Active listening helps partners feel heard."),
            Document::new("budget", "Agree on a shared budget before moving in together."),
            Document::new("in-laws", "Set boundaries with in-laws as a couple."),
        ])
    }

    #[tokio::test]
    async fn test_ranks_by_word_overlap() {
        let passages = retriever()
            .retrieve("how do partners feel heard when listening", 3)
            .await
            .unwrap();
        assert_eq!(passages[0].id, "listening");
        assert!(passages[0].score > 0.0 && passages[0].score <= 1.0);
    }

    #[tokio::test]
    async fn test_no_overlap_returns_nothing() {
        let passages = retriever().retrieve("quantum chromodynamics", 3).await.unwrap();
        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn test_top_k_limits_results() {
        let passages = retriever().retrieve("a couple budget boundaries", 1).await.unwrap();
        assert_eq!(passages.len(), 1);

        let none = retriever().retrieve("budget", 0).await.unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_matching_ignores_case() {
        let r = retriever();
        let passages = r.rank("BUDGET", 3);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].id, "budget");
    }
}
