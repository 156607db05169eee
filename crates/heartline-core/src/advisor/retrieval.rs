//! Retrieval-augmentation (question-answer) advisor.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::{Value, json};
use tracing::debug;

use heartline_types::config::RetrievalConfig;
use heartline_types::error::ChatError;
use heartline_types::retrieval::Passage;

use super::chain::{CallNext, StreamNext};
use super::context::{AdvisedRequest, AdvisedResponse};
use super::{AdvisedStream, Advisor};
use crate::retrieval::DocumentRetriever;

/// Response metadata key listing the passages used to answer.
pub const RETRIEVED_DOCUMENTS_KEY: &str = "retrieved_documents";

const NAME: &str = "QuestionAnswerAdvisor";

const CONTEXT_TEMPLATE: &str = "\n\nContext information is below, surrounded by ---------------------\n\n\
---------------------\n{context}\n---------------------\n\n\
Given the context and provided history information and not prior knowledge, \
reply to the user comment. If the answer is not in the context, inform \
the user that you can't answer the question.";

/// Looks up passages for the user text and appends them to it as context.
///
/// The passages are exposed in the response metadata under
/// [`RETRIEVED_DOCUMENTS_KEY`]. Registered after the memory advisor, so the
/// stored user turn is the original text, not the augmented one.
pub struct RetrievalAdvisor<R> {
    retriever: Arc<R>,
    top_k: usize,
    similarity_threshold: f32,
}

impl<R: DocumentRetriever + 'static> RetrievalAdvisor<R> {
    pub fn new(retriever: R, config: &RetrievalConfig) -> Self {
        Self {
            retriever: Arc::new(retriever),
            top_k: config.top_k,
            similarity_threshold: config.similarity_threshold,
        }
    }
}

async fn retrieve<R: DocumentRetriever>(
    retriever: &R,
    query: &str,
    top_k: usize,
    similarity_threshold: f32,
) -> Result<Vec<Passage>, ChatError> {
    let mut passages = retriever
        .retrieve(query, top_k)
        .await
        .map_err(|e| ChatError::Retrieval(e.to_string()))?;
    passages.retain(|p| p.score >= similarity_threshold);
    debug!(advisor = NAME, passages = passages.len(), "Retrieved passages");
    Ok(passages)
}

fn augment(user_text: &str, passages: &[Passage]) -> String {
    if passages.is_empty() {
        return user_text.to_string();
    }
    let context = passages
        .iter()
        .map(|p| p.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!("{user_text}{}", CONTEXT_TEMPLATE.replace("{context}", &context))
}

fn passages_value(passages: &[Passage]) -> Value {
    Value::Array(
        passages
            .iter()
            .map(|p| json!({ "id": p.id, "content": p.content, "score": p.score }))
            .collect(),
    )
}

impl<R: DocumentRetriever + 'static> Advisor for RetrievalAdvisor<R> {
    fn name(&self) -> &str {
        NAME
    }

    fn order(&self) -> i32 {
        0
    }

    async fn around_call(
        &self,
        request: AdvisedRequest,
        next: CallNext,
    ) -> Result<AdvisedResponse, ChatError> {
        let passages = retrieve(
            self.retriever.as_ref(),
            &request.user_text,
            self.top_k,
            self.similarity_threshold,
        )
        .await?;

        let mut request = request;
        request.user_text = augment(&request.user_text, &passages);

        let mut response = next.call(request).await?;
        response
            .metadata
            .insert(RETRIEVED_DOCUMENTS_KEY.to_string(), passages_value(&passages));
        Ok(response)
    }

    /// The passages ride on the first fragment's metadata.
    fn around_stream(&self, request: AdvisedRequest, next: StreamNext) -> AdvisedStream {
        let retriever = Arc::clone(&self.retriever);
        let top_k = self.top_k;
        let similarity_threshold = self.similarity_threshold;

        Box::pin(async_stream::try_stream! {
            let passages = retrieve(
                retriever.as_ref(),
                &request.user_text,
                top_k,
                similarity_threshold,
            )
            .await?;

            let mut request = request;
            request.user_text = augment(&request.user_text, &passages);

            let mut documents = Some(passages_value(&passages));
            let mut upstream = next.stream(request);
            while let Some(fragment) = upstream.next().await {
                let mut fragment = fragment?;
                if let Some(documents) = documents.take() {
                    fragment.metadata.insert(RETRIEVED_DOCUMENTS_KEY.to_string(), documents);
                }
                yield fragment;
            }
        })
    }
}
