//! Outermost advisor that refuses requests and responses containing banned terms.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tracing::warn;

use heartline_types::error::ChatError;

use super::chain::{CallNext, StreamNext};
use super::context::{AdvisedRequest, AdvisedResponse};
use super::{AdvisedStream, Advisor, HIGHEST_PRECEDENCE};
use crate::filter::ContentFilter;

const NAME: &str = "ContentFilterAdvisor";

/// Checks the user text before anything else runs and the final model text
/// after everything else has returned.
///
/// On a violation the response is replaced by the refusal message (with
/// `content_violation = true` metadata) and every commit the inner advisors
/// registered is discarded, so a refused exchange never reaches memory.
#[derive(Debug, Clone)]
pub struct ContentFilterAdvisor {
    filter: Arc<ContentFilter>,
    refusal_message: Arc<str>,
}

impl ContentFilterAdvisor {
    pub fn new(filter: ContentFilter, refusal_message: impl Into<String>) -> Self {
        Self {
            filter: Arc::new(filter),
            refusal_message: Arc::from(refusal_message.into()),
        }
    }
}

fn refuse(
    stage: &'static str,
    term: &str,
    text: &str,
    refusal_message: &str,
    context: HashMap<String, Value>,
) -> AdvisedResponse {
    warn!(advisor = NAME, stage, term, offending_text = %text, "Banned content detected");
    AdvisedResponse::refusal(refusal_message, context)
}

impl Advisor for ContentFilterAdvisor {
    fn name(&self) -> &str {
        NAME
    }

    fn order(&self) -> i32 {
        HIGHEST_PRECEDENCE
    }

    async fn around_call(
        &self,
        request: AdvisedRequest,
        next: CallNext,
    ) -> Result<AdvisedResponse, ChatError> {
        if let Some(term) = self.filter.first_match(&request.user_text) {
            return Ok(refuse(
                "input",
                term,
                &request.user_text,
                &self.refusal_message,
                request.context,
            ));
        }

        let commits = next.commits();
        let response = next.call(request).await?;

        if let Some(term) = self.filter.first_match(&response.result_text) {
            commits.discard();
            return Ok(refuse(
                "output",
                term,
                &response.result_text,
                &self.refusal_message,
                response.context,
            ));
        }
        Ok(response)
    }

    /// The whole stream is buffered before the output check, so nothing
    /// reaches the caller until the model has finished.
    fn around_stream(&self, request: AdvisedRequest, next: StreamNext) -> AdvisedStream {
        if let Some(term) = self.filter.first_match(&request.user_text) {
            let refusal = refuse(
                "input",
                term,
                &request.user_text,
                &self.refusal_message,
                request.context,
            );
            return Box::pin(futures_util::stream::once(async move { Ok(refusal) }));
        }

        let filter = Arc::clone(&self.filter);
        let refusal_message = Arc::clone(&self.refusal_message);
        let context = request.context.clone();
        let commits = next.commits();
        let upstream = next.stream(request);

        Box::pin(async_stream::try_stream! {
            let mut upstream = upstream;
            let mut buffered = Vec::new();
            while let Some(fragment) = upstream.next().await {
                buffered.push(fragment?);
            }

            let text: String = buffered.iter().map(|f| f.result_text.as_str()).collect();
            match filter.first_match(&text) {
                Some(term) => {
                    commits.discard();
                    yield refuse("output", term, &text, &refusal_message, context);
                }
                None => {
                    for fragment in buffered {
                        yield fragment;
                    }
                }
            }
        })
    }
}
