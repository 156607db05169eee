//! Request/response logging advisor.

use futures_util::StreamExt;
use tracing::info;

use heartline_types::error::ChatError;

use super::chain::{CallNext, StreamNext};
use super::context::{AdvisedRequest, AdvisedResponse};
use super::{AdvisedStream, Advisor};

const NAME: &str = "LoggingAdvisor";

/// Logs the user text going in and the assistant text coming out.
///
/// When streaming, fragments pass through untouched as they arrive and the
/// concatenated text is logged once the stream completes.
#[derive(Debug, Clone, Default)]
pub struct LoggingAdvisor;

impl LoggingAdvisor {
    pub fn new() -> Self {
        Self
    }
}

impl Advisor for LoggingAdvisor {
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
        info!(
            conversation_id = %request.conversation_id,
            request = %request.user_text,
            "AI Request"
        );
        let response = next.call(request).await?;
        info!(response = %response.result_text, "AI Response");
        Ok(response)
    }

    fn around_stream(&self, request: AdvisedRequest, next: StreamNext) -> AdvisedStream {
        info!(
            conversation_id = %request.conversation_id,
            request = %request.user_text,
            "AI Request"
        );
        let upstream = next.stream(request);

        Box::pin(async_stream::try_stream! {
            let mut upstream = upstream;
            let mut aggregated = String::new();
            while let Some(fragment) = upstream.next().await {
                let fragment = fragment?;
                aggregated.push_str(&fragment.result_text);
                yield fragment;
            }
            info!(response = %aggregated, "AI Response");
        })
    }
}
