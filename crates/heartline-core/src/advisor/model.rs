//! Terminal stage of the chain: the chat-model invocation.

use futures_util::StreamExt;
use serde_json::json;
use tracing::{Instrument, debug, info_span};

use heartline_types::chat::ChatMessage;
use heartline_types::config::ProviderSettings;
use heartline_types::error::ChatError;
use heartline_types::llm::{CompletionRequest, Message, MessageRole, StopReason, StreamEvent, Usage};

use super::AdvisedStream;
use super::context::{AdvisedRequest, AdvisedResponse};
use crate::llm::box_provider::BoxLlmProvider;

/// Per-request model parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl ModelOptions {
    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self {
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
        }
    }
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self::from_settings(&ProviderSettings::default())
    }
}

/// Builds a `CompletionRequest` from the advised request and hands it to
/// the provider.
#[derive(Debug)]
pub struct ModelCall {
    provider: BoxLlmProvider,
    options: ModelOptions,
}

impl ModelCall {
    pub fn new(provider: BoxLlmProvider, options: ModelOptions) -> Self {
        Self { provider, options }
    }

    /// History messages first, then the user turn. The system prompt
    /// travels separately.
    fn build_request(&self, request: &AdvisedRequest, stream: bool) -> CompletionRequest {
        let mut messages: Vec<Message> = request
            .messages
            .iter()
            .map(ChatMessage::to_llm_message)
            .collect();
        messages.push(Message {
            role: MessageRole::User,
            content: request.user_text.clone(),
        });

        CompletionRequest {
            model: self.options.model.clone(),
            messages,
            system: (!request.system_prompt.is_empty()).then(|| request.system_prompt.clone()),
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            stream,
        }
    }

    pub async fn call(&self, request: AdvisedRequest) -> Result<AdvisedResponse, ChatError> {
        let completion = self.build_request(&request, false);
        let span = info_span!(
            "chat_model",
            provider = %self.provider.name(),
            model = %completion.model,
            messages = completion.messages.len(),
        );

        let response = self.provider.complete(&completion).instrument(span).await?;

        debug!(
            stop_reason = %response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Model call completed"
        );

        Ok(with_completion_metadata(
            AdvisedResponse::new(response.content, request.context),
            &response.model,
            Some(response.stop_reason),
            Some(&response.usage),
        ))
    }

    /// Stream text deltas as response fragments. The span stays attached to
    /// every poll of the provider stream until it ends.
    ///
    /// Each fragment is held until the next delta arrives so that the last
    /// one can carry the same completion metadata as [`ModelCall::call`].
    pub fn stream(&self, request: AdvisedRequest) -> AdvisedStream {
        let completion = self.build_request(&request, true);
        let span = info_span!(
            "chat_model.stream",
            provider = %self.provider.name(),
            model = %completion.model,
            messages = completion.messages.len(),
        );
        let model = completion.model.clone();
        let events = self.provider.stream(completion);
        let context = request.context;

        Box::pin(async_stream::try_stream! {
            let mut events = events;
            let mut pending: Option<AdvisedResponse> = None;
            let mut stop_reason = None;
            let mut usage = None;

            while let Some(event) = events.next().instrument(span.clone()).await {
                let event = match event {
                    Ok(event) => event,
                    Err(e) => {
                        if let Some(fragment) = pending.take() {
                            yield fragment;
                        }
                        Err::<StreamEvent, _>(ChatError::from(e))?
                    }
                };
                match event {
                    StreamEvent::TextDelta { text } => {
                        if text.is_empty() {
                            continue;
                        }
                        let next = AdvisedResponse::new(text, context.clone());
                        if let Some(fragment) = pending.replace(next) {
                            yield fragment;
                        }
                    }
                    StreamEvent::MessageDelta { stop_reason: reason } => {
                        debug!(parent: &span, stop_reason = %reason, "Model stream finishing");
                        stop_reason = Some(reason);
                    }
                    StreamEvent::Usage(reported) => {
                        debug!(
                            parent: &span,
                            input_tokens = reported.input_tokens,
                            output_tokens = reported.output_tokens,
                            "Model stream usage"
                        );
                        usage = Some(reported);
                    }
                    StreamEvent::Done => break,
                    StreamEvent::Connected => {}
                }
            }

            if let Some(fragment) = pending.take() {
                yield with_completion_metadata(fragment, &model, stop_reason, usage.as_ref());
            }
        })
    }
}

fn with_completion_metadata(
    response: AdvisedResponse,
    model: &str,
    stop_reason: Option<StopReason>,
    usage: Option<&Usage>,
) -> AdvisedResponse {
    let mut response = response.with_metadata("model", json!(model));
    if let Some(stop_reason) = stop_reason {
        response = response.with_metadata("stop_reason", json!(stop_reason.to_string()));
    }
    if let Some(usage) = usage {
        response = response.with_metadata(
            "usage",
            json!({
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
            }),
        );
    }
    response
}
