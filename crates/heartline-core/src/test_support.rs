//! Scripted model provider shared by the unit tests in this crate.

use std::pin::Pin;
use std::sync::{Arc, Mutex};

use futures_util::Stream;

use heartline_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, StopReason, StreamEvent, Usage,
};

use crate::advisor::{ModelCall, ModelOptions};
use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::provider::LlmProvider;

/// Spy handle onto the requests a `ScriptedProvider` received.
#[derive(Clone, Default)]
pub struct CallLog {
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
}

impl CallLog {
    pub fn count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<CompletionRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn record(&self, request: &CompletionRequest) {
        self.requests.lock().unwrap().push(request.clone());
    }
}

enum Reply {
    Chunks(Vec<String>),
    ChunksThenFail(Vec<String>),
    Fail,
}

pub struct ScriptedProvider {
    reply: Reply,
    log: CallLog,
}

impl ScriptedProvider {
    pub fn replying(text: &str) -> Self {
        Self::streaming([text])
    }

    pub fn streaming<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reply: Reply::Chunks(chunks.into_iter().map(Into::into).collect()),
            log: CallLog::default(),
        }
    }

    pub fn streaming_then_fail<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reply: Reply::ChunksThenFail(chunks.into_iter().map(Into::into).collect()),
            log: CallLog::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: Reply::Fail,
            log: CallLog::default(),
        }
    }

    pub fn calls(&self) -> CallLog {
        self.log.clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.log.record(request);
        match &self.reply {
            Reply::Chunks(chunks) => Ok(CompletionResponse {
                id: "scripted-1".to_string(),
                content: chunks.concat(),
                model: request.model.clone(),
                stop_reason: StopReason::EndTurn,
                usage: Usage::default(),
            }),
            Reply::ChunksThenFail(_) | Reply::Fail => Err(LlmError::Provider {
                message: "scripted failure".to_string(),
            }),
        }
    }

    fn stream(
        &self,
        request: CompletionRequest,
    ) -> Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send + 'static>> {
        self.log.record(&request);
        let (chunks, fail) = match &self.reply {
            Reply::Chunks(chunks) => (chunks.clone(), false),
            Reply::ChunksThenFail(chunks) => (chunks.clone(), true),
            Reply::Fail => (Vec::new(), true),
        };
        Box::pin(async_stream::stream! {
            yield Ok(StreamEvent::Connected);
            for text in chunks {
                yield Ok(StreamEvent::TextDelta { text });
            }
            if fail {
                yield Err(LlmError::Stream("scripted failure".to_string()));
            } else {
                yield Ok(StreamEvent::MessageDelta { stop_reason: StopReason::EndTurn });
                yield Ok(StreamEvent::Done);
            }
        })
    }
}

pub fn model_call(provider: ScriptedProvider) -> ModelCall {
    ModelCall::new(BoxLlmProvider::new(provider), ModelOptions::default())
}
