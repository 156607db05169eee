//! Conversation memory advisor.

use std::collections::HashMap;

use futures_util::StreamExt;
use serde_json::Value;
use tracing::debug;

use heartline_types::chat::{ChatMessage, ConversationId};
use heartline_types::config::DEFAULT_RETRIEVE_SIZE;
use heartline_types::error::ChatError;

use super::chain::{CallNext, StreamNext};
use super::context::{AdvisedRequest, AdvisedResponse};
use super::retrieval::RETRIEVED_DOCUMENTS_KEY;
use super::{AdvisedStream, Advisor, HIGHEST_PRECEDENCE};
use crate::memory::BoxConversationMemory;

/// Context key overriding how many history messages are replayed.
pub const CHAT_MEMORY_RETRIEVE_SIZE_KEY: &str = "chat_memory_response_size";

const NAME: &str = "MessageChatMemoryAdvisor";

/// Runs just inside the content filter.
const ORDER: i32 = HIGHEST_PRECEDENCE + 1000;

/// Replays recent history into the request and records the exchange.
///
/// The user turn is captured before any inner advisor rewrites it. The
/// user/assistant pair is appended as a single deferred commit, so it is
/// written only when the whole chain succeeds and the response is not
/// replaced by a refusal. The assistant message keeps the response
/// metadata except the retrieved passages.
#[derive(Debug, Clone)]
pub struct MemoryAdvisor {
    memory: BoxConversationMemory,
    default_retrieve_size: usize,
}

impl MemoryAdvisor {
    pub fn new(memory: BoxConversationMemory) -> Self {
        Self {
            memory,
            default_retrieve_size: DEFAULT_RETRIEVE_SIZE,
        }
    }

    pub fn with_retrieve_size(mut self, retrieve_size: usize) -> Self {
        self.default_retrieve_size = retrieve_size;
        self
    }

    fn retrieve_size(&self, request: &AdvisedRequest) -> usize {
        request
            .param_usize(CHAT_MEMORY_RETRIEVE_SIZE_KEY)
            .unwrap_or(self.default_retrieve_size)
    }
}

async fn load_history(
    memory: &BoxConversationMemory,
    request: &mut AdvisedRequest,
    retrieve_size: usize,
) -> Result<(), ChatError> {
    let mut history = memory.get(&request.conversation_id, retrieve_size).await?;
    debug!(
        conversation_id = %request.conversation_id,
        loaded = history.len(),
        retrieve_size,
        "Replaying conversation history"
    );
    history.append(&mut request.messages);
    request.messages = history;
    Ok(())
}

/// Response metadata worth keeping on the stored assistant message.
fn stored_metadata(mut metadata: HashMap<String, Value>) -> HashMap<String, Value> {
    metadata.remove(RETRIEVED_DOCUMENTS_KEY);
    metadata
}

async fn commit_exchange(
    memory: BoxConversationMemory,
    conversation_id: ConversationId,
    exchange: [ChatMessage; 2],
) -> Result<(), ChatError> {
    memory.add_all(&conversation_id, &exchange).await?;
    debug!(conversation_id = %conversation_id, "Conversation exchange stored");
    Ok(())
}

impl Advisor for MemoryAdvisor {
    fn name(&self) -> &str {
        NAME
    }

    fn order(&self) -> i32 {
        ORDER
    }

    async fn around_call(
        &self,
        request: AdvisedRequest,
        next: CallNext,
    ) -> Result<AdvisedResponse, ChatError> {
        let retrieve_size = self.retrieve_size(&request);
        let mut request = request;
        load_history(&self.memory, &mut request, retrieve_size).await?;

        let conversation_id = request.conversation_id.clone();
        let user_message = ChatMessage::user(request.user_text.clone());

        let commits = next.commits();
        let response = next.call(request).await?;
        if response.is_refusal() {
            return Ok(response);
        }

        let assistant_message = ChatMessage::assistant(response.result_text.clone())
            .with_metadata(stored_metadata(response.metadata.clone()));
        commits.defer(commit_exchange(
            self.memory.clone(),
            conversation_id,
            [user_message, assistant_message],
        ));
        Ok(response)
    }

    /// Fragments are forwarded as they arrive. The commit is registered
    /// once the inner stream ends.
    fn around_stream(&self, request: AdvisedRequest, next: StreamNext) -> AdvisedStream {
        let memory = self.memory.clone();
        let retrieve_size = self.retrieve_size(&request);
        let commits = next.commits();

        Box::pin(async_stream::try_stream! {
            let mut request = request;
            load_history(&memory, &mut request, retrieve_size).await?;

            let conversation_id = request.conversation_id.clone();
            let user_message = ChatMessage::user(request.user_text.clone());

            let mut upstream = next.stream(request);
            let mut aggregated = String::new();
            let mut metadata = HashMap::new();
            let mut refused = false;
            while let Some(fragment) = upstream.next().await {
                let fragment = fragment?;
                refused |= fragment.is_refusal();
                aggregated.push_str(&fragment.result_text);
                metadata.extend(fragment.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
                yield fragment;
            }

            if !refused {
                let assistant_message =
                    ChatMessage::assistant(aggregated).with_metadata(stored_metadata(metadata));
                commits.defer(commit_exchange(
                    memory,
                    conversation_id,
                    [user_message, assistant_message],
                ));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use heartline_types::config::RetrievalConfig;
    use heartline_types::llm::MessageRole;

    use super::*;
    use crate::advisor::{AdvisorChain, ContentFilterAdvisor, RetrievalAdvisor};
    use crate::filter::ContentFilter;
    use crate::memory::InMemoryConversationMemory;
    use crate::memory::store::ConversationMemory;
    use crate::retrieval::{Document, KeywordRetriever};
    use crate::test_support::{ScriptedProvider, model_call};

    fn conv() -> ConversationId {
        ConversationId::new("c1")
    }

    fn request(text: &str) -> AdvisedRequest {
        AdvisedRequest::new(text, conv(), "sys")
    }

    fn setup(provider: ScriptedProvider) -> (Arc<InMemoryConversationMemory>, AdvisorChain) {
        let store = Arc::new(InMemoryConversationMemory::new());
        let chain = AdvisorChain::builder()
            .advisor(ContentFilterAdvisor::new(
                ContentFilter::new(["fraud"]),
                "refused",
            ))
            .advisor(MemoryAdvisor::new(BoxConversationMemory::from_arc(Arc::clone(&store))))
            .build(model_call(provider));
        (store, chain)
    }

    #[tokio::test]
    async fn test_exchange_appended_after_call() {
        let (store, chain) = setup(ScriptedProvider::replying("hello back"));

        chain.call(request("hello")).await.unwrap();

        let history = store.get(&conv(), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].role, MessageRole::Assistant);
        assert_eq!(history[1].content, "hello back");
    }

    #[tokio::test]
    async fn test_history_replayed_into_next_request() {
        let provider = ScriptedProvider::replying("noted");
        let calls = provider.calls();
        let (_store, chain) = setup(provider);

        chain.call(request("first")).await.unwrap();
        chain.call(request("second")).await.unwrap();

        let sent = calls.last().unwrap();
        let contents: Vec<_> = sent.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "noted", "second"]);
    }

    #[tokio::test]
    async fn test_retrieve_size_override_from_context() {
        let provider = ScriptedProvider::replying("ok");
        let calls = provider.calls();
        let (store, chain) = setup(provider);
        for i in 0..3 {
            store
                .add(&conv(), &ChatMessage::user(format!("old {i}")))
                .await
                .unwrap();
        }

        let request = request("new").with_param(CHAT_MEMORY_RETRIEVE_SIZE_KEY, json!(1));
        chain.call(request).await.unwrap();

        let sent = calls.last().unwrap();
        let contents: Vec<_> = sent.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["old 2", "new"]);
    }

    #[tokio::test]
    async fn test_refused_output_not_appended() {
        let (store, chain) = setup(ScriptedProvider::replying("commit fraud"));

        let response = chain.call(request("help")).await.unwrap();
        assert_eq!(response.result_text, "refused");
        assert!(store.get(&conv(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refused_input_not_appended() {
        let (store, chain) = setup(ScriptedProvider::replying("fine"));

        chain.call(request("fraud please")).await.unwrap();
        assert!(store.get(&conv(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_leaves_memory_untouched() {
        let (store, chain) = setup(ScriptedProvider::failing());

        assert!(chain.call(request("hello")).await.is_err());
        assert!(store.get(&conv(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_appends_aggregated_text() {
        let (store, chain) = setup(ScriptedProvider::streaming(["Hello", " world"]));

        let texts: Vec<String> = chain
            .stream(request("hi"))
            .map(|f| f.unwrap().result_text)
            .collect()
            .await;
        assert_eq!(texts, ["Hello", " world"]);

        let history = store.get(&conv(), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "Hello world");
    }

    #[tokio::test]
    async fn test_stream_refusal_not_appended() {
        let (store, chain) = setup(ScriptedProvider::streaming(["fr", "aud"]));

        let texts: Vec<String> = chain
            .stream(request("hi"))
            .map(|f| f.unwrap().result_text)
            .collect()
            .await;
        assert_eq!(texts, ["refused"]);
        assert!(store.get(&conv(), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stream_failure_mid_way_leaves_no_partial_write() {
        let (store, chain) = setup(ScriptedProvider::streaming_then_fail(["partial"]));

        let results: Vec<_> = chain.stream(request("hi")).collect().await;
        assert!(results.iter().any(Result::is_err));
        assert!(store.get(&conv(), 10).await.unwrap().is_empty());
    }

    fn with_retrieval(provider: ScriptedProvider) -> (Arc<InMemoryConversationMemory>, AdvisorChain) {
        let store = Arc::new(InMemoryConversationMemory::new());
        let knowledge = KeywordRetriever::new(vec![Document::new(
            "listening",
            "Reflect back what your partner said before replying.",
        )]);
        let chain = AdvisorChain::builder()
            .advisor(MemoryAdvisor::new(BoxConversationMemory::from_arc(Arc::clone(&store))))
            .advisor(RetrievalAdvisor::new(knowledge, &RetrievalConfig::default()))
            .build(model_call(provider));
        (store, chain)
    }

    fn assert_stored_metadata(message: &ChatMessage) {
        assert_eq!(message.metadata.get("stop_reason"), Some(&json!("end_turn")));
        assert!(message.metadata.contains_key("model"));
        assert!(!message.metadata.contains_key(RETRIEVED_DOCUMENTS_KEY));
    }

    #[tokio::test]
    async fn test_call_stores_metadata_without_passages() {
        let (store, chain) = with_retrieval(ScriptedProvider::replying("try listening"));

        let response = chain.call(request("my partner never listens")).await.unwrap();
        assert!(response.metadata.contains_key(RETRIEVED_DOCUMENTS_KEY));

        let history = store.get(&conv(), 10).await.unwrap();
        assert_eq!(history[0].content, "my partner never listens");
        assert_stored_metadata(&history[1]);
    }

    #[tokio::test]
    async fn test_stream_stores_same_metadata_as_call() {
        let (store, chain) = with_retrieval(ScriptedProvider::streaming(["try", " listening"]));

        let results: Vec<_> = chain.stream(request("my partner never listens")).collect().await;
        assert!(results.iter().all(Result::is_ok));

        let history = store.get(&conv(), 10).await.unwrap();
        assert_eq!(history[1].content, "try listening");
        assert_stored_metadata(&history[1]);
    }
}
