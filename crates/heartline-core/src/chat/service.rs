//! Chat service: the entry point that runs user turns through the advisor chain.
//!
//! ChatService owns the assembled chain (content filter, memory, logging and
//! optional retrieval around the model call) and the memory it writes to, so
//! callers only deal in text and conversation ids.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use serde_json::json;
use tracing::{Instrument, info, info_span};

use heartline_types::chat::{ChatMessage, ConversationId};
use heartline_types::config::{DEFAULT_RETRIEVE_SIZE, GlobalConfig};
use heartline_types::error::ChatError;

use crate::advisor::{
    Advisor, AdvisedRequest, AdvisorChain, BoxAdvisor, CHAT_MEMORY_RETRIEVE_SIZE_KEY,
    ContentFilterAdvisor, LoggingAdvisor, MemoryAdvisor, ModelCall, ModelOptions,
    RetrievalAdvisor,
};
use crate::filter::ContentFilter;
use crate::llm::box_provider::BoxLlmProvider;
use crate::memory::BoxConversationMemory;
use crate::retrieval::DocumentRetriever;

/// Stream of assistant text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ChatError>> + Send + 'static>>;

/// Runs chat turns through the advisor chain.
///
/// Cheap to share behind an `Arc`; every method takes `&self` and calls for
/// different conversations run fully in parallel.
pub struct ChatService {
    chain: AdvisorChain,
    memory: BoxConversationMemory,
    system_prompt: String,
    retrieve_size: usize,
}

impl ChatService {
    pub fn builder(provider: BoxLlmProvider, memory: BoxConversationMemory) -> ChatServiceBuilder {
        ChatServiceBuilder::new(provider, memory)
    }

    /// Builder preloaded with the system prompt, filter, memory size and model
    /// options from the global configuration.
    pub fn builder_from_config(
        config: &GlobalConfig,
        provider: BoxLlmProvider,
        memory: BoxConversationMemory,
    ) -> ChatServiceBuilder {
        Self::builder(provider, memory)
            .system_prompt(config.system_prompt.clone())
            .content_filter(
                ContentFilter::from_config(&config.filter),
                config.filter.refusal_message.clone(),
            )
            .retrieve_size(config.memory.retrieve_size)
            .model_options(ModelOptions::from_settings(&config.provider))
    }

    /// Advisor names in execution order, outermost first.
    pub fn advisor_names(&self) -> Vec<String> {
        self.chain.advisor_names()
    }

    fn request(&self, message: &str, conversation_id: &ConversationId) -> AdvisedRequest {
        AdvisedRequest::new(message, conversation_id.clone(), self.system_prompt.clone())
            .with_param(CHAT_MEMORY_RETRIEVE_SIZE_KEY, json!(self.retrieve_size))
    }

    /// Answer one user turn.
    ///
    /// A content violation is not an error: the configured refusal message
    /// is returned as the answer and nothing is stored.
    pub async fn chat(
        &self,
        message: &str,
        conversation_id: &ConversationId,
    ) -> Result<String, ChatError> {
        let span = info_span!("chat", conversation_id = %conversation_id);
        async {
            let response = self.chain.call(self.request(message, conversation_id)).await?;
            if response.is_refusal() {
                info!("Chat turn refused");
            }
            Ok(response.result_text)
        }
        .instrument(span)
        .await
    }

    /// Streaming variant of [`ChatService::chat`].
    ///
    /// The exchange is stored once the stream has been fully consumed;
    /// dropping it early stores nothing.
    pub fn chat_stream(&self, message: &str, conversation_id: &ConversationId) -> TextStream {
        let span = info_span!("chat_stream", conversation_id = %conversation_id);
        let upstream = {
            let _entered = span.enter();
            self.chain.stream(self.request(message, conversation_id))
        };

        Box::pin(async_stream::try_stream! {
            let mut upstream = upstream;
            while let Some(fragment) = upstream.next().instrument(span.clone()).await {
                yield fragment?.result_text;
            }
        })
    }

    /// The last `last_n` stored messages of a conversation, oldest first.
    pub async fn history(
        &self,
        conversation_id: &ConversationId,
        last_n: usize,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        Ok(self.memory.get(conversation_id, last_n).await?)
    }

    pub async fn clear_conversation(&self, conversation_id: &ConversationId) -> Result<(), ChatError> {
        self.memory.clear(conversation_id).await?;
        info!(conversation_id = %conversation_id, "Conversation cleared");
        Ok(())
    }
}

/// Assembles a [`ChatService`].
///
/// Registration order is content filter, memory, logging, retrieval, then
/// any extra advisors; the chain sorts them by order with ties kept in that
/// sequence.
pub struct ChatServiceBuilder {
    provider: BoxLlmProvider,
    memory: BoxConversationMemory,
    system_prompt: String,
    content_filter: Option<ContentFilterAdvisor>,
    retrieve_size: usize,
    model_options: ModelOptions,
    retrieval: Option<BoxAdvisor>,
    extra: Vec<BoxAdvisor>,
}

impl ChatServiceBuilder {
    pub fn new(provider: BoxLlmProvider, memory: BoxConversationMemory) -> Self {
        Self {
            provider,
            memory,
            system_prompt: String::new(),
            content_filter: None,
            retrieve_size: DEFAULT_RETRIEVE_SIZE,
            model_options: ModelOptions::default(),
            retrieval: None,
            extra: Vec::new(),
        }
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn content_filter(mut self, filter: ContentFilter, refusal_message: impl Into<String>) -> Self {
        self.content_filter = Some(ContentFilterAdvisor::new(filter, refusal_message));
        self
    }

    pub fn retrieve_size(mut self, retrieve_size: usize) -> Self {
        self.retrieve_size = retrieve_size;
        self
    }

    pub fn model_options(mut self, model_options: ModelOptions) -> Self {
        self.model_options = model_options;
        self
    }

    pub fn retrieval<R: DocumentRetriever + 'static>(mut self, advisor: RetrievalAdvisor<R>) -> Self {
        self.retrieval = Some(BoxAdvisor::new(advisor));
        self
    }

    pub fn advisor<A: Advisor + 'static>(mut self, advisor: A) -> Self {
        self.extra.push(BoxAdvisor::new(advisor));
        self
    }

    pub fn build(self) -> ChatService {
        let mut chain = AdvisorChain::builder();
        if let Some(filter) = self.content_filter {
            chain = chain.advisor(filter);
        }
        chain = chain
            .advisor(MemoryAdvisor::new(self.memory.clone()).with_retrieve_size(self.retrieve_size))
            .advisor(LoggingAdvisor::new());
        if let Some(retrieval) = self.retrieval {
            chain = chain.boxed(retrieval);
        }
        for advisor in self.extra {
            chain = chain.boxed(advisor);
        }

        ChatService {
            chain: chain.build(ModelCall::new(self.provider, self.model_options)),
            memory: self.memory,
            system_prompt: self.system_prompt,
            retrieve_size: self.retrieve_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use heartline_types::config::RetrievalConfig;
    use heartline_types::llm::MessageRole;

    use super::*;
    use crate::advisor::{
        AdvisedResponse, AdvisedStream, CallNext, HIGHEST_PRECEDENCE, StreamNext,
    };
    use crate::memory::InMemoryConversationMemory;
    use crate::retrieval::{Document, KeywordRetriever};
    use crate::test_support::ScriptedProvider;

    const REFUSAL: &str = "Your input or the AI response contains banned content. Please revise it and try again.";

    fn service(provider: ScriptedProvider) -> ChatService {
        ChatService::builder_from_config(
            &GlobalConfig::default(),
            BoxLlmProvider::new(provider),
            BoxConversationMemory::new(InMemoryConversationMemory::new()),
        )
        .build()
    }

    fn conv(id: &str) -> ConversationId {
        ConversationId::new(id)
    }

    /// Sits between the filter and memory and rebuilds every fragment.
    struct UpperCase;

    impl Advisor for UpperCase {
        fn name(&self) -> &str {
            "UpperCase"
        }

        fn order(&self) -> i32 {
            HIGHEST_PRECEDENCE + 1
        }

        async fn around_call(
            &self,
            request: AdvisedRequest,
            next: CallNext,
        ) -> Result<AdvisedResponse, ChatError> {
            let response = next.call(request).await?;
            Ok(AdvisedResponse::new(
                response.result_text.to_uppercase(),
                response.context,
            ))
        }

        fn around_stream(&self, request: AdvisedRequest, next: StreamNext) -> AdvisedStream {
            Box::pin(next.stream(request).map(|fragment| {
                fragment.map(|f| AdvisedResponse::new(f.result_text.to_uppercase(), f.context))
            }))
        }
    }

    fn shouting_service(provider: ScriptedProvider) -> ChatService {
        ChatService::builder_from_config(
            &GlobalConfig::default(),
            BoxLlmProvider::new(provider),
            BoxConversationMemory::new(InMemoryConversationMemory::new()),
        )
        .advisor(UpperCase)
        .build()
    }

    #[test]
    fn test_default_chain_order() {
        let service = service(ScriptedProvider::replying("hi"));
        assert_eq!(
            service.advisor_names(),
            ["ContentFilterAdvisor", "MessageChatMemoryAdvisor", "LoggingAdvisor"]
        );
    }

    #[test]
    fn test_retrieval_registered_after_logging() {
        let retriever = KeywordRetriever::new(vec![Document::new("d", "talk openly")]);
        let service = ChatService::builder(
            BoxLlmProvider::new(ScriptedProvider::replying("hi")),
            BoxConversationMemory::new(InMemoryConversationMemory::new()),
        )
        .retrieval(RetrievalAdvisor::new(retriever, &RetrievalConfig::default()))
        .build();
        assert_eq!(
            service.advisor_names(),
            ["MessageChatMemoryAdvisor", "LoggingAdvisor", "QuestionAnswerAdvisor"]
        );
    }

    #[tokio::test]
    async fn test_chat_returns_answer_and_records_history() {
        let service = service(ScriptedProvider::replying("Tell me more."));

        let answer = service.chat("We keep arguing.", &conv("c1")).await.unwrap();
        assert_eq!(answer, "Tell me more.");

        let history = service.history(&conv("c1"), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, MessageRole::User);
        assert_eq!(history[0].content, "We keep arguing.");
        assert_eq!(history[1].content, "Tell me more.");
    }

    #[tokio::test]
    async fn test_banned_input_returns_refusal_without_model_call() {
        let provider = ScriptedProvider::replying("never");
        let calls = provider.calls();
        let service = service(provider);

        let answer = service.chat("I lost it all gambling", &conv("c1")).await.unwrap();
        assert_eq!(answer, REFUSAL);
        assert_eq!(calls.count(), 0);
        assert!(service.history(&conv("c1"), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_banned_output_returns_refusal_and_skips_memory() {
        let service = service(ScriptedProvider::replying("maybe try drugs"));

        let answer = service.chat("I feel stuck", &conv("c1")).await.unwrap();
        assert_eq!(answer, REFUSAL);
        assert!(service.history(&conv("c1"), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_system_prompt_sent_to_model() {
        let provider = ScriptedProvider::replying("hi");
        let calls = provider.calls();
        let service = service(provider);

        service.chat("hello", &conv("c1")).await.unwrap();
        let sent = calls.last().unwrap();
        assert!(sent.system.unwrap().contains("relationships"));
        assert_eq!(sent.model, "qwen-plus");
    }

    #[tokio::test]
    async fn test_chat_stream_yields_fragments_then_stores() {
        let service = service(ScriptedProvider::streaming(["Hello", " world"]));

        let fragments: Vec<String> = service
            .chat_stream("hi", &conv("c1"))
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, ["Hello", " world"]);

        let history = service.history(&conv("c1"), 10).await.unwrap();
        assert_eq!(history[1].content, "Hello world");
    }

    #[tokio::test]
    async fn test_clear_conversation_forgets_history() {
        let service = service(ScriptedProvider::replying("ok"));
        service.chat("hello", &conv("c1")).await.unwrap();
        service.chat("hello", &conv("c2")).await.unwrap();

        service.clear_conversation(&conv("c1")).await.unwrap();
        assert!(service.history(&conv("c1"), 10).await.unwrap().is_empty());
        assert_eq!(service.history(&conv("c2"), 10).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_chats_different_ids_are_independent() {
        let service = Arc::new(service(ScriptedProvider::replying("ok")));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = Arc::clone(&service);
                tokio::spawn(async move {
                    let id = conv(&format!("conv-{i}"));
                    service.chat(&format!("hello {i}"), &id).await.unwrap();
                    id
                })
            })
            .collect();

        for handle in handles {
            let id = handle.await.unwrap();
            let history = service.history(&id, 10).await.unwrap();
            assert_eq!(history.len(), 2);
            assert!(history[0].content.ends_with(id.as_str().trim_start_matches("conv-")));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_chats_same_id_are_serializable() {
        let service = Arc::new(service(ScriptedProvider::replying("ok")));
        let id = conv("shared");

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let service = Arc::clone(&service);
                let id = id.clone();
                tokio::spawn(async move { service.chat(&format!("q{i}"), &id).await.unwrap() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let history = service.history(&id, 100).await.unwrap();
        assert_eq!(history.len(), 20);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, MessageRole::User);
            assert_eq!(pair[1].role, MessageRole::Assistant);
        }
        let questions: HashSet<_> = history
            .iter()
            .filter(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .collect();
        assert_eq!(questions.len(), 10);
    }

    #[tokio::test]
    async fn test_fragment_rewriting_advisor_keeps_stream_storage() {
        let service = shouting_service(ScriptedProvider::streaming(["hello", " world"]));

        let fragments: Vec<String> = service
            .chat_stream("hi", &conv("c1"))
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, ["HELLO", " WORLD"]);

        let history = service.history(&conv("c1"), 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "hello world");
    }

    #[tokio::test]
    async fn test_response_rewriting_advisor_keeps_call_storage() {
        let service = shouting_service(ScriptedProvider::replying("take a breath"));

        let answer = service.chat("hi", &conv("c1")).await.unwrap();
        assert_eq!(answer, "TAKE A BREATH");

        let history = service.history(&conv("c1"), 10).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_rewriting_advisor_not_reached_on_refused_input() {
        let service = shouting_service(ScriptedProvider::streaming(["never"]));

        let fragments: Vec<String> = service
            .chat_stream("any gambling tips?", &conv("c1"))
            .map(|f| f.unwrap())
            .collect()
            .await;
        assert_eq!(fragments, [REFUSAL]);
        assert!(service.history(&conv("c1"), 10).await.unwrap().is_empty());
    }
}
