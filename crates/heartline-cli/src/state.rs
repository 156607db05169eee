//! Application state wiring configuration, memory and the chat service.
//!
//! Memory is opened eagerly because every command needs it. The chat
//! service (and with it the API key) is only required by `chat`.

use std::path::PathBuf;

use anyhow::Context;

use heartline_core::advisor::RetrievalAdvisor;
use heartline_core::chat::ChatService;
use heartline_core::memory::BoxConversationMemory;
use heartline_infra::config::load_global_config;
use heartline_infra::filesystem::documents::load_documents;
use heartline_infra::filesystem::resolve_data_dir;
use heartline_infra::llm::{api_key_from_env, create_provider};
use heartline_infra::memory::build_conversation_memory;
use heartline_types::config::GlobalConfig;

/// Shared state for CLI commands.
pub struct AppState {
    pub config: GlobalConfig,
    pub data_dir: PathBuf,
    pub memory: BoxConversationMemory,
}

impl AppState {
    /// Resolve the data directory, load `config.toml` and open memory.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;
        let memory = build_conversation_memory(&config.memory, &data_dir)
            .await
            .context("opening conversation memory")?;

        Ok(Self {
            config,
            data_dir,
            memory,
        })
    }

    /// Build the chat service: provider from the configured API key, plus
    /// the retrieval advisor when a documents directory is configured.
    pub async fn chat_service(&self) -> anyhow::Result<ChatService> {
        let settings = &self.config.provider;
        let api_key = api_key_from_env(settings).with_context(|| {
            format!(
                "{} is not set. Export your {} API key first",
                settings.api_key_env, settings.name
            )
        })?;
        let provider = create_provider(settings, api_key)?;

        let mut builder = ChatService::builder_from_config(&self.config, provider, self.memory.clone());
        if let Some(ref dir) = self.config.retrieval.documents_dir {
            let retriever = load_documents(dir)
                .await
                .with_context(|| format!("loading documents from {}", dir.display()))?;
            builder = builder.retrieval(RetrievalAdvisor::new(retriever, &self.config.retrieval));
        }

        Ok(builder.build())
    }
}
