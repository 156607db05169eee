//! Global configuration types for Heartline.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! system prompt, the content filter, the memory backend and the model
//! provider. Every field has a default so an empty file is valid.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default number of history messages replayed into each request.
pub const DEFAULT_RETRIEVE_SIZE: usize = 10;

const DEFAULT_SYSTEM_PROMPT: &str = "Act as an expert in the psychology of romantic relationships. \
Open by introducing yourself and let the user know they can share their relationship troubles. \
Ask questions around three situations: for single users, ask about widening their social circle \
and the difficulties of pursuing someone they like; for users in a relationship, ask about \
conflicts caused by communication and differing habits; for married users, ask about family \
responsibilities and dealing with relatives. Guide the user to describe what happened, how the \
other person reacted and what they themselves think, so you can offer a tailored solution.";

const DEFAULT_REFUSAL_MESSAGE: &str =
    "Your input or the AI response contains banned content. Please revise it and try again.";

/// Top-level configuration for Heartline.
///
/// Loaded from `~/.heartline/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// System prompt sent with every request.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub provider: ProviderSettings,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            filter: FilterConfig::default(),
            memory: MemoryConfig::default(),
            provider: ProviderSettings::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

/// Banned-term list and the refusal that replaces violating content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_banned_words")]
    pub banned_words: Vec<String>,

    #[serde(default = "default_refusal_message")]
    pub refusal_message: String,
}

fn default_banned_words() -> Vec<String> {
    ["violence", "pornography", "gambling", "drugs", "fraud"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_refusal_message() -> String {
    DEFAULT_REFUSAL_MESSAGE.to_string()
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            banned_words: default_banned_words(),
            refusal_message: default_refusal_message(),
        }
    }
}

/// Which conversation memory implementation backs the chat service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackend {
    InMemory,
    #[default]
    File,
    Sqlite,
}

impl fmt::Display for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryBackend::InMemory => write!(f, "in_memory"),
            MemoryBackend::File => write!(f, "file"),
            MemoryBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl FromStr for MemoryBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "memory" => Ok(MemoryBackend::InMemory),
            "file" => Ok(MemoryBackend::File),
            "sqlite" => Ok(MemoryBackend::Sqlite),
            other => Err(format!("invalid memory backend: '{other}'")),
        }
    }
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackend,

    /// How many of the most recent messages are replayed per request.
    #[serde(default = "default_retrieve_size")]
    pub retrieve_size: usize,

    /// Override for the file backend's directory (defaults to `{data_dir}/chat-memory`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_retrieve_size() -> usize {
    DEFAULT_RETRIEVE_SIZE
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: MemoryBackend::default(),
            retrieve_size: default_retrieve_size(),
            directory: None,
        }
    }
}

/// Model provider settings for the OpenAI-compatible client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Provider name; "openai" and "dashscope" have built-in base URLs.
    #[serde(default = "default_provider_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

fn default_provider_name() -> String {
    "dashscope".to_string()
}

fn default_model() -> String {
    "qwen-plus".to_string()
}

fn default_api_key_env() -> String {
    "DASHSCOPE_API_KEY".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            temperature: None,
        }
    }
}

/// Retrieval-augmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Passages scoring below this are discarded.
    #[serde(default)]
    pub similarity_threshold: f32,

    /// Directory of `.md`/`.txt` documents to answer from. Retrieval is
    /// disabled when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_dir: Option<PathBuf>,
}

fn default_top_k() -> usize {
    4
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            similarity_threshold: 0.0,
            documents_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_default_values() {
        let config = GlobalConfig::default();
        assert_eq!(config.memory.retrieve_size, 10);
        assert_eq!(config.memory.backend, MemoryBackend::File);
        assert_eq!(config.filter.banned_words.len(), 5);
        assert_eq!(config.provider.name, "dashscope");
        assert_eq!(config.retrieval.top_k, 4);
        assert!(config.system_prompt.contains("relationships"));
    }

    #[test]
    fn test_global_config_deserialize_with_defaults() {
        let config: GlobalConfig = toml::from_str("").unwrap();
        assert_eq!(config.memory.retrieve_size, DEFAULT_RETRIEVE_SIZE);
        assert_eq!(config.filter.refusal_message, DEFAULT_REFUSAL_MESSAGE);
        assert_eq!(config.provider.api_key_env, "DASHSCOPE_API_KEY");
    }

    #[test]
    fn test_global_config_deserialize_with_values() {
        let toml_str = r#"
system_prompt = "You are a kind listener."

[filter]
banned_words = ["spoiler"]
refusal_message = "Nope."

[memory]
backend = "sqlite"
retrieve_size = 4

[provider]
name = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
temperature = 0.3

[retrieval]
documents_dir = "/srv/heartline/docs"
"#;
        let config: GlobalConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.system_prompt, "You are a kind listener.");
        assert_eq!(config.filter.banned_words, vec!["spoiler".to_string()]);
        assert_eq!(config.filter.refusal_message, "Nope.");
        assert_eq!(config.memory.backend, MemoryBackend::Sqlite);
        assert_eq!(config.memory.retrieve_size, 4);
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.temperature, Some(0.3));
        // Unspecified fields in a present section still default
        assert_eq!(config.provider.max_tokens, 2048);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(
            config.retrieval.documents_dir,
            Some(PathBuf::from("/srv/heartline/docs"))
        );
    }

    #[test]
    fn test_memory_backend_roundtrip() {
        for backend in [MemoryBackend::InMemory, MemoryBackend::File, MemoryBackend::Sqlite] {
            let parsed: MemoryBackend = backend.to_string().parse().unwrap();
            assert_eq!(parsed, backend);
        }
        assert!("redis".parse::<MemoryBackend>().is_err());
    }
}
