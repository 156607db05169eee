//! Configuration and per-provider defaults for OpenAI-compatible endpoints.
//!
//! Each endpoint that speaks the OpenAI chat completions protocol gets a
//! factory returning an [`OpenAiCompatConfig`] with the correct base URL.

use secrecy::SecretString;

/// Base URL of the OpenAI API.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Base URL of Alibaba DashScope's OpenAI-compatible mode (Qwen models).
pub const DASHSCOPE_BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

/// Configuration for an OpenAI-compatible provider.
///
/// Used to construct an [`super::OpenAiCompatibleProvider`].
pub struct OpenAiCompatConfig {
    /// Human-readable provider name (e.g., "openai", "dashscope").
    pub provider_name: String,
    /// Base URL for the API.
    pub base_url: String,
    pub api_key: SecretString,
    /// Model used when a request leaves its model empty.
    pub model: String,
}

/// OpenAI default configuration.
pub fn openai_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "openai".into(),
        base_url: OPENAI_BASE_URL.into(),
        api_key,
        model: model.into(),
    }
}

/// DashScope default configuration (e.g. `qwen-plus`).
pub fn dashscope_defaults(api_key: SecretString, model: &str) -> OpenAiCompatConfig {
    OpenAiCompatConfig {
        provider_name: "dashscope".into(),
        base_url: DASHSCOPE_BASE_URL.into(),
        api_key,
        model: model.into(),
    }
}
