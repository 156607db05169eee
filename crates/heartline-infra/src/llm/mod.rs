//! Chat model provider implementations.
//!
//! Contains the OpenAI-compatible implementation of the [`LlmProvider`]
//! trait defined in `heartline-core`, plus a factory ([`create_provider`])
//! that builds the configured provider and erases it behind a
//! [`BoxLlmProvider`].
//!
//! [`LlmProvider`]: heartline_core::llm::provider::LlmProvider

pub mod openai_compat;

use secrecy::SecretString;

use heartline_core::llm::box_provider::BoxLlmProvider;
use heartline_types::config::ProviderSettings;
use heartline_types::llm::LlmError;

use self::openai_compat::OpenAiCompatibleProvider;
use self::openai_compat::config::OpenAiCompatConfig;

/// Create a [`BoxLlmProvider`] from [`ProviderSettings`].
///
/// An explicit `base_url` always wins. Otherwise the provider name picks a
/// built-in endpoint ("openai" or "dashscope").
///
/// # Errors
///
/// Returns [`LlmError::InvalidRequest`] for an unknown provider name with no
/// `base_url`.
pub fn create_provider(
    settings: &ProviderSettings,
    api_key: SecretString,
) -> Result<BoxLlmProvider, LlmError> {
    let provider = match settings.base_url.as_deref() {
        Some(base_url) => OpenAiCompatibleProvider::new(OpenAiCompatConfig {
            provider_name: settings.name.clone(),
            base_url: base_url.to_string(),
            api_key,
            model: settings.model.clone(),
        }),
        None => match settings.name.as_str() {
            "openai" => OpenAiCompatibleProvider::openai(api_key, &settings.model),
            "dashscope" => OpenAiCompatibleProvider::dashscope(api_key, &settings.model),
            other => {
                return Err(LlmError::InvalidRequest(format!(
                    "unknown provider '{other}': set provider.base_url for custom endpoints"
                )));
            }
        },
    };

    tracing::debug!(provider = %settings.name, model = %settings.model, "Model provider created");
    Ok(BoxLlmProvider::new(provider))
}

/// Read the API key from the environment variable named in `settings`.
///
/// # Errors
///
/// Returns [`LlmError::AuthenticationFailed`] when the variable is unset or
/// empty.
pub fn api_key_from_env(settings: &ProviderSettings) -> Result<SecretString, LlmError> {
    match std::env::var(&settings.api_key_env) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
        _ => {
            tracing::warn!(var = %settings.api_key_env, "API key environment variable not set");
            Err(LlmError::AuthenticationFailed)
        }
    }
}
