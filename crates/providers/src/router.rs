//! Provider construction from configuration.
//!
//! There is exactly one provider handle per process. It is built here at
//! entry and passed down to the orchestrator explicitly.

use std::sync::Arc;
use stepwise_config::AppConfig;
use stepwise_core::error::ProviderError;
use stepwise_core::provider::Provider;
use tracing::info;

use crate::openai_compat::OpenAiCompatProvider;

/// Build the configured default provider.
///
/// The key comes from the provider's own section, falling back to the
/// top-level `api_key`. Local endpoints run without a key; hosted ones
/// fail with [`ProviderError::NotConfigured`].
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let name = config.default_provider.as_str();
    let section = config.providers.get(name);

    let base_url = section
        .and_then(|p| p.api_url.clone())
        .unwrap_or_else(|| default_base_url(name));

    let api_key = match section
        .and_then(|p| p.api_key.clone())
        .or_else(|| config.api_key.clone())
    {
        Some(key) => key,
        None if is_local(name) => "local".into(),
        None => {
            return Err(ProviderError::NotConfigured(format!(
                "no API key for provider '{name}' (set STEPWISE_API_KEY or api_key in config.toml)"
            )));
        }
    };

    info!(provider = name, base_url = %base_url, "Provider configured");
    Ok(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key)?))
}

/// The model to request: the provider section's default, else the global one.
pub fn resolve_model(config: &AppConfig) -> String {
    config
        .providers
        .get(&config.default_provider)
        .and_then(|p| p.default_model.clone())
        .unwrap_or_else(|| config.default_model.clone())
}

fn is_local(provider_name: &str) -> bool {
    matches!(provider_name, "ollama" | "vllm" | "llamacpp" | "llama.cpp")
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "fireworks" => "https://api.fireworks.ai/inference/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
