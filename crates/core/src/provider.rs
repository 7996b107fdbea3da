//! Provider trait — the abstraction over LLM backends.
//!
//! The orchestrator treats the model as a stateless `chat(messages, options)
//! -> text` capability. The returned text is untrusted: it may or may not
//! contain JSON, and callers must go through [`crate::json`] to read it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// Per-call options for a chat completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    /// The model to use (e.g., "anthropic/claude-sonnet-4", "gpt-4o")
    pub model: String,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ChatOptions {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// The core Provider trait.
///
/// Every LLM backend implements this trait. The agent loop, classifier and
/// planner call `chat()` without knowing which backend is behind it. A
/// provider handle is built once at process entry and passed down
/// explicitly; there is no global client cache.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openrouter").
    fn name(&self) -> &str;

    /// Send the messages and return the raw completion text.
    async fn chat(
        &self,
        messages: &[Message],
        options: &ChatOptions,
    ) -> std::result::Result<String, ProviderError>;
}
