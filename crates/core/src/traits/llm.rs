//! LLM contract for query understanding

use async_trait::async_trait;

use crate::error::Result;

/// Generation parameters for one LLM call
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOptions {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// Hard deadline; the adapter must surface expiry as an error, never as
    /// an empty string
    pub timeout_ms: u64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            temperature: 0.1,
            timeout_ms: 3_000,
        }
    }
}

/// Text-generation backend consumed by query understanding
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for the prompt. Cancellable via the configured
    /// timeout; a timeout is an error, not empty output.
    async fn generate_content(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    fn model_name(&self) -> &str;

    async fn is_available(&self) -> bool {
        true
    }
}
