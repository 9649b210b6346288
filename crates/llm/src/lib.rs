//! LLM integration for query understanding
//!
//! Provides:
//! - `HttpLanguageModel`: an OpenAI-compatible chat-completions client
//!   implementing the core `LanguageModel` trait
//! - the deterministic intent-extraction prompt
//! - JSON extraction from free-form LLM output

pub mod client;
pub mod prompt;

pub use client::{HttpLanguageModel, LlmClientConfig};
pub use prompt::{build_intent_prompt, extract_json_object, looks_like_intent};

use thiserror::Error;

/// LLM adapter errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        LlmError::Network(err.to_string())
    }
}

impl From<LlmError> for parts_search_core::SearchError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Timeout(ms) => parts_search_core::SearchError::LlmTimeout(ms),
            other => parts_search_core::SearchError::Llm(other.to_string()),
        }
    }
}
