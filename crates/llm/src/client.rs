//! OpenAI-compatible chat-completions client
//!
//! Works with OpenAI, Azure-style gateways, vLLM, and local servers exposing
//! the same surface. Timeouts are enforced here and surfaced as errors, never
//! as empty strings; the orchestrator relies on that to record breaker
//! failures.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use parts_search_config::LlmSettings;
use parts_search_core::{GenerationOptions, LanguageModel, Result};

use crate::LlmError;

/// Client configuration
#[derive(Debug, Clone)]
pub struct LlmClientConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    /// Transport-level ceiling; per-call timeouts come from
    /// `GenerationOptions`
    pub request_timeout: Duration,
}

impl Default for LlmClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&LlmSettings> for LlmClientConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            api_key: std::env::var(&settings.api_key_env).ok(),
            request_timeout: Duration::from_millis(settings.timeout_ms.max(1_000) * 3),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// HTTP-backed implementation of the core `LanguageModel` trait
pub struct HttpLanguageModel {
    config: LlmClientConfig,
    client: Client,
}

impl HttpLanguageModel {
    pub fn new(config: LlmClientConfig) -> std::result::Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn complete(&self, prompt: &str, options: &GenerationOptions) -> std::result::Result<String, LlmError> {
        let request = ChatRequest {
            model: if options.model.is_empty() {
                self.config.model.clone()
            } else {
                options.model.clone()
            },
            messages: vec![ChatMessage {
                role: "user",
                content: prompt.to_string(),
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stream: false,
        };

        let mut builder = self.client.post(self.chat_url()).json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("no choices in response".to_string()))?;

        if choice.message.content.trim().is_empty() {
            return Err(LlmError::InvalidResponse("empty completion".to_string()));
        }
        Ok(choice.message.content)
    }
}

#[async_trait]
impl LanguageModel for HttpLanguageModel {
    async fn generate_content(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        let deadline = Duration::from_millis(options.timeout_ms);
        debug!(model = %self.config.model, timeout_ms = options.timeout_ms, "LLM call");

        match tokio::time::timeout(deadline, self.complete(prompt, options)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(err)) => Err(err.into()),
            Err(_) => Err(LlmError::Timeout(options.timeout_ms).into()),
        }
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn is_available(&self) -> bool {
        // A cheap reachability probe against the models listing
        let url = format!("{}/models", self.config.base_url.trim_end_matches('/'));
        let mut builder = self.client.get(url).timeout(Duration::from_secs(2));
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }
        matches!(builder.send().await, Ok(resp) if resp.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parts_search_core::SearchError;

    #[tokio::test]
    async fn test_timeout_surfaces_as_error() {
        // Reserved TEST-NET address: connection will hang until the timeout
        let model = HttpLanguageModel::new(LlmClientConfig {
            base_url: "http://192.0.2.1:9".to_string(),
            ..LlmClientConfig::default()
        })
        .unwrap();

        let options = GenerationOptions {
            timeout_ms: 50,
            ..GenerationOptions::default()
        };
        let result = model.generate_content("hello", &options).await;
        assert!(matches!(
            result,
            Err(SearchError::LlmTimeout(_)) | Err(SearchError::Llm(_))
        ));
    }

    #[test]
    fn test_chat_url_trims_trailing_slash() {
        let model = HttpLanguageModel::new(LlmClientConfig {
            base_url: "http://localhost:8000/v1/".to_string(),
            ..LlmClientConfig::default()
        })
        .unwrap();
        assert_eq!(model.chat_url(), "http://localhost:8000/v1/chat/completions");
    }
}
