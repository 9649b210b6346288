//! Error types shared across the pipeline
//!
//! Every stage converts its internal failures into `SearchError` before the
//! orchestrator boundary. Recoverable degradations (LLM outage, L2 cache
//! failure) are absorbed by the owning stage and never surface here.

use thiserror::Error;

/// Result alias used throughout the workspace
pub type Result<T> = std::result::Result<T, SearchError>;

/// Pipeline errors
#[derive(Error, Debug, Clone)]
pub enum SearchError {
    /// Query was empty or unusable after normalization
    #[error("Empty query")]
    InvalidQuery,

    /// Query understanding failed outright (token parser never fails on
    /// non-empty input, so this is reserved for internal misuse)
    #[error("Understanding error: {0}")]
    Understanding(String),

    /// Retrieval failed terminally (engine error with no cached shortcut)
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Text-index adapter failure
    #[error("Index error: {0}")]
    Engine(String),

    /// LLM adapter failure
    #[error("LLM error: {0}")]
    Llm(String),

    /// LLM call timed out
    #[error("LLM timeout after {0}ms")]
    LlmTimeout(u64),

    /// Circuit breaker denied the call
    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),

    /// L2 cache operation failed (logged and swallowed by the cache layer)
    #[error("Cache error: {0}")]
    Cache(String),

    /// Schema validation rejected the value in strict mode
    #[error("Validation error: {0}")]
    Validation(String),

    /// A stage exceeded its deadline
    #[error("Stage '{stage}' timed out after {elapsed_ms}ms")]
    StageTimeout { stage: &'static str, elapsed_ms: u64 },

    /// Configuration error surfaced at startup
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Unhandled internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable error codes carried on the failure envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub &'static str);

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        self.0
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl SearchError {
    /// Machine-readable code for the response envelope
    pub fn code(&self) -> ErrorCode {
        ErrorCode(match self {
            SearchError::InvalidQuery => "INVALID_QUERY",
            SearchError::Understanding(_) => "UNDERSTANDING_ERROR",
            SearchError::Retrieval(_) | SearchError::Engine(_) | SearchError::CircuitOpen(_) => {
                "SEARCH_ERROR"
            }
            SearchError::Llm(_) | SearchError::LlmTimeout(_) => "LLM_ERROR",
            SearchError::Cache(_) => "CACHE_ERROR",
            SearchError::Validation(_) => "VALIDATION_ERROR",
            SearchError::StageTimeout { .. } => "STAGE_TIMEOUT",
            SearchError::Configuration(_) => "CONFIG_ERROR",
            SearchError::Internal(_) => "INTERNAL_ERROR",
        })
    }

    /// True for errors the orchestrator reports as a client-side problem
    pub fn is_client_error(&self) -> bool {
        matches!(self, SearchError::InvalidQuery)
    }

    /// Human-readable text safe for the response envelope. Never leaks
    /// adapter internals, prompts, or stack traces.
    pub fn public_message(&self) -> String {
        match self {
            SearchError::InvalidQuery => "Empty query".to_string(),
            SearchError::Retrieval(_) | SearchError::Engine(_) | SearchError::CircuitOpen(_) => {
                "Search is temporarily unavailable".to_string()
            }
            SearchError::StageTimeout { stage, .. } => format!("Search stage '{stage}' timed out"),
            _ => "Search failed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(SearchError::InvalidQuery.code(), ErrorCode("INVALID_QUERY"));
        assert_eq!(SearchError::Engine("down".into()).code().as_str(), "SEARCH_ERROR");
        assert_eq!(SearchError::CircuitOpen("index".into()).code().as_str(), "SEARCH_ERROR");
        assert_eq!(SearchError::LlmTimeout(3000).code().as_str(), "LLM_ERROR");
        assert_eq!(SearchError::InvalidQuery.code().to_string(), "INVALID_QUERY");
    }

    #[test]
    fn test_public_message_hides_internals() {
        let err = SearchError::Engine("connection refused to 10.0.0.3:9200".into());
        assert!(!err.public_message().contains("9200"));
    }
}
