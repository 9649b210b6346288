//! Text-search engine contract

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One search request against the text index
///
/// `query` is a boolean-query JSON tree built by the retrieval strategies
/// (`bool` / `term` / `terms` / `prefix` / `fuzzy` / `match` / `multi_match`
/// / `range` primitives).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineRequest {
    /// Index name to search
    pub index: String,
    /// Boolean-query tree
    pub query: serde_json::Value,
    /// Maximum hits to return
    pub size: usize,
    /// Minimum relevance threshold, when enforced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_score: Option<f64>,
    /// Engine-side timeout in milliseconds
    pub timeout_ms: u64,
}

/// One hit from the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_score")]
    pub score: f64,
    #[serde(rename = "_source")]
    pub source: serde_json::Value,
}

/// Engine response, reduced to what the pipeline reads
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineResponse {
    pub hits: Vec<EngineHit>,
    pub total: Option<u64>,
}

/// The text-index adapter the retrieval stage talks to
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute one boolean search
    async fn search(&self, request: EngineRequest) -> Result<EngineResponse>;

    /// Cheap health probe, used by readiness checks
    async fn is_available(&self) -> bool {
        true
    }
}
