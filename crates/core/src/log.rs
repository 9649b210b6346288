//! Per-request analytics log entry
//!
//! Emitted once per search for downstream analytics persistence. The shape is
//! a stable contract; field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candidate::RankWeights;
use crate::intent::Intent;
use crate::response::UnderstandingMethod;

/// One search, flattened for the analytics sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLogEntry {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub raw_query: String,
    pub parsed_intent: Intent,
    pub parse_method: UnderstandingMethod,
    pub parse_time_ms: u64,
    pub parse_confidence: f64,
    /// Which retrieval strategy produced the candidates
    pub retrieval_source: String,
    pub candidate_count: usize,
    pub retrieval_time_ms: u64,
    pub pre_filter_count: usize,
    pub post_filter_count: usize,
    pub filters_applied: Vec<String>,
    pub filter_time_ms: u64,
    pub ranking_method: String,
    pub weights: RankWeights,
    pub rank_time_ms: u64,
    pub result_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_result_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_result_score: Option<f64>,
    pub total_time_ms: u64,
}
