//! The response envelope
//!
//! Every search, success or failure, returns the same envelope shape.
//! Failures carry human-readable `error` text plus a stable `errorCode` and
//! never leak adapter internals.

use serde::{Deserialize, Serialize};

use crate::candidate::{Candidate, FeatureVector, PartRecord, VehicleFitment};
use crate::error::SearchError;
use crate::intent::{Intent, SearchType};

/// How the intent was obtained by query understanding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnderstandingMethod {
    /// Served from the intent cache
    #[serde(rename = "cache")]
    Cache,
    /// Token parser only
    #[serde(rename = "token")]
    Token,
    /// Token parser merged with LLM output
    #[serde(rename = "hybrid")]
    Hybrid,
    /// LLM was attempted but failed; token output used
    #[serde(rename = "token-fallback")]
    TokenFallback,
    /// Nothing produced (empty query)
    #[serde(rename = "none")]
    #[default]
    None,
}

impl UnderstandingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnderstandingMethod::Cache => "cache",
            UnderstandingMethod::Token => "token",
            UnderstandingMethod::Hybrid => "hybrid",
            UnderstandingMethod::TokenFallback => "token-fallback",
            UnderstandingMethod::None => "none",
        }
    }
}

/// The understanding block of the response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Understanding {
    pub intent: Intent,
    pub method: UnderstandingMethod,
    pub confidence: f64,
    pub search_type: SearchType,
}

/// Strength tag on a match reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasonWeight {
    High,
    Medium,
    Low,
}

/// Why a particular result matched the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReason {
    /// Stable reason key (e.g. `exact-part-number`, `vehicle-fitment`)
    pub reason: String,
    /// Human-readable sentence
    pub text: String,
    pub weight: ReasonWeight,
}

/// Query-term highlights within a result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Highlights {
    /// The matched span of the part number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    /// A window around the first matching term in the description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Highlights {
    pub fn is_empty(&self) -> bool {
        self.part_number.is_none() && self.description.is_none()
    }
}

/// A refinement or cross-sell suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    /// Suggestion kind: `refine`, `add-vehicle`, `add-brand`, `add-position`,
    /// `add-year`, `related-category`
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable suggestion text
    pub text: String,
    /// Machine-usable refinement term, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
}

impl Suggestion {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            term: None,
        }
    }

    pub fn with_term(mut self, term: impl Into<String>) -> Self {
        self.term = Some(term.into());
        self
    }
}

/// The explanation block of the response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationBlock {
    /// One sentence describing how the query was interpreted
    pub interpretation: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<Suggestion>,
}

/// One ranked result in the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub id: String,
    pub rank: usize,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub stock: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vehicle_fitments: Vec<VehicleFitment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cross_references: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub oem_references: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub match_reasons: Vec<MatchReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<Highlights>,
    #[serde(rename = "_source")]
    pub source: PartRecord,
    #[serde(rename = "_features")]
    pub features: FeatureVector,
}

impl ResultItem {
    /// Project a ranked candidate into the response shape
    pub fn from_candidate(candidate: &Candidate) -> Self {
        let source = &candidate.source;
        Self {
            id: candidate.id.clone(),
            rank: candidate.rank,
            score: candidate.rank_score,
            part_number: source.part_number.clone(),
            brand: source.brand.clone(),
            category: source.category.clone(),
            description: source.description.clone(),
            price: source.effective_price(),
            stock: source.stock_quantity(),
            image_url: source.image_url.clone(),
            vehicle_fitments: source.vehicle_fitments.clone(),
            cross_references: source.cross_references.clone(),
            oem_references: source.oem_references.clone(),
            match_reasons: Vec::new(),
            highlights: None,
            source: source.clone(),
            features: candidate.features,
        }
    }
}

/// Pagination block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, total: usize) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            page,
            limit,
            total,
            total_pages,
            has_more: page < total_pages,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Per-stage timings in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timing {
    pub total: u64,
    pub understanding: u64,
    pub retrieval: u64,
    pub filtering: u64,
    pub ranking: u64,
    pub explanation: u64,
}

/// Response metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMeta {
    pub request_id: String,
    pub experiment_group: String,
    /// `cache` when the full response was served from cache, `hit` when the
    /// intent came from cache, `miss` otherwise
    pub cache_status: String,
}

/// The search response envelope
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub success: bool,
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub understanding: Option<Understanding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<ExplanationBlock>,
    pub results: Vec<ResultItem>,
    pub pagination: Pagination,
    pub timing: Timing,
    pub meta: ResponseMeta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl SearchResponse {
    /// Structured failure envelope; results empty, pagination zeroed
    pub fn failure(query: impl Into<String>, error: &SearchError, request_id: impl Into<String>) -> Self {
        Self {
            success: false,
            query: query.into(),
            understanding: None,
            explanation: None,
            results: Vec::new(),
            pagination: Pagination::empty(),
            timing: Timing::default(),
            meta: ResponseMeta {
                request_id: request_id.into(),
                experiment_group: String::new(),
                cache_status: "miss".to_string(),
            },
            error: Some(error.public_message()),
            error_code: Some(error.code().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_math() {
        let p = Pagination::new(1, 20, 45);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_more);

        let last = Pagination::new(3, 20, 45);
        assert!(!last.has_more);

        let empty = Pagination::new(1, 20, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_more);
    }

    #[test]
    fn test_failure_envelope() {
        let resp = SearchResponse::failure("   ", &SearchError::InvalidQuery, "req-1");
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("Empty query"));
        assert_eq!(resp.error_code.as_deref(), Some("INVALID_QUERY"));
        assert_eq!(resp.pagination.total, 0);
        assert_eq!(resp.pagination.total_pages, 0);
        assert!(resp.results.is_empty());
    }

    #[test]
    fn test_result_item_wire_shape() {
        let record = PartRecord {
            part_number: Some("GDB1330".into()),
            brand: Some("TRW".into()),
            stock: Some(4),
            ..PartRecord::default()
        };
        let mut candidate = Candidate::new("p-1", 7.5, record);
        candidate.rank = 1;
        candidate.rank_score = 0.83;

        let item = ResultItem::from_candidate(&candidate);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["partNumber"], "GDB1330");
        assert_eq!(json["rank"], 1);
        assert!(json.get("_source").is_some());
        assert!(json.get("_features").is_some());
    }

    #[test]
    fn test_method_wire_names() {
        assert_eq!(
            serde_json::to_string(&UnderstandingMethod::TokenFallback).unwrap(),
            "\"token-fallback\""
        );
    }
}
