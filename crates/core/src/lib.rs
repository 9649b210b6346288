//! Core traits and types for the parts search pipeline
//!
//! This crate provides foundational types used across all other crates:
//! - The `Intent` / `Candidate` / `SearchResponse` data model
//! - Capability traits for pluggable backends (search engine, LLM, KV store)
//! - Circuit breakers protecting external dependencies
//! - Error types and the per-request analytics log entry

pub mod breaker;
pub mod candidate;
pub mod error;
pub mod intent;
pub mod log;
pub mod response;
pub mod traits;

pub use breaker::{BreakerConfig, BreakerRegistry, BreakerRole, BreakerSnapshot, BreakerState, CircuitBreaker};
pub use candidate::{Candidate, Feature, FeatureVector, PartRecord, RankWeights, VehicleFitment};
pub use error::{ErrorCode, Result, SearchError};
pub use intent::{Intent, Position, SearchType};
pub use log::SearchLogEntry;
pub use response::{
    ExplanationBlock, Highlights, MatchReason, Pagination, ReasonWeight, ResponseMeta, ResultItem,
    SearchResponse, Suggestion, Timing, Understanding, UnderstandingMethod,
};
pub use traits::{
    Engagement, EngagementProvider, EngineHit, EngineRequest, EngineResponse, GenerationOptions,
    LanguageModel, KeyValueStore, NeutralEngagement, NoopKeyValueStore, NoopListener,
    PipelineListener, SearchEngine,
};
