//! The parts search pipeline
//!
//! Five sequential stages behind one orchestrator:
//!
//! ```text
//! query -> understanding -> retrieval -> filtering -> ranking -> explanation -> response
//! ```
//!
//! Cross-cutting: a two-tier cache (in-process LRU + optional distributed
//! KV), circuit breakers around the LLM and the text index, and metrics with
//! latency percentiles, MRR and click tracking.

pub mod cache;
pub mod context;
pub mod engagement;
pub mod explanation;
pub mod filtering;
pub mod metrics;
pub mod orchestrator;
pub mod ranking;
pub mod redis_store;
pub mod retrieval;
pub mod understanding;

pub use cache::{CacheNamespace, CacheStats, TieredCache};
pub use context::{RequestContext, RequestIds};
pub use engagement::InMemoryEngagementProvider;
pub use explanation::{ExplanationResult, ExplanationStage};
pub use filtering::{FilterResult, FilterStage};
pub use metrics::{MetricsReport, SearchMetrics};
pub use orchestrator::{SearchOptions, SearchPipeline, SearchPipelineBuilder};
pub use ranking::{GradientSignal, RankResult, RankingStage};
pub use redis_store::RedisStore;
pub use retrieval::{RetrievalResult, RetrievalStage};
pub use understanding::{UnderstandingResult, UnderstandingStage};
