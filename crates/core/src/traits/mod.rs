//! Capability traits for pluggable backends
//!
//! The pipeline consumes its external dependencies through these narrow
//! contracts, so every one of them can be swapped for an in-process mock in
//! tests or a `Noop` implementation when disabled by configuration:
//!
//! - `SearchEngine`: the text index (Elasticsearch-role)
//! - `LanguageModel`: LLM text generation for query understanding
//! - `KeyValueStore`: the optional distributed L2 cache
//! - `EngagementProvider`: click/purchase rates for ranking
//! - `PipelineListener`: observer hooks around the orchestrator

mod engagement;
mod engine;
mod kv;
mod listener;
mod llm;

pub use engagement::{Engagement, EngagementProvider, NeutralEngagement};
pub use engine::{EngineHit, EngineRequest, EngineResponse, SearchEngine};
pub use kv::{KeyValueStore, NoopKeyValueStore};
pub use listener::{NoopListener, PipelineListener};
pub use llm::{GenerationOptions, LanguageModel};
