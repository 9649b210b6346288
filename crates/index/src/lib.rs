//! Text-index adapter and query builders
//!
//! The retrieval stage builds boolean-query JSON trees here and executes
//! them through the `SearchEngine` trait; `ElasticsearchEngine` is the HTTP
//! implementation against a real cluster.

pub mod client;
pub mod query;

pub use client::ElasticsearchEngine;
pub use query::{build_query, normalize_part_number, select_strategy, Strategy};

use thiserror::Error;

/// Index adapter errors
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl From<reqwest::Error> for IndexError {
    fn from(err: reqwest::Error) -> Self {
        IndexError::Network(err.to_string())
    }
}

impl From<IndexError> for parts_search_core::SearchError {
    fn from(err: IndexError) -> Self {
        parts_search_core::SearchError::Engine(err.to_string())
    }
}
