//! Application state
//!
//! Shared state across all handlers. Everything is explicitly constructed in
//! `main` and owned here; there is no module-level singleton.

use std::sync::Arc;

use parts_search_pipeline::{InMemoryEngagementProvider, SearchPipeline};

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// The assembled search pipeline
    pub pipeline: Arc<SearchPipeline>,
    /// Engagement store fed by the feedback endpoint
    pub engagement: Arc<InMemoryEngagementProvider>,
}

impl AppState {
    pub fn new(pipeline: Arc<SearchPipeline>, engagement: Arc<InMemoryEngagementProvider>) -> Self {
        Self {
            pipeline,
            engagement,
        }
    }
}
