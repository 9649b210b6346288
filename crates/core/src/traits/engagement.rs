//! Engagement lookup for ranking features

use serde::{Deserialize, Serialize};

/// Click and purchase rates for one part, both in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Engagement {
    pub click: f64,
    pub purchase: f64,
}

impl Engagement {
    /// Neutral prior used when a part has no engagement history
    pub const NEUTRAL: Engagement = Engagement {
        click: 0.5,
        purchase: 0.5,
    };
}

impl Default for Engagement {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Source of engagement rates, keyed by part id
///
/// Lookups are synchronous: implementations are expected to serve from an
/// in-process map refreshed out of band.
pub trait EngagementProvider: Send + Sync {
    fn engagement(&self, part_id: &str) -> Engagement;
}

/// Default provider returning the neutral prior for every part
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralEngagement;

impl EngagementProvider for NeutralEngagement {
    fn engagement(&self, _part_id: &str) -> Engagement {
        Engagement::NEUTRAL
    }
}
