//! In-memory engagement provider
//!
//! Backs the `clickRate`/`purchaseRate` ranking features. Rates start at the
//! neutral prior and are nudged by feedback events; a real store can replace
//! this behind the same trait without touching the ranking stage.

use dashmap::DashMap;

use parts_search_core::{Engagement, EngagementProvider};

/// Step applied per feedback event
const FEEDBACK_STEP: f64 = 0.1;

#[derive(Debug, Default)]
pub struct InMemoryEngagementProvider {
    rates: DashMap<String, Engagement>,
}

impl InMemoryEngagementProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the rates for a part (e.g. from a batch import)
    pub fn set_rates(&self, part_id: &str, engagement: Engagement) {
        self.rates.insert(part_id.to_string(), engagement);
    }

    /// Nudge the click rate toward 1.0
    pub fn record_click(&self, part_id: &str) {
        let mut entry = self.rates.entry(part_id.to_string()).or_default();
        entry.click = (entry.click + FEEDBACK_STEP).min(1.0);
    }

    /// Nudge the purchase rate toward 1.0
    pub fn record_purchase(&self, part_id: &str) {
        let mut entry = self.rates.entry(part_id.to_string()).or_default();
        entry.purchase = (entry.purchase + FEEDBACK_STEP).min(1.0);
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

impl EngagementProvider for InMemoryEngagementProvider {
    fn engagement(&self, part_id: &str) -> Engagement {
        self.rates
            .get(part_id)
            .map(|e| *e)
            .unwrap_or(Engagement::NEUTRAL)
    }
}
