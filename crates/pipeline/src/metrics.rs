//! Pipeline metrics
//!
//! Counters are atomics; latency histograms are bounded sample rings behind
//! an RwLock (writers take the exclusive lock for a push, the stats report
//! takes a shared lock and sorts a copy). Quality gauges cover MRR, average
//! result count, and clicks by position.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parts_search_config::constants::metrics as bounds;
use parts_search_core::response::Timing;
use parts_search_core::SearchLogEntry;

/// Bounded ring of latency samples (milliseconds)
struct Ring {
    samples: Vec<u64>,
    next: usize,
    capacity: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity.min(1024)),
            next: 0,
            capacity,
        }
    }

    fn push(&mut self, value: u64) {
        if self.samples.len() < self.capacity {
            self.samples.push(value);
        } else {
            self.samples[self.next] = value;
            self.next = (self.next + 1) % self.capacity;
        }
    }

    fn percentiles(&self) -> LatencySummary {
        if self.samples.is_empty() {
            return LatencySummary::default();
        }
        let mut sorted = self.samples.clone();
        sorted.sort_unstable();
        let pick = |p: f64| {
            let rank = ((p / 100.0) * sorted.len() as f64).ceil() as usize;
            sorted[rank.clamp(1, sorted.len()) - 1]
        };
        LatencySummary {
            p50: pick(50.0),
            p95: pick(95.0),
            p99: pick(99.0),
            samples: sorted.len(),
        }
    }
}

/// Percentiles for one stage
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LatencySummary {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub samples: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecentSearch {
    query: String,
    result_count: usize,
    success: bool,
    total_time_ms: u64,
}

/// Counter block of the report
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterReport {
    pub total_searches: u64,
    pub successful_searches: u64,
    pub failed_searches: u64,
    pub zero_result_searches: u64,
    pub llm_fallbacks: u64,
    pub clicks: u64,
    pub purchases: u64,
}

/// Latency block of the report
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyReport {
    pub understanding: LatencySummary,
    pub retrieval: LatencySummary,
    pub filtering: LatencySummary,
    pub ranking: LatencySummary,
    pub explanation: LatencySummary,
    pub total: LatencySummary,
}

/// Quality block of the report
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityReport {
    /// Mean reciprocal rank of first clicks
    pub mrr: f64,
    pub mrr_samples: u64,
    pub avg_result_count: f64,
    /// Clicks by result position, 1-indexed positions 1..=20
    pub clicks_by_position: Vec<u64>,
}

/// The full stats report served by `GET /metrics`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub counters: CounterReport,
    pub latency: LatencyReport,
    pub quality: QualityReport,
    pub recent_sample_size: usize,
}

/// Process-wide pipeline metrics
pub struct SearchMetrics {
    total_searches: AtomicU64,
    successful_searches: AtomicU64,
    failed_searches: AtomicU64,
    zero_result_searches: AtomicU64,
    llm_fallbacks: AtomicU64,
    clicks: AtomicU64,
    purchases: AtomicU64,
    result_count_sum: AtomicU64,

    understanding: RwLock<Ring>,
    retrieval: RwLock<Ring>,
    filtering: RwLock<Ring>,
    ranking: RwLock<Ring>,
    explanation: RwLock<Ring>,
    total: RwLock<Ring>,

    mrr_sum: Mutex<f64>,
    mrr_count: AtomicU64,
    clicks_by_position: Vec<AtomicU64>,

    recent: Mutex<VecDeque<RecentSearch>>,
}

impl SearchMetrics {
    pub fn new() -> Self {
        Self {
            total_searches: AtomicU64::new(0),
            successful_searches: AtomicU64::new(0),
            failed_searches: AtomicU64::new(0),
            zero_result_searches: AtomicU64::new(0),
            llm_fallbacks: AtomicU64::new(0),
            clicks: AtomicU64::new(0),
            purchases: AtomicU64::new(0),
            result_count_sum: AtomicU64::new(0),
            understanding: RwLock::new(Ring::new(bounds::LATENCY_RING)),
            retrieval: RwLock::new(Ring::new(bounds::LATENCY_RING)),
            filtering: RwLock::new(Ring::new(bounds::LATENCY_RING)),
            ranking: RwLock::new(Ring::new(bounds::LATENCY_RING)),
            explanation: RwLock::new(Ring::new(bounds::LATENCY_RING)),
            total: RwLock::new(Ring::new(bounds::LATENCY_RING)),
            mrr_sum: Mutex::new(0.0),
            mrr_count: AtomicU64::new(0),
            clicks_by_position: (0..bounds::CLICK_POSITIONS).map(|_| AtomicU64::new(0)).collect(),
            recent: Mutex::new(VecDeque::with_capacity(bounds::RECENT_SEARCHES)),
        }
    }

    /// Record one finished request
    pub fn record_search(&self, entry: &SearchLogEntry, timing: &Timing, success: bool) {
        self.total_searches.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_searches.fetch_add(1, Ordering::Relaxed);
            if entry.result_count == 0 {
                self.zero_result_searches.fetch_add(1, Ordering::Relaxed);
            }
        } else {
            self.failed_searches.fetch_add(1, Ordering::Relaxed);
        }
        self.result_count_sum
            .fetch_add(entry.result_count as u64, Ordering::Relaxed);

        self.understanding.write().push(timing.understanding);
        self.retrieval.write().push(timing.retrieval);
        self.filtering.write().push(timing.filtering);
        self.ranking.write().push(timing.ranking);
        self.explanation.write().push(timing.explanation);
        self.total.write().push(timing.total);

        let mut recent = self.recent.lock();
        if recent.len() == bounds::RECENT_SEARCHES {
            recent.pop_front();
        }
        recent.push_back(RecentSearch {
            query: entry.raw_query.clone(),
            result_count: entry.result_count,
            success,
            total_time_ms: timing.total,
        });
    }

    /// The LLM was attempted but token output had to be used
    pub fn record_llm_fallback(&self) {
        self.llm_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    /// A result at `position` (1-based) was clicked
    pub fn record_click(&self, position: usize) {
        if position == 0 {
            return;
        }
        self.clicks.fetch_add(1, Ordering::Relaxed);
        *self.mrr_sum.lock() += 1.0 / position as f64;
        self.mrr_count.fetch_add(1, Ordering::Relaxed);
        if position <= self.clicks_by_position.len() {
            self.clicks_by_position[position - 1].fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_purchase(&self) {
        self.purchases.fetch_add(1, Ordering::Relaxed);
    }

    pub fn report(&self) -> MetricsReport {
        let total = self.total_searches.load(Ordering::Relaxed);
        let mrr_count = self.mrr_count.load(Ordering::Relaxed);
        let mrr_sum = *self.mrr_sum.lock();

        MetricsReport {
            counters: CounterReport {
                total_searches: total,
                successful_searches: self.successful_searches.load(Ordering::Relaxed),
                failed_searches: self.failed_searches.load(Ordering::Relaxed),
                zero_result_searches: self.zero_result_searches.load(Ordering::Relaxed),
                llm_fallbacks: self.llm_fallbacks.load(Ordering::Relaxed),
                clicks: self.clicks.load(Ordering::Relaxed),
                purchases: self.purchases.load(Ordering::Relaxed),
            },
            latency: LatencyReport {
                understanding: self.understanding.read().percentiles(),
                retrieval: self.retrieval.read().percentiles(),
                filtering: self.filtering.read().percentiles(),
                ranking: self.ranking.read().percentiles(),
                explanation: self.explanation.read().percentiles(),
                total: self.total.read().percentiles(),
            },
            quality: QualityReport {
                mrr: if mrr_count > 0 { mrr_sum / mrr_count as f64 } else { 0.0 },
                mrr_samples: mrr_count,
                avg_result_count: if total > 0 {
                    self.result_count_sum.load(Ordering::Relaxed) as f64 / total as f64
                } else {
                    0.0
                },
                clicks_by_position: self
                    .clicks_by_position
                    .iter()
                    .map(|c| c.load(Ordering::Relaxed))
                    .collect(),
            },
            recent_sample_size: self.recent.lock().len(),
        }
    }
}

impl Default for SearchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parts_search_core::response::UnderstandingMethod;
    use parts_search_core::{Intent, RankWeights};

    fn entry(result_count: usize) -> SearchLogEntry {
        SearchLogEntry {
            request_id: "req-1".into(),
            timestamp: Utc::now(),
            raw_query: "test".into(),
            parsed_intent: Intent::default(),
            parse_method: UnderstandingMethod::Token,
            parse_time_ms: 1,
            parse_confidence: 0.5,
            retrieval_source: "multiField".into(),
            candidate_count: result_count,
            retrieval_time_ms: 5,
            pre_filter_count: result_count,
            post_filter_count: result_count,
            filters_applied: vec![],
            filter_time_ms: 1,
            ranking_method: "control".into(),
            weights: RankWeights::default(),
            rank_time_ms: 1,
            result_count,
            top_result_id: None,
            top_result_score: None,
            total_time_ms: 10,
        }
    }

    fn timing(total: u64) -> Timing {
        Timing {
            total,
            understanding: 1,
            retrieval: 5,
            filtering: 1,
            ranking: 1,
            explanation: 1,
        }
    }

    #[test]
    fn test_counters() {
        let metrics = SearchMetrics::new();
        metrics.record_search(&entry(3), &timing(10), true);
        metrics.record_search(&entry(0), &timing(12), true);
        metrics.record_search(&entry(0), &timing(8), false);

        let report = metrics.report();
        assert_eq!(report.counters.total_searches, 3);
        assert_eq!(report.counters.successful_searches, 2);
        assert_eq!(report.counters.failed_searches, 1);
        assert_eq!(report.counters.zero_result_searches, 1);
        assert_eq!(report.quality.avg_result_count, 1.0);
    }

    #[test]
    fn test_percentiles() {
        let metrics = SearchMetrics::new();
        for ms in 1..=100u64 {
            metrics.record_search(&entry(1), &timing(ms), true);
        }
        let report = metrics.report();
        assert_eq!(report.latency.total.p50, 50);
        assert_eq!(report.latency.total.p95, 95);
        assert_eq!(report.latency.total.p99, 99);
        assert_eq!(report.latency.total.samples, 100);
    }

    #[test]
    fn test_mrr_and_click_positions() {
        let metrics = SearchMetrics::new();
        metrics.record_click(1);
        metrics.record_click(4);
        let report = metrics.report();
        assert!((report.quality.mrr - (1.0 + 0.25) / 2.0).abs() < 1e-9);
        assert_eq!(report.quality.clicks_by_position[0], 1);
        assert_eq!(report.quality.clicks_by_position[3], 1);

        // Positions past the tracked window still count toward MRR
        metrics.record_click(50);
        assert_eq!(metrics.report().counters.clicks, 3);
    }

    #[test]
    fn test_ring_bounds() {
        let mut ring = Ring::new(4);
        for v in 0..10u64 {
            ring.push(v);
        }
        assert_eq!(ring.samples.len(), 4);
        // Holds the most recent 4 values
        let mut kept = ring.samples.clone();
        kept.sort_unstable();
        assert_eq!(kept, vec![6, 7, 8, 9]);
    }
}
