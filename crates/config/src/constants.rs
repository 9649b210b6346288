//! Centralized constants for the parts search pipeline
//!
//! Single source of truth for tuning values that are not deployment-specific.
//! Deployment concerns (endpoints, credentials, feature toggles) belong in
//! `Settings`; score weights, boost factors, and cache bounds belong here.

/// Retrieval-stage boost factors and caps
pub mod retrieval {
    /// Boost for exact matches on keyword fields
    pub const BOOST_EXACT: f64 = 10.0;

    /// Boost for part-number field matches
    pub const BOOST_PART_NUMBER: f64 = 8.0;

    /// Boost for brand matches
    pub const BOOST_BRAND: f64 = 3.0;

    /// Boost for category matches
    pub const BOOST_CATEGORY: f64 = 2.0;

    /// Hard cap on candidates pulled from the engine
    pub const MAX_CANDIDATES: usize = 500;

    /// Minimum engine relevance admitted into the pipeline. Absolute value;
    /// correct only relative to the tuning of the underlying index, so it is
    /// overridable through `IndexSettings`.
    pub const MIN_SCORE: f64 = 0.3;

    /// Engine-side query timeout
    pub const ENGINE_TIMEOUT_MS: u64 = 5_000;

    /// Edit distance for the fuzzy part-number fallback
    pub const FUZZY_FUZZINESS: u32 = 1;

    /// Leading characters that must match exactly in fuzzy lookups
    pub const FUZZY_PREFIX_LENGTH: u32 = 2;
}

/// Filtering-stage weights
pub mod filtering {
    /// Soft-match bonuses for non-required intent fields
    pub const SOFT_VEHICLE_MAKE: f64 = 0.2;
    pub const SOFT_VEHICLE_MODEL: f64 = 0.15;
    pub const SOFT_ENGINE_CODE: f64 = 0.15;
    pub const SOFT_PART_NUMBER: f64 = 0.3;

    /// Data-quality checklist weights
    pub const QUALITY_HAS_IMAGE: f64 = 0.1;
    pub const QUALITY_HAS_DESCRIPTION: f64 = 0.1;
    pub const QUALITY_HAS_SPECIFICATIONS: f64 = 0.15;
    pub const QUALITY_HAS_STOCK: f64 = 0.2;
    pub const QUALITY_HAS_PRICE: f64 = 0.15;
    pub const QUALITY_HAS_CROSS_REFERENCE: f64 = 0.1;
    pub const QUALITY_HAS_VEHICLE_FITMENT: f64 = 0.2;

    /// Description must be longer than this to count as present
    pub const MIN_DESCRIPTION_LEN: usize = 20;

    /// Quality gate: drop candidates below this quality score...
    pub const QUALITY_GATE_MIN: f64 = 0.1;
    /// ...but only when more than this many candidates remain
    pub const QUALITY_GATE_THRESHOLD: usize = 10;

    /// Composite sort weights: engine score / soft score / quality score
    pub const COMPOSITE_ES: f64 = 0.5;
    pub const COMPOSITE_SOFT: f64 = 0.3;
    pub const COMPOSITE_QUALITY: f64 = 0.2;

    /// Engine scores are normalized by this divisor and clamped to [0, 1]
    pub const ES_NORM_DIVISOR: f64 = 10.0;

    /// Hard cap on candidates leaving the filter stage
    pub const MAX_RESULTS: usize = 200;
}

/// Ranking-stage tuning
pub mod ranking {
    /// Step size for online weight updates
    pub const LEARNING_RATE: f64 = 0.01;

    /// Carry-over weights for the filter-stage scores
    pub const SOFT_SCORE_WEIGHT: f64 = 0.1;
    pub const QUALITY_SCORE_WEIGHT: f64 = 0.05;

    /// Freshness decays over this horizon
    pub const FRESHNESS_HORIZON_DAYS: f64 = 180.0;
    /// Scale of the decay within the horizon
    pub const FRESHNESS_DECAY: f64 = 0.8;
    /// Freshness never drops below this floor
    pub const FRESHNESS_FLOOR: f64 = 0.2;

    /// Stock depth granting the full stock feature score
    pub const STOCK_FULL_THRESHOLD: i64 = 10;
    /// Feature score for any positive stock below the full threshold
    pub const STOCK_PARTIAL_SCORE: f64 = 0.7;

    /// Fitment feature contributions
    pub const FITMENT_MAKE: f64 = 0.4;
    pub const FITMENT_MODEL: f64 = 0.3;
    pub const FITMENT_YEAR: f64 = 0.3;
    /// Neutral score for parts with no fitment data (universal parts)
    pub const FITMENT_UNIVERSAL: f64 = 0.3;

    /// Features reported by the explainability helper
    pub const TOP_CONTRIBUTIONS: usize = 3;
}

/// Query-understanding thresholds
pub mod understanding {
    /// Base confidence before detector contributions
    pub const BASE_CONFIDENCE: f64 = 0.2;

    /// Detector contribution weights
    pub const WEIGHT_PART_NUMBER: f64 = 0.4;
    pub const WEIGHT_BRAND: f64 = 0.15;
    pub const WEIGHT_CATEGORY: f64 = 0.2;
    pub const WEIGHT_VEHICLE: f64 = 0.15;

    /// Token confidence at which the LLM is skipped
    pub const LLM_SKIP_THRESHOLD: f64 = 0.6;

    /// Intents below this confidence are not cached
    pub const CACHE_MIN_CONFIDENCE: f64 = 0.5;
}

/// Cache namespace bounds and TTLs
pub mod cache {
    pub const INTENT_CAPACITY: usize = 200;
    pub const INTENT_TTL_SECS: u64 = 600;

    pub const PARTS_CAPACITY: usize = 500;
    pub const PARTS_TTL_SECS: u64 = 300;

    pub const RESPONSE_CAPACITY: usize = 100;
    pub const RESPONSE_TTL_SECS: u64 = 120;
}

/// Metrics bounds
pub mod metrics {
    /// Samples kept per latency histogram
    pub const LATENCY_RING: usize = 10_000;

    /// Recent searches kept for the stats report
    pub const RECENT_SEARCHES: usize = 1_000;

    /// Click positions tracked individually
    pub const CLICK_POSITIONS: usize = 20;
}

/// Pagination bounds
pub mod pagination {
    pub const DEFAULT_LIMIT: usize = 20;
    pub const MAX_LIMIT: usize = 100;
    pub const DEFAULT_PAGE: usize = 1;
}
