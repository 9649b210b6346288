//! Stage 4: ranking
//!
//! Per-candidate feature extraction into [0, 1], a weighted linear score on
//! the active experiment profile, and an online weight-update hook. The
//! soft and quality scores from filtering carry over with small fixed
//! weights so the filter stage's signals are not lost.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use parts_search_config::constants::ranking as tuning;
use parts_search_config::ExperimentGroup;
use parts_search_core::{
    Candidate, EngagementProvider, Feature, FeatureVector, Intent, RankWeights,
};
use parts_search_index::query::normalize_part_number;

/// Stage output
#[derive(Debug, Clone)]
pub struct RankResult {
    pub success: bool,
    pub candidates: Vec<Candidate>,
    pub count: usize,
    /// Experiment group that produced the ranking
    pub method: String,
    pub weights: RankWeights,
    pub duration_ms: u64,
}

/// One online-learning signal
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub struct GradientSignal {
    pub feature: Feature,
    /// +1.0 to reward, -1.0 to penalize
    pub direction: f64,
    /// Signal strength in [0, 1]
    pub magnitude: f64,
}

/// Ranking stage
pub struct RankingStage {
    group: ExperimentGroup,
    weights: RwLock<RankWeights>,
    engagement: Arc<dyn EngagementProvider>,
}

impl RankingStage {
    pub fn new(group: ExperimentGroup, engagement: Arc<dyn EngagementProvider>) -> Self {
        Self {
            group,
            weights: RwLock::new(group.weights()),
            engagement,
        }
    }

    pub fn experiment_group(&self) -> ExperimentGroup {
        self.group
    }

    pub fn current_weights(&self) -> RankWeights {
        self.weights.read().clone()
    }

    /// Run the stage: extract features, score, sort, assign 1-based ranks
    pub fn rank(&self, intent: &Intent, mut candidates: Vec<Candidate>) -> RankResult {
        let start = Instant::now();
        let weights = self.current_weights();

        let max_score = candidates
            .iter()
            .map(|c| c.score)
            .fold(0.0_f64, f64::max)
            .max(f64::EPSILON);

        for candidate in &mut candidates {
            let features = extract_features(intent, candidate, max_score, &*self.engagement);
            candidate.features = features;
            candidate.rank_score = weights.score(&features)
                + tuning::SOFT_SCORE_WEIGHT * candidate.soft_score
                + tuning::QUALITY_SCORE_WEIGHT * candidate.quality_score;
        }

        candidates.sort_by(|a, b| {
            b.rank_score
                .partial_cmp(&a.rank_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for (index, candidate) in candidates.iter_mut().enumerate() {
            candidate.rank = index + 1;
        }

        RankResult {
            success: true,
            count: candidates.len(),
            candidates,
            method: self.group.as_str().to_string(),
            weights,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Nudge weights from gradient signals, clamp to [0, 1], renormalize to
    /// sum 1. The API is exposed without an auto-updating producer.
    pub fn apply_gradient(&self, signals: &[GradientSignal]) -> RankWeights {
        let mut weights = self.weights.write();
        for signal in signals {
            let current = weights.get(signal.feature);
            let delta = signal.direction.signum() * signal.magnitude.clamp(0.0, 1.0) * tuning::LEARNING_RATE;
            weights.set(signal.feature, current + delta);
        }
        weights.normalize();
        info!(group = self.group.as_str(), "ranking weights updated online");
        weights.clone()
    }
}

/// Extract all features for one candidate
fn extract_features(
    intent: &Intent,
    candidate: &Candidate,
    max_score: f64,
    engagement: &dyn EngagementProvider,
) -> FeatureVector {
    let source = &candidate.source;
    let mut features = FeatureVector::default();

    features.set(Feature::EsScore, (candidate.score / max_score).min(1.0));
    features.set(Feature::PartNumberMatch, part_number_match(intent, candidate));
    features.set(Feature::CategoryMatch, category_match(intent, candidate));
    features.set(Feature::BrandMatch, brand_match(intent, candidate));
    features.set(Feature::VehicleFitment, vehicle_fitment(intent, candidate));
    features.set(Feature::DataCompleteness, data_completeness(candidate));
    features.set(Feature::HasImage, if source.has_image() { 1.0 } else { 0.0 });
    features.set(Feature::HasStock, stock_score(candidate));

    let rates = engagement.engagement(&candidate.id);
    features.set(Feature::ClickRate, rates.click);
    features.set(Feature::PurchaseRate, rates.purchase);

    features.set(Feature::Freshness, freshness(candidate));
    features
}

fn part_number_match(intent: &Intent, candidate: &Candidate) -> f64 {
    let Some(requested) = intent.part_number.as_deref() else {
        return 0.0;
    };
    let requested = normalize_part_number(requested);
    let candidate_pn = candidate
        .source
        .part_number_normalized
        .clone()
        .or_else(|| candidate.source.part_number.as_deref().map(normalize_part_number))
        .unwrap_or_default();
    if candidate_pn.is_empty() || requested.is_empty() {
        return 0.0;
    }

    if candidate_pn == requested {
        1.0
    } else if candidate_pn.starts_with(&requested) || requested.starts_with(&candidate_pn) {
        // One-sided prefix: overlap share of the longer identifier
        let overlap = requested.len().min(candidate_pn.len()) as f64;
        overlap / requested.len().max(candidate_pn.len()) as f64
    } else if candidate_pn.contains(&requested) || requested.contains(&candidate_pn) {
        0.5
    } else {
        0.0
    }
}

fn category_match(intent: &Intent, candidate: &Candidate) -> f64 {
    let Some(requested) = intent.category.as_deref() else {
        return 0.5;
    };
    let Some(candidate_category) = candidate.source.category.as_deref() else {
        return 0.0;
    };
    if candidate_category.eq_ignore_ascii_case(requested) {
        1.0
    } else if candidate_category.to_lowercase().contains(&requested.to_lowercase())
        || requested.to_lowercase().contains(&candidate_category.to_lowercase())
    {
        0.8
    } else {
        0.0
    }
}

fn brand_match(intent: &Intent, candidate: &Candidate) -> f64 {
    if intent.brand.is_empty() {
        return 0.5;
    }
    let Some(candidate_brand) = candidate.source.brand.as_deref() else {
        return 0.0;
    };
    if intent.brand.iter().any(|b| b.eq_ignore_ascii_case(candidate_brand)) {
        1.0
    } else if intent.brand.iter().any(|b| {
        let requested = b.to_lowercase();
        let actual = candidate_brand.to_lowercase();
        actual.contains(&requested) || requested.contains(&actual)
    }) {
        0.8
    } else {
        0.0
    }
}

fn vehicle_fitment(intent: &Intent, candidate: &Candidate) -> f64 {
    if intent.vehicle_make.is_none() && intent.vehicle_model.is_none() && intent.vehicle_year.is_none() {
        return 0.5;
    }
    if candidate.source.vehicle_fitments.is_empty() {
        // Universal part: neutral rather than punished
        return tuning::FITMENT_UNIVERSAL;
    }

    let mut best = 0.0_f64;
    for fitment in &candidate.source.vehicle_fitments {
        let mut score = 0.0;
        if let (Some(requested), Some(actual)) = (&intent.vehicle_make, &fitment.make) {
            if actual.eq_ignore_ascii_case(requested) {
                score += tuning::FITMENT_MAKE;
            }
        }
        if let (Some(requested), Some(actual)) = (&intent.vehicle_model, &fitment.model) {
            if actual.eq_ignore_ascii_case(requested) {
                score += tuning::FITMENT_MODEL;
            }
        }
        if let Some(year) = intent.vehicle_year {
            if fitment.covers_year(year) {
                score += tuning::FITMENT_YEAR;
            }
        }
        best = best.max(score);
    }
    best.min(1.0)
}

/// Same checklist as the filter-stage quality score, equally weighted
fn data_completeness(candidate: &Candidate) -> f64 {
    let source = &candidate.source;
    let checks = [
        source.has_image(),
        source.description.as_deref().is_some_and(|d| d.len() > 20),
        source.has_specifications(),
        source.has_stock(),
        source.has_price(),
        source.has_cross_reference(),
        !source.vehicle_fitments.is_empty(),
    ];
    let passed = checks.iter().filter(|c| **c).count();
    passed as f64 / checks.len() as f64
}

fn stock_score(candidate: &Candidate) -> f64 {
    let quantity = candidate.source.stock_quantity();
    if quantity > tuning::STOCK_FULL_THRESHOLD {
        1.0
    } else if quantity > 0 {
        tuning::STOCK_PARTIAL_SCORE
    } else {
        0.0
    }
}

fn freshness(candidate: &Candidate) -> f64 {
    let Some(updated_at) = candidate.source.updated_at else {
        return 0.5;
    };
    let days = (chrono::Utc::now() - updated_at).num_days().max(0) as f64;
    (1.0 - days / tuning::FRESHNESS_HORIZON_DAYS * tuning::FRESHNESS_DECAY)
        .max(tuning::FRESHNESS_FLOOR)
}

/// Top feature contributions to a candidate's score, as percentage shares.
/// Used by the explanation stage and the ranking debug surface.
pub fn top_contributions(
    features: &FeatureVector,
    weights: &RankWeights,
    limit: usize,
) -> Vec<(Feature, f64)> {
    let mut contributions: Vec<(Feature, f64)> = Feature::ALL
        .iter()
        .map(|f| (*f, weights.get(*f) * features.get(*f)))
        .collect();
    contributions.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let total: f64 = contributions.iter().map(|(_, v)| v).sum();
    if total <= f64::EPSILON {
        return Vec::new();
    }
    contributions
        .into_iter()
        .take(limit)
        .map(|(f, v)| (f, v / total * 100.0))
        .collect()
}
