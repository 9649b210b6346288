//! Stage 3: filtering
//!
//! Five passes in order: conjunctive hard filters, soft-match scoring,
//! data-quality scoring, a quality gate, and the composite business sort
//! with an optional in-stock partition.

use std::time::Instant;
use tracing::debug;

use parts_search_config::constants::filtering as weights;
use parts_search_core::{Candidate, Intent};
use parts_search_index::query::normalize_part_number;

/// Stage output
#[derive(Debug, Clone)]
pub struct FilterResult {
    pub success: bool,
    pub candidates: Vec<Candidate>,
    pub count: usize,
    pub pre_filter_count: usize,
    pub filters_applied: Vec<String>,
    pub duration_ms: u64,
}

impl FilterResult {
    /// Passthrough default when the stage is disabled or skipped
    pub fn passthrough(candidates: Vec<Candidate>) -> Self {
        let count = candidates.len();
        Self {
            success: true,
            candidates,
            count,
            pre_filter_count: count,
            filters_applied: Vec::new(),
            duration_ms: 0,
        }
    }
}

/// Filtering stage
pub struct FilterStage {
    max_results: usize,
    stock_priority: bool,
}

impl FilterStage {
    pub fn new(max_results: usize, stock_priority: bool) -> Self {
        Self {
            max_results,
            stock_priority,
        }
    }

    /// Run the stage; candidates are mutated in place (scores added, fields
    /// never removed) and the surviving slice is returned.
    pub fn filter(&self, intent: &Intent, candidates: Vec<Candidate>) -> FilterResult {
        let start = Instant::now();
        let pre_filter_count = candidates.len();
        let mut filters_applied = Vec::new();

        // Pass 1: hard filters, conjunctive
        let mut survivors: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| self.passes_hard_filters(intent, c))
            .collect();

        if !intent.brand.is_empty() {
            filters_applied.push("brand".to_string());
        }
        if intent.category.is_some() {
            filters_applied.push("category".to_string());
        }
        if intent.vehicle_year.is_some() {
            filters_applied.push("vehicleYear".to_string());
        }
        if !intent.position.is_empty() {
            filters_applied.push("position".to_string());
        }

        // Pass 2 + 3: soft and quality scoring
        for candidate in &mut survivors {
            score_soft(intent, candidate);
            score_quality(candidate);
        }

        // Pass 4: quality gate, only under volume
        if survivors.len() > weights::QUALITY_GATE_THRESHOLD {
            let before = survivors.len();
            survivors.retain(|c| c.quality_score >= weights::QUALITY_GATE_MIN);
            if survivors.len() < before {
                filters_applied.push("qualityGate".to_string());
                debug!(dropped = before - survivors.len(), "quality gate applied");
            }
        }

        // Pass 5: business sort on the composite score
        survivors.sort_by(|a, b| {
            composite(b)
                .partial_cmp(&composite(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if self.stock_priority {
            // Stable partition: in-stock first, relative order preserved
            let (in_stock, out_of_stock): (Vec<_>, Vec<_>) =
                survivors.into_iter().partition(|c| c.source.has_stock());
            survivors = in_stock;
            survivors.extend(out_of_stock);
        }

        survivors.truncate(self.max_results);

        FilterResult {
            success: true,
            count: survivors.len(),
            candidates: survivors,
            pre_filter_count,
            filters_applied,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    fn passes_hard_filters(&self, intent: &Intent, candidate: &Candidate) -> bool {
        let source = &candidate.source;

        if !intent.brand.is_empty() {
            let matched = source.brand.as_deref().is_some_and(|candidate_brand| {
                intent
                    .brand
                    .iter()
                    .any(|requested| contains_either_way(candidate_brand, requested))
            });
            if !matched {
                return false;
            }
        }

        if let Some(category) = &intent.category {
            let matched = source
                .category
                .as_deref()
                .is_some_and(|c| contains_either_way(c, category));
            if !matched {
                return false;
            }
        }

        if let Some(year) = intent.vehicle_year {
            if !source.vehicle_fitments.is_empty()
                && !source.vehicle_fitments.iter().any(|f| f.covers_year(year))
            {
                return false;
            }
        }

        if !intent.position.is_empty() {
            if let Some(candidate_position) = source.position.as_deref() {
                let matched = intent
                    .position
                    .iter()
                    .any(|p| contains_either_way(candidate_position, p.as_str()));
                if !matched {
                    return false;
                }
            }
        }

        true
    }
}

fn contains_either_way(a: &str, b: &str) -> bool {
    let a = a.to_lowercase();
    let b = b.to_lowercase();
    a.contains(&b) || b.contains(&a)
}

/// Additive bonuses for matching non-required intent fields
fn score_soft(intent: &Intent, candidate: &mut Candidate) {
    let source = &candidate.source;
    let mut score = 0.0;
    let mut factors = Vec::new();

    if let Some(make) = &intent.vehicle_make {
        if source
            .vehicle_fitments
            .iter()
            .any(|f| f.make.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(make)))
        {
            score += weights::SOFT_VEHICLE_MAKE;
            factors.push("vehicleMake".to_string());
        }
    }

    if let Some(model) = &intent.vehicle_model {
        if source
            .vehicle_fitments
            .iter()
            .any(|f| f.model.as_deref().is_some_and(|m| m.eq_ignore_ascii_case(model)))
        {
            score += weights::SOFT_VEHICLE_MODEL;
            factors.push("vehicleModel".to_string());
        }
    }

    if let Some(engine_code) = &intent.engine_code {
        if source
            .engine_codes
            .iter()
            .any(|c| c.eq_ignore_ascii_case(engine_code))
        {
            score += weights::SOFT_ENGINE_CODE;
            factors.push("engineCode".to_string());
        }
    }

    if let Some(part_number) = &intent.part_number {
        let requested = normalize_part_number(part_number);
        let candidate_normalized = source
            .part_number_normalized
            .clone()
            .or_else(|| source.part_number.as_deref().map(normalize_part_number));
        if candidate_normalized.is_some_and(|c| c == requested) {
            score += weights::SOFT_PART_NUMBER;
            factors.push("partNumber".to_string());
        }
    }

    candidate.soft_score = score;
    candidate.soft_factors = factors;
}

/// Data-quality checklist
fn score_quality(candidate: &mut Candidate) {
    let source = &candidate.source;
    let mut score = 0.0;

    if source.has_image() {
        score += weights::QUALITY_HAS_IMAGE;
    }
    if source
        .description
        .as_deref()
        .is_some_and(|d| d.len() > weights::MIN_DESCRIPTION_LEN)
    {
        score += weights::QUALITY_HAS_DESCRIPTION;
    }
    if source.has_specifications() {
        score += weights::QUALITY_HAS_SPECIFICATIONS;
    }
    if source.has_stock() {
        score += weights::QUALITY_HAS_STOCK;
    }
    if source.has_price() {
        score += weights::QUALITY_HAS_PRICE;
    }
    if source.has_cross_reference() {
        score += weights::QUALITY_HAS_CROSS_REFERENCE;
    }
    if !source.vehicle_fitments.is_empty() {
        score += weights::QUALITY_HAS_VEHICLE_FITMENT;
    }

    candidate.quality_score = score.min(1.0);
}

/// The business-sort signal; distinct from the final rank score
fn composite(candidate: &Candidate) -> f64 {
    let norm_es = (candidate.score / weights::ES_NORM_DIVISOR).clamp(0.0, 1.0);
    weights::COMPOSITE_ES * norm_es
        + weights::COMPOSITE_SOFT * candidate.soft_score
        + weights::COMPOSITE_QUALITY * candidate.quality_score
}
