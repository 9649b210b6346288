//! Stage 5: explanation
//!
//! Templated, no external calls: an interpretation sentence selected by
//! search type, per-result match reasons drawn from the ranking features,
//! query-term highlights, and count-driven refinement suggestions with a
//! cross-sell adjacency map.

use std::time::Instant;

use parts_search_core::response::{
    ExplanationBlock, Highlights, MatchReason, ReasonWeight, ResultItem, Suggestion,
};
use parts_search_core::{Candidate, Intent, SearchType};
use parts_search_query::vocab;

/// Window radius around a description match
const HIGHLIGHT_WINDOW: usize = 30;

/// Stage output
#[derive(Debug, Clone)]
pub struct ExplanationResult {
    pub success: bool,
    pub block: ExplanationBlock,
    pub duration_ms: u64,
}

impl ExplanationResult {
    pub fn passthrough() -> Self {
        Self {
            success: true,
            block: ExplanationBlock::default(),
            duration_ms: 0,
        }
    }
}

/// Explanation stage
#[derive(Debug, Default)]
pub struct ExplanationStage;

impl ExplanationStage {
    pub fn new() -> Self {
        Self
    }

    /// Build the explanation block and enrich the page's result items with
    /// match reasons and highlights.
    pub fn explain(
        &self,
        raw_query: &str,
        intent: &Intent,
        total_results: usize,
        page_candidates: &[Candidate],
        page_items: &mut [ResultItem],
    ) -> ExplanationResult {
        let start = Instant::now();

        for (candidate, item) in page_candidates.iter().zip(page_items.iter_mut()) {
            item.match_reasons = match_reasons(intent, candidate);
            let highlights = highlights(intent, candidate);
            if !highlights.is_empty() {
                item.highlights = Some(highlights);
            }
        }

        let block = ExplanationBlock {
            interpretation: interpretation(raw_query, intent),
            suggestions: suggestions(intent, total_results),
        };

        ExplanationResult {
            success: true,
            block,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

/// One sentence describing how the query was read
fn interpretation(raw_query: &str, intent: &Intent) -> String {
    match intent.search_type {
        SearchType::PartNumber => {
            let pn = intent.part_number.as_deref().unwrap_or(raw_query);
            format!("Showing results for part number {pn}")
        }
        SearchType::Fitment => {
            let category = intent.category.as_deref().unwrap_or("parts");
            let mut vehicle = String::new();
            if let Some(year) = intent.vehicle_year {
                vehicle.push_str(&year.to_string());
                vehicle.push(' ');
            }
            if let Some(make) = &intent.vehicle_make {
                vehicle.push_str(make);
            }
            if let Some(model) = &intent.vehicle_model {
                vehicle.push(' ');
                vehicle.push_str(model);
            }
            format!("Showing {category} for {vehicle}")
        }
        SearchType::Catalog => {
            let category = intent.category.as_deref().unwrap_or("parts");
            let brands = intent.brand.join(", ");
            format!("Showing {category} from {brands}")
        }
        SearchType::CrossReference => {
            let reference = intent
                .cross_reference
                .as_deref()
                .or(intent.part_number.as_deref())
                .unwrap_or(raw_query);
            format!("Showing parts matching reference {reference}")
        }
        SearchType::General => format!("Showing results for \"{}\"", raw_query.trim()),
    }
}

/// Top reasons (by weight tier) why this candidate matched
fn match_reasons(intent: &Intent, candidate: &Candidate) -> Vec<MatchReason> {
    let features = &candidate.features;
    let mut reasons = Vec::new();

    if intent.part_number.is_some() {
        if features.part_number_match >= 1.0 {
            reasons.push(reason(
                "exact-part-number",
                "Exact part number match",
                ReasonWeight::High,
            ));
        } else if features.part_number_match > 0.0 {
            reasons.push(reason(
                "partial-part-number",
                "Part number closely matches",
                ReasonWeight::Medium,
            ));
        }
    }

    if intent.cross_reference.is_some() && candidate.source.has_cross_reference() {
        reasons.push(reason(
            "cross-reference",
            "Listed as a cross-reference for your number",
            ReasonWeight::High,
        ));
    }

    if features.vehicle_fitment >= 0.7 {
        reasons.push(reason(
            "vehicle-fitment",
            "Fits your vehicle",
            ReasonWeight::High,
        ));
    }

    if !intent.brand.is_empty() && features.brand_match >= 0.8 {
        let weight = if features.brand_match >= 1.0 {
            ReasonWeight::High
        } else {
            ReasonWeight::Medium
        };
        reasons.push(reason("brand-match", "Matches the requested brand", weight));
    }

    if intent.category.is_some() && features.category_match >= 0.8 {
        reasons.push(reason(
            "category-match",
            "Matches the requested category",
            ReasonWeight::Medium,
        ));
    }

    if candidate.quality_score >= 0.7 {
        reasons.push(reason(
            "high-quality",
            "Complete, well-documented listing",
            ReasonWeight::Low,
        ));
    }

    if candidate.source.has_stock() {
        reasons.push(reason("in-stock", "In stock now", ReasonWeight::Low));
    }

    reasons.sort_by_key(|r| match r.weight {
        ReasonWeight::High => 0,
        ReasonWeight::Medium => 1,
        ReasonWeight::Low => 2,
    });
    reasons.truncate(3);
    reasons
}

fn reason(key: &str, text: &str, weight: ReasonWeight) -> MatchReason {
    MatchReason {
        reason: key.to_string(),
        text: text.to_string(),
        weight,
    }
}

/// Part-number span and description window highlights
fn highlights(intent: &Intent, candidate: &Candidate) -> Highlights {
    let mut highlights = Highlights::default();

    if let (Some(requested), Some(actual)) =
        (intent.part_number.as_deref(), candidate.source.part_number.as_deref())
    {
        let requested_lower = requested.to_lowercase();
        let actual_lower = actual.to_lowercase();
        if let Some(start) = actual_lower.find(&requested_lower) {
            highlights.part_number = Some(actual[start..start + requested.len()].to_string());
        }
    }

    if let Some(description) = candidate.source.description.as_deref() {
        let lower = description.to_lowercase();
        let mut terms: Vec<String> = Vec::new();
        if let Some(category) = &intent.category {
            terms.extend(category.split(' ').map(str::to_string));
        }
        terms.extend(intent.brand.iter().map(|b| b.to_lowercase()));
        if let Some(make) = &intent.vehicle_make {
            terms.push(make.to_lowercase());
        }
        if let Some(model) = &intent.vehicle_model {
            terms.push(model.to_lowercase());
        }

        if let Some((pos, term_len)) = terms
            .iter()
            .filter(|t| !t.is_empty())
            .filter_map(|t| lower.find(t.as_str()).map(|p| (p, t.len())))
            .min_by_key(|(p, _)| *p)
        {
            let start = pos.saturating_sub(HIGHLIGHT_WINDOW);
            let end = (pos + term_len + HIGHLIGHT_WINDOW).min(description.len());
            // Snap to char boundaries for non-ASCII descriptions
            let start = floor_char_boundary(description, start);
            let end = floor_char_boundary(description, end);
            highlights.description = Some(description[start..end].to_string());
        }
    }

    highlights
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index.min(s.len())
}

/// Count-driven refinement and cross-sell suggestions
fn suggestions(intent: &Intent, total_results: usize) -> Vec<Suggestion> {
    let mut suggestions = Vec::new();

    if total_results == 0 {
        suggestions.push(Suggestion::new(
            "refine",
            "No results found. Check the part number for typos, or search by vehicle and category instead.",
        ));
        suggestions.push(Suggestion::new(
            "refine",
            "Try fewer or more general terms, e.g. the category name alone.",
        ));
        return suggestions;
    }

    if total_results > 100 {
        if intent.vehicle_make.is_none() {
            suggestions.push(
                Suggestion::new("add-vehicle", "Add your vehicle to narrow the results")
                    .with_term("vehicle"),
            );
        }
        if intent.brand.is_empty() {
            suggestions.push(
                Suggestion::new("add-brand", "Filter by a preferred brand").with_term("brand"),
            );
        }
        if intent.position.is_empty() {
            suggestions.push(
                Suggestion::new("add-position", "Specify front or rear to narrow the results")
                    .with_term("position"),
            );
        }
    } else if (20..=100).contains(&total_results)
        && intent.vehicle_make.is_some()
        && intent.vehicle_year.is_none()
    {
        suggestions.push(
            Suggestion::new("add-year", "Add the model year to find exact-fit parts")
                .with_term("year"),
        );
    }

    if let Some(category) = &intent.category {
        for related in vocab::related_categories(category).iter().take(2) {
            suggestions.push(
                Suggestion::new("related-category", format!("Customers also search for {related}"))
                    .with_term(*related),
            );
        }
    }

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;
    use parts_search_core::{FeatureVector, PartRecord, Position};

    fn fitment_intent() -> Intent {
        Intent {
            category: Some("brake pad".into()),
            vehicle_make: Some("Toyota".into()),
            vehicle_model: Some("Camry".into()),
            vehicle_year: Some(2019),
            search_type: SearchType::Fitment,
            confidence: 0.9,
            ..Intent::default()
        }
    }

    #[test]
    fn test_fitment_interpretation() {
        let text = interpretation("brake pads for 2019 toyota camry", &fitment_intent());
        assert_eq!(text, "Showing brake pad for 2019 Toyota Camry");
    }

    #[test]
    fn test_part_number_interpretation() {
        let intent = Intent {
            part_number: Some("04152-YZZA1".into()),
            search_type: SearchType::PartNumber,
            confidence: 0.9,
            ..Intent::default()
        };
        assert_eq!(
            interpretation("04152-YZZA1", &intent),
            "Showing results for part number 04152-YZZA1"
        );
    }

    #[test]
    fn test_catalog_interpretation() {
        let intent = Intent {
            category: Some("oil filter".into()),
            brand: vec!["Bosch".into()],
            search_type: SearchType::Catalog,
            ..Intent::default()
        };
        assert_eq!(interpretation("bosch oil filter", &intent), "Showing oil filter from Bosch");
    }

    #[test]
    fn test_match_reasons_capped_and_ordered() {
        let intent = Intent {
            part_number: Some("GDB1330".into()),
            brand: vec!["TRW".into()],
            category: Some("brake pad".into()),
            confidence: 0.9,
            ..Intent::default()
        };
        let mut candidate = Candidate::new(
            "c",
            5.0,
            PartRecord {
                stock: Some(5),
                ..PartRecord::default()
            },
        );
        candidate.features = FeatureVector {
            part_number_match: 1.0,
            brand_match: 1.0,
            category_match: 1.0,
            vehicle_fitment: 0.9,
            ..FeatureVector::default()
        };
        candidate.quality_score = 0.9;

        let reasons = match_reasons(&intent, &candidate);
        assert_eq!(reasons.len(), 3);
        assert_eq!(reasons[0].reason, "exact-part-number");
        assert!(reasons.iter().all(|r| r.weight != ReasonWeight::Low));
    }

    #[test]
    fn test_highlights_window() {
        let intent = Intent {
            category: Some("oil filter".into()),
            ..Intent::default()
        };
        let long_prefix = "A".repeat(100);
        let description = format!("{long_prefix} premium oil filter for most engines");
        let candidate = Candidate::new(
            "c",
            1.0,
            PartRecord {
                description: Some(description),
                ..PartRecord::default()
            },
        );
        let h = highlights(&intent, &candidate);
        let window = h.description.unwrap();
        assert!(window.contains("oil"));
        // Window is bounded: +-30 chars around the first match
        assert!(window.len() <= "oil".len() + 2 * HIGHLIGHT_WINDOW + 10);
    }

    #[test]
    fn test_part_number_highlight_span() {
        let intent = Intent {
            part_number: Some("GDB1330".into()),
            confidence: 0.9,
            ..Intent::default()
        };
        let candidate = Candidate::new(
            "c",
            1.0,
            PartRecord {
                part_number: Some("GDB1330DTE".into()),
                ..PartRecord::default()
            },
        );
        assert_eq!(highlights(&intent, &candidate).part_number.as_deref(), Some("GDB1330"));
    }

    #[test]
    fn test_zero_result_suggestions() {
        let s = suggestions(&Intent::default(), 0);
        assert!(s.len() >= 2);
        assert!(s.iter().all(|s| s.kind == "refine"));
    }

    #[test]
    fn test_large_result_set_proposes_missing_refinements() {
        let intent = Intent {
            category: Some("brake pad".into()),
            position: vec![Position::Front],
            ..Intent::default()
        };
        let s = suggestions(&intent, 250);
        let kinds: Vec<&str> = s.iter().map(|s| s.kind.as_str()).collect();
        assert!(kinds.contains(&"add-vehicle"));
        assert!(kinds.contains(&"add-brand"));
        // Position is already set, so it is not proposed again
        assert!(!kinds.contains(&"add-position"));
    }

    #[test]
    fn test_mid_result_set_suggests_year() {
        let intent = Intent {
            category: Some("brake pad".into()),
            vehicle_make: Some("Toyota".into()),
            ..Intent::default()
        };
        let s = suggestions(&intent, 40);
        assert!(s.iter().any(|s| s.kind == "add-year"));
    }

    #[test]
    fn test_cross_sell_from_adjacency() {
        let intent = Intent {
            category: Some("oil filter".into()),
            brand: vec!["Bosch".into()],
            ..Intent::default()
        };
        let s = suggestions(&intent, 12);
        let terms: Vec<&str> = s
            .iter()
            .filter(|s| s.kind == "related-category")
            .filter_map(|s| s.term.as_deref())
            .collect();
        assert!(terms.contains(&"air filter") || terms.contains(&"fuel filter"));
    }
}
