//! Token parser: free text to structured intent
//!
//! Deterministic and allocation-light; no external calls. Pattern detectors
//! run independently over the normalized token stream and their findings are
//! folded into one `Intent` with an additive confidence.

use chrono::Datelike;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use parts_search_config::constants::understanding;
use parts_search_core::{Intent, Position, Result, SearchError, SearchType};

use crate::vocab;

// Part-number shapes. Uppercased tokens, separators preserved.
static PN_ALPHA_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{1,4}[-./]?\d{3,}[-.\w]*$").unwrap());
static PN_NUMERIC_ALPHA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{3,}[-./][A-Z0-9]*[A-Z][A-Z0-9]*$").unwrap());
static PN_NUMERIC_SEP: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{2,}([-./]\d+)+$").unwrap());
static PN_YEAR_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(19[89]\d|20[0-2]\d)[-./](19[89]\d|20[0-2]\d)$").unwrap());
static PN_OIL_GRADE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}W-?\d{2}$").unwrap());
static PN_COMPACT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]{6,}$").unwrap());

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19[89]\d|20[0-2]\d)\b").unwrap());
static THREAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^M\d+X\d+(\.\d+)?$").unwrap());
static DIAMETER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(MM|CM|INCH|IN)$").unwrap());
static DISPLACEMENT_L: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d\.\d)L$").unwrap());
static DISPLACEMENT_CC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{3,4})CC$").unwrap());
static ENGINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z]{1,2}\d{1,2}[A-Z]?\d?$").unwrap());

/// Parser output: the intent plus the per-detector confidences that fed it
#[derive(Debug, Clone)]
pub struct TokenParse {
    pub intent: Intent,
    /// Confidence of the part-number pattern that matched, 0.0 when none
    pub part_number_confidence: f64,
    pub category_confidence: f64,
    /// Additive vehicle confidence (make/model/year, 0.3 each)
    pub vehicle_confidence: f64,
    pub brand_detected: bool,
}

/// Lowercase, strip punctuation except `-./`, collapse whitespace
pub fn normalize_query(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.to_lowercase().chars() {
        if c.is_alphanumeric() || matches!(c, '-' | '.' | '/') {
            out.push(c);
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a raw query into a structured intent
///
/// Fails only when the query is empty after normalization.
pub fn parse_query(raw: &str) -> Result<TokenParse> {
    let normalized = normalize_query(raw);
    if normalized.is_empty() {
        return Err(SearchError::InvalidQuery);
    }

    let tokens: Vec<String> = normalized.split(' ').map(str::to_string).collect();
    let upper_tokens: Vec<String> = tokens.iter().map(|t| t.to_uppercase()).collect();

    let mut intent = Intent::empty();

    // Part number
    let part_number = detect_part_number(&upper_tokens, &normalized);
    let pn_confidence = part_number.as_ref().map(|p| p.confidence).unwrap_or(0.0);
    if let Some(pn) = &part_number {
        intent.part_number = Some(pn.value.clone());
    }

    // Brands
    for token in &tokens {
        if let Some(brand) = vocab::match_brand(token) {
            intent.push_brand(brand);
        }
    }
    let brand_detected = !intent.brand.is_empty();

    // Category
    let mut category_confidence = 0.0;
    let mut matched_indicator = None;
    if let Some((category, indicator)) = vocab::detect_category(&normalized) {
        intent.category = Some(category.to_string());
        category_confidence = if indicator.len() > 5 { 0.9 } else { 0.7 };
        matched_indicator = Some(indicator);
    }

    // Vehicle context
    let mut vehicle_confidence = 0.0;
    let make = tokens.iter().find_map(|t| vocab::match_make(t));
    if let Some(make) = make {
        intent.vehicle_make = Some(make.name.to_string());
        vehicle_confidence += 0.3;

        if let Some(model) = detect_model(make, &tokens) {
            intent.vehicle_model = Some(model);
            vehicle_confidence += 0.3;
        }
    }
    if let Some(year) = detect_year(&normalized) {
        intent.vehicle_year = Some(year);
        vehicle_confidence += 0.3;
    }

    // Position
    detect_positions(&normalized, &tokens, &mut intent);

    // Size & engine
    let sizes = detect_size_and_engine(&upper_tokens, &mut intent, part_number.as_ref());

    // Overall confidence
    let mut confidence = understanding::BASE_CONFIDENCE
        + pn_confidence * understanding::WEIGHT_PART_NUMBER
        + if brand_detected { understanding::WEIGHT_BRAND } else { 0.0 }
        + category_confidence * understanding::WEIGHT_CATEGORY
        + vehicle_confidence * understanding::WEIGHT_VEHICLE;
    confidence = confidence.clamp(0.0, 1.0);
    // A recognized part number dominates everything else the query may say
    if intent.part_number.is_some() {
        confidence = confidence.max(pn_confidence).max(0.7);
    }
    intent.confidence = confidence;

    intent.search_type = derive_search_type(&intent, pn_confidence);

    intent.raw = Some(json!({
        "normalized": normalized,
        "tokens": tokens,
        "partNumberConfidence": pn_confidence,
        "categoryIndicator": matched_indicator,
        "vehicleConfidence": vehicle_confidence,
        "sizes": sizes,
    }));

    Ok(TokenParse {
        intent,
        part_number_confidence: pn_confidence,
        category_confidence,
        vehicle_confidence,
        brand_detected,
    })
}

struct PartNumberMatch {
    value: String,
    confidence: f64,
}

fn detect_part_number(upper_tokens: &[String], normalized: &str) -> Option<PartNumberMatch> {
    for token in upper_tokens {
        if token.len() >= 5 && (PN_ALPHA_PREFIX.is_match(token) || PN_NUMERIC_ALPHA.is_match(token))
        {
            return Some(PartNumberMatch {
                value: token.clone(),
                confidence: 0.9,
            });
        }
    }

    for token in upper_tokens {
        if PN_NUMERIC_SEP.is_match(token) && !PN_YEAR_RANGE.is_match(token) {
            return Some(PartNumberMatch {
                value: token.clone(),
                confidence: 0.7,
            });
        }
    }

    for token in upper_tokens {
        if PN_OIL_GRADE.is_match(token) {
            return Some(PartNumberMatch {
                value: token.clone(),
                confidence: 0.6,
            });
        }
    }

    // Whole-query compact form: one blob of letters and digits
    let compact: String = normalized.to_uppercase().replace(' ', "");
    if upper_tokens.len() == 1
        && PN_COMPACT.is_match(&compact)
        && compact.chars().any(|c| c.is_ascii_digit())
        && compact.chars().any(|c| c.is_ascii_alphabetic())
        && !YEAR.is_match(&compact)
    {
        return Some(PartNumberMatch {
            value: compact,
            confidence: 0.7,
        });
    }

    None
}

fn detect_model(make: &vocab::MakeEntry, tokens: &[String]) -> Option<String> {
    // Single tokens first, then adjacent pairs for two-word models
    for token in tokens {
        if let Some(model) = make.models.iter().find(|m| m.eq_ignore_ascii_case(token)) {
            return Some(titlecase(model));
        }
    }
    for pair in tokens.windows(2) {
        let joined = format!("{} {}", pair[0], pair[1]);
        if let Some(model) = make.models.iter().find(|m| m.eq_ignore_ascii_case(&joined)) {
            return Some(titlecase(model));
        }
    }
    None
}

fn detect_year(normalized: &str) -> Option<i32> {
    let current_year = chrono::Utc::now().year();
    YEAR.captures(normalized)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<i32>().ok())
        .filter(|y| (1980..=current_year + 1).contains(y))
}

fn detect_positions(normalized: &str, tokens: &[String], intent: &mut Intent) {
    for (indicator, position) in vocab::POSITION_INDICATORS {
        let matched = if indicator.contains(' ') {
            normalized.contains(indicator)
        } else {
            tokens.iter().any(|t| t == indicator)
        };
        if matched {
            intent.push_position(*position);
        }
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct SizeInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    diameter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    displacement: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspiration: Option<String>,
}

fn detect_size_and_engine(
    upper_tokens: &[String],
    intent: &mut Intent,
    part_number: Option<&PartNumberMatch>,
) -> serde_json::Value {
    let mut sizes = SizeInfo::default();

    for token in upper_tokens {
        if sizes.thread.is_none() && THREAD.is_match(token) {
            sizes.thread = Some(token.clone());
        }
        if sizes.diameter.is_none() && DIAMETER.is_match(token) {
            sizes.diameter = Some(token.to_lowercase());
        }
        if sizes.displacement.is_none()
            && (DISPLACEMENT_L.is_match(token) || DISPLACEMENT_CC.is_match(token))
        {
            sizes.displacement = Some(token.to_lowercase());
        }
        if sizes.aspiration.is_none() {
            if let Some(a) = vocab::ASPIRATIONS
                .iter()
                .find(|a| a.eq_ignore_ascii_case(token))
            {
                sizes.aspiration = Some((*a).to_string());
            }
        }

        // Engine codes are short letter-digit blends (1ZZ, N47, 2GRFE is too
        // long). Skip tokens already claimed as the part number and anything
        // that reads as a model name.
        if intent.engine_code.is_none()
            && token.len() >= 3
            && ENGINE_CODE.is_match(token)
            && part_number.map_or(true, |pn| pn.value != *token)
            && !is_any_model(token)
        {
            intent.engine_code = Some(token.clone());
        }
    }

    serde_json::to_value(&sizes).unwrap_or(serde_json::Value::Null)
}

fn is_any_model(token: &str) -> bool {
    vocab::MAKES
        .iter()
        .any(|m| m.models.iter().any(|model| model.eq_ignore_ascii_case(token)))
}

fn derive_search_type(intent: &Intent, pn_confidence: f64) -> SearchType {
    if intent.part_number.is_some() && pn_confidence >= 0.85 {
        SearchType::PartNumber
    } else if intent.vehicle_make.is_some() && intent.category.is_some() {
        SearchType::Fitment
    } else if !intent.brand.is_empty() && intent.category.is_some() {
        SearchType::Catalog
    } else if intent.part_number.is_some() {
        SearchType::PartNumber
    } else {
        SearchType::General
    }
}

fn titlecase(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_punctuation_keeps_separators() {
        assert_eq!(normalize_query("  Brake, pads!  "), "brake pads");
        assert_eq!(normalize_query("04152-YZZA1"), "04152-yzza1");
        assert_eq!(normalize_query("M12x1.5; front"), "m12x1.5 front");
    }

    #[test]
    fn test_empty_query_fails() {
        assert!(matches!(parse_query("   "), Err(SearchError::InvalidQuery)));
        assert!(matches!(parse_query("!!!"), Err(SearchError::InvalidQuery)));
    }

    #[test]
    fn test_oem_part_number() {
        let parsed = parse_query("04152-YZZA1").unwrap();
        let intent = &parsed.intent;
        assert_eq!(intent.part_number.as_deref(), Some("04152-YZZA1"));
        assert_eq!(intent.search_type, SearchType::PartNumber);
        assert!(intent.confidence >= 0.9);
    }

    #[test]
    fn test_alpha_prefix_part_number() {
        let parsed = parse_query("GDB1330").unwrap();
        assert_eq!(parsed.intent.part_number.as_deref(), Some("GDB1330"));
        assert!(parsed.part_number_confidence >= 0.9);
    }

    #[test]
    fn test_year_range_is_not_a_part_number() {
        let parsed = parse_query("camry 2018-2020 toyota").unwrap();
        assert!(parsed.intent.part_number.is_none());
    }

    #[test]
    fn test_fitment_query() {
        let parsed = parse_query("brake pads for 2019 Toyota Camry").unwrap();
        let intent = &parsed.intent;
        assert_eq!(intent.category.as_deref(), Some("brake pad"));
        assert_eq!(intent.vehicle_make.as_deref(), Some("Toyota"));
        assert_eq!(intent.vehicle_model.as_deref(), Some("Camry"));
        assert_eq!(intent.vehicle_year, Some(2019));
        assert_eq!(intent.search_type, SearchType::Fitment);
        assert_eq!(parsed.vehicle_confidence, 0.3 * 3.0);
    }

    #[test]
    fn test_catalog_query() {
        let parsed = parse_query("Bosch oil filter").unwrap();
        let intent = &parsed.intent;
        assert_eq!(intent.brand, vec!["Bosch"]);
        assert_eq!(intent.category.as_deref(), Some("oil filter"));
        assert_eq!(intent.search_type, SearchType::Catalog);
    }

    #[test]
    fn test_position_detection_multilingual() {
        let parsed = parse_query("front left wheel bearing").unwrap();
        assert_eq!(parsed.intent.position, vec![Position::Front, Position::Left]);

        let parsed = parse_query("bremsbeläge vorne links").unwrap();
        assert!(parsed.intent.position.contains(&Position::Front));
        assert!(parsed.intent.position.contains(&Position::Left));
    }

    #[test]
    fn test_german_category() {
        let parsed = parse_query("ölfilter golf 1.9l diesel").unwrap();
        let intent = &parsed.intent;
        assert_eq!(intent.category.as_deref(), Some("oil filter"));
        // "golf" without a make token does not set the model
        assert!(intent.vehicle_model.is_none());
    }

    #[test]
    fn test_engine_code_detection() {
        let parsed = parse_query("timing belt N47 bmw").unwrap();
        assert_eq!(parsed.intent.engine_code.as_deref(), Some("N47"));

        // Model names shaped like engine codes are not claimed
        let parsed = parse_query("ford f-150 brake pads").unwrap();
        assert!(parsed.intent.engine_code.is_none());
    }

    #[test]
    fn test_oil_grade_is_low_confidence_part_number() {
        let parsed = parse_query("5W30").unwrap();
        assert_eq!(parsed.part_number_confidence, 0.6);
        // Floor keeps the intent invariant: a set part number implies >= 0.7
        assert!(parsed.intent.confidence >= 0.7);
    }

    #[test]
    fn test_year_bounds() {
        assert_eq!(detect_year("bmw 1975"), None);
        assert_eq!(detect_year("bmw 1985"), Some(1985));
        let next_year = chrono::Utc::now().year() + 1;
        // Upper bound is current year + 1; the regex alone reaches 2029
        if next_year <= 2029 {
            assert_eq!(detect_year(&format!("bmw {next_year}")), Some(next_year));
        }
    }

    #[test]
    fn test_confidence_additive_and_clamped() {
        let parsed = parse_query("Bosch brake pads for 2019 Toyota Camry front").unwrap();
        let expected = 0.2 + 0.15 + 0.9 * 0.2 + 0.9 * 0.15;
        assert!((parsed.intent.confidence - expected).abs() < 1e-9);
        assert!(parsed.intent.confidence <= 1.0);
    }

    #[test]
    fn test_raw_debug_payload_present() {
        let parsed = parse_query("front brake pads").unwrap();
        let raw = parsed.intent.raw.as_ref().unwrap();
        assert_eq!(raw["normalized"], "front brake pads");
        assert!(raw["tokens"].is_array());
    }
}
