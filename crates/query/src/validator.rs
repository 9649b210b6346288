//! Schema validation for intents
//!
//! Lowers a generic JSON blob (typically LLM output) into a typed [`Intent`]
//! with per-field errors and warnings. Two configurations:
//!
//! - **strict**: unknown fields are dropped, invalid values are errors
//! - **lenient**: unknown fields are preserved under `_raw`, fixable fields
//!   (`brand`, `category`, `position`) get a closest-vocabulary-match pass,
//!   other invalid values are dropped with a warning
//!
//! [`Intent`]: parts_search_core::Intent

use chrono::Datelike;
use serde_json::Value;

use parts_search_core::{Intent, Position, SearchType};

use crate::vocab;

const KNOWN_FIELDS: &[&str] = &[
    "partNumber",
    "crossReference",
    "category",
    "brand",
    "vehicleMake",
    "vehicleModel",
    "vehicleYear",
    "engineCode",
    "position",
    "searchType",
    "confidence",
    "_raw",
];

/// Validation strictness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Strict,
    Lenient,
}

/// Result of lowering a value into an intent
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub intent: Intent,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validates JSON blobs and typed intents against the closed vocabularies
#[derive(Debug, Clone, Copy)]
pub struct SchemaValidator {
    mode: ValidationMode,
    max_string_len: usize,
    max_items: usize,
}

impl SchemaValidator {
    pub fn strict() -> Self {
        Self {
            mode: ValidationMode::Strict,
            max_string_len: 64,
            max_items: 10,
        }
    }

    pub fn lenient() -> Self {
        Self {
            mode: ValidationMode::Lenient,
            ..Self::strict()
        }
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Lower a raw JSON value into an intent
    pub fn validate_value(&self, value: &Value) -> ValidationOutcome {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut intent = Intent::empty();

        let Some(object) = value.as_object() else {
            return ValidationOutcome {
                valid: false,
                intent,
                errors: vec!["expected a JSON object".to_string()],
                warnings,
            };
        };

        for (key, field) in object {
            match key.as_str() {
                "partNumber" => {
                    if let Some(s) = self.string_field(field, key, &mut errors, &mut warnings) {
                        intent.part_number = Some(s.to_uppercase());
                    }
                }
                "crossReference" => {
                    if let Some(s) = self.string_field(field, key, &mut errors, &mut warnings) {
                        intent.cross_reference = Some(s.to_uppercase());
                    }
                }
                "category" => {
                    if let Some(s) = self.string_field(field, key, &mut errors, &mut warnings) {
                        let lower = s.to_lowercase();
                        if vocab::is_known_category(&lower) {
                            intent.category = Some(lower);
                        } else {
                            match self.mode {
                                ValidationMode::Lenient => match vocab::closest_category(&lower) {
                                    Some(fixed) => {
                                        warnings.push(format!(
                                            "category '{s}' mapped to '{fixed}'"
                                        ));
                                        intent.category = Some(fixed.to_string());
                                    }
                                    None => warnings
                                        .push(format!("category '{s}' not in vocabulary, dropped")),
                                },
                                ValidationMode::Strict => {
                                    errors.push(format!("category '{s}' not in vocabulary"))
                                }
                            }
                        }
                    }
                }
                "brand" => {
                    for item in self.array_field(field, key, &mut errors, &mut warnings) {
                        let Some(s) = coerce_string(&item) else {
                            warnings.push(format!("{key}: non-string item dropped"));
                            continue;
                        };
                        if let Some(canonical) = vocab::match_brand(&s) {
                            intent.push_brand(canonical);
                        } else if self.mode == ValidationMode::Lenient {
                            match vocab::closest_brand(&s) {
                                Some(fixed) => {
                                    warnings.push(format!("brand '{s}' mapped to '{fixed}'"));
                                    intent.push_brand(fixed);
                                }
                                None => {
                                    warnings.push(format!("brand '{s}' not in vocabulary, dropped"))
                                }
                            }
                        } else {
                            errors.push(format!("brand '{s}' not in vocabulary"));
                        }
                    }
                }
                "vehicleMake" => {
                    if let Some(s) = self.string_field(field, key, &mut errors, &mut warnings) {
                        match vocab::match_make(&s).or_else(|| vocab::make_by_name(&s)) {
                            Some(make) => intent.vehicle_make = Some(make.name.to_string()),
                            None => match self.mode {
                                ValidationMode::Lenient => {
                                    warnings.push(format!("vehicleMake '{s}' not in vocabulary"));
                                    intent.vehicle_make = Some(s);
                                }
                                ValidationMode::Strict => {
                                    errors.push(format!("vehicleMake '{s}' not in vocabulary"))
                                }
                            },
                        }
                    }
                }
                "vehicleModel" => {
                    if let Some(s) = self.string_field(field, key, &mut errors, &mut warnings) {
                        intent.vehicle_model = Some(s);
                    }
                }
                "vehicleYear" => match coerce_i64(field) {
                    Some(year) => {
                        let current = chrono::Utc::now().year() as i64;
                        if (1900..=current + 2).contains(&year) {
                            intent.vehicle_year = Some(year as i32);
                        } else {
                            self.reject(
                                format!("vehicleYear {year} out of range"),
                                &mut errors,
                                &mut warnings,
                            );
                        }
                    }
                    None if !field.is_null() => {
                        self.reject(
                            format!("vehicleYear: expected a number, got {field}"),
                            &mut errors,
                            &mut warnings,
                        );
                    }
                    None => {}
                },
                "engineCode" => {
                    if let Some(s) = self.string_field(field, key, &mut errors, &mut warnings) {
                        intent.engine_code = Some(s.to_uppercase());
                    }
                }
                "position" => {
                    for item in self.array_field(field, key, &mut errors, &mut warnings) {
                        let Some(s) = coerce_string(&item) else {
                            warnings.push(format!("{key}: non-string item dropped"));
                            continue;
                        };
                        let lower = s.to_lowercase();
                        match lower.parse::<Position>() {
                            Ok(p) => intent.push_position(p),
                            Err(()) if self.mode == ValidationMode::Lenient => {
                                match closest_position(&lower) {
                                    Some(p) => {
                                        warnings
                                            .push(format!("position '{s}' mapped to '{p}'"));
                                        intent.push_position(p);
                                    }
                                    None => warnings
                                        .push(format!("position '{s}' not recognized, dropped")),
                                }
                            }
                            Err(()) => errors.push(format!("position '{s}' not recognized")),
                        }
                    }
                }
                "searchType" => {
                    if let Some(s) = coerce_string(field) {
                        match serde_json::from_value::<SearchType>(Value::String(s.clone())) {
                            Ok(st) => intent.search_type = st,
                            Err(_) => match self.mode {
                                ValidationMode::Lenient => {
                                    warnings.push(format!(
                                        "searchType '{s}' not recognized, defaulting to general"
                                    ));
                                }
                                ValidationMode::Strict => {
                                    errors.push(format!("searchType '{s}' not recognized"))
                                }
                            },
                        }
                    }
                }
                "confidence" => match coerce_f64(field) {
                    Some(c) => {
                        if !(0.0..=1.0).contains(&c) {
                            warnings.push(format!("confidence {c} clamped to [0, 1]"));
                        }
                        intent.confidence = c.clamp(0.0, 1.0);
                    }
                    None if !field.is_null() => {
                        self.reject(
                            format!("confidence: expected a number, got {field}"),
                            &mut errors,
                            &mut warnings,
                        );
                    }
                    None => {}
                },
                "_raw" => intent.raw = Some(field.clone()),
                unknown => match self.mode {
                    ValidationMode::Strict => {
                        warnings.push(format!("unknown field '{unknown}' dropped"));
                    }
                    ValidationMode::Lenient => {
                        warnings.push(format!("unknown field '{unknown}' preserved"));
                        let raw = intent
                            .raw
                            .get_or_insert_with(|| Value::Object(Default::default()));
                        if let Some(map) = raw.as_object_mut() {
                            map.insert(unknown.to_string(), field.clone());
                        }
                    }
                },
            }
        }

        self.enforce_invariants(&mut intent, &mut errors, &mut warnings);

        ValidationOutcome {
            valid: errors.is_empty(),
            intent,
            errors,
            warnings,
        }
    }

    /// Validate an already-typed intent. A valid intent passes through
    /// unchanged.
    pub fn validate_intent(&self, intent: &Intent) -> ValidationOutcome {
        match serde_json::to_value(intent) {
            Ok(value) => self.validate_value(&value),
            Err(e) => ValidationOutcome {
                valid: false,
                intent: intent.clone(),
                errors: vec![format!("intent not serializable: {e}")],
                warnings: Vec::new(),
            },
        }
    }

    fn enforce_invariants(
        &self,
        intent: &mut Intent,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) {
        if intent.search_type == SearchType::Fitment && intent.vehicle_make.is_none() {
            match self.mode {
                ValidationMode::Lenient => {
                    warnings.push("fitment search without vehicleMake, downgraded to general".to_string());
                    intent.search_type = SearchType::General;
                }
                ValidationMode::Strict => {
                    errors.push("fitment search requires vehicleMake".to_string())
                }
            }
        }

        if intent.part_number.is_some() && intent.confidence < 0.7 {
            warnings.push("confidence raised to 0.7 for part-number intent".to_string());
            intent.confidence = 0.7;
        }
    }

    fn reject(&self, message: String, errors: &mut Vec<String>, warnings: &mut Vec<String>) {
        match self.mode {
            ValidationMode::Strict => errors.push(message),
            ValidationMode::Lenient => warnings.push(message),
        }
    }

    /// Coerced, trimmed, length-capped string field
    fn string_field(
        &self,
        field: &Value,
        key: &str,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Option<String> {
        if field.is_null() {
            return None;
        }
        let Some(mut s) = coerce_string(field) else {
            self.reject(
                format!("{key}: expected a string, got {field}"),
                errors,
                warnings,
            );
            return None;
        };
        if s.len() > self.max_string_len {
            warnings.push(format!(
                "{key}: truncated to {} characters",
                self.max_string_len
            ));
            s.truncate(self.max_string_len);
        }
        Some(s)
    }

    /// Arrays are returned as-is (capped); singletons are wrapped
    fn array_field(
        &self,
        field: &Value,
        key: &str,
        errors: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> Vec<Value> {
        match field {
            Value::Array(items) => {
                if items.len() > self.max_items {
                    warnings.push(format!("{key}: capped at {} items", self.max_items));
                }
                items.iter().take(self.max_items).cloned().collect()
            }
            Value::String(_) | Value::Number(_) => vec![field.clone()],
            Value::Null => Vec::new(),
            other => {
                self.reject(
                    format!("{key}: expected an array, got {other}"),
                    errors,
                    warnings,
                );
                Vec::new()
            }
        }
    }
}

fn coerce_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn closest_position(value: &str) -> Option<Position> {
    vocab::POSITION_INDICATORS
        .iter()
        .find(|(indicator, _)| value.contains(indicator) || indicator.contains(value))
        .map(|(_, p)| *p)
}

/// Merge intents with fill-missing semantics: the primary wins wherever it
/// has a value, arrays union with dedup, confidence takes the max.
pub fn merge_intents(primary: Intent, others: &[Intent]) -> Intent {
    let mut merged = primary;
    for other in others {
        merged.part_number = merged.part_number.or_else(|| other.part_number.clone());
        merged.cross_reference = merged
            .cross_reference
            .or_else(|| other.cross_reference.clone());
        merged.category = merged.category.or_else(|| other.category.clone());
        merged.vehicle_make = merged.vehicle_make.or_else(|| other.vehicle_make.clone());
        merged.vehicle_model = merged.vehicle_model.or_else(|| other.vehicle_model.clone());
        merged.vehicle_year = merged.vehicle_year.or(other.vehicle_year);
        merged.engine_code = merged.engine_code.or_else(|| other.engine_code.clone());
        for brand in &other.brand {
            merged.push_brand(brand.clone());
        }
        for position in &other.position {
            merged.push_position(*position);
        }
        if merged.search_type == SearchType::General {
            merged.search_type = other.search_type;
        }
        merged.confidence = merged.confidence.max(other.confidence);
        if merged.raw.is_none() {
            merged.raw = other.raw.clone();
        }
    }
    merged
}

/// The understanding-stage merge of token and LLM intents.
///
/// Precedence: the LLM wins for `category`, `vehicleMake`, `vehicleModel`
/// and `searchType`; the token parser wins for `partNumber` and
/// `vehicleYear`; arrays union; confidence takes the max.
pub fn merge_hybrid(token: Intent, llm: Intent) -> Intent {
    let mut merged = token.clone();

    if llm.category.is_some() {
        merged.category = llm.category;
    }
    if llm.vehicle_make.is_some() {
        merged.vehicle_make = llm.vehicle_make;
    }
    if llm.vehicle_model.is_some() {
        merged.vehicle_model = llm.vehicle_model;
    }
    if llm.search_type != SearchType::General {
        merged.search_type = llm.search_type;
    }

    // Token parser wins for part number and year; the LLM only fills gaps
    merged.part_number = token.part_number.or(llm.part_number);
    merged.vehicle_year = token.vehicle_year.or(llm.vehicle_year);
    merged.cross_reference = merged.cross_reference.or(llm.cross_reference);
    merged.engine_code = merged.engine_code.or(llm.engine_code);

    for brand in llm.brand {
        merged.push_brand(brand);
    }
    for position in llm.position {
        merged.push_position(position);
    }
    merged.confidence = merged.confidence.max(llm.confidence);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_intent_round_trips_unchanged() {
        let intent = Intent {
            part_number: Some("GDB1330".into()),
            category: Some("brake pad".into()),
            brand: vec!["TRW".into()],
            vehicle_make: Some("Toyota".into()),
            vehicle_model: Some("Camry".into()),
            vehicle_year: Some(2019),
            position: vec![Position::Front],
            search_type: SearchType::PartNumber,
            confidence: 0.9,
            ..Intent::default()
        };
        let outcome = SchemaValidator::strict().validate_intent(&intent);
        assert!(outcome.valid, "errors: {:?}", outcome.errors);
        assert_eq!(outcome.intent, intent);
    }

    #[test]
    fn test_coercion_string_to_number_and_back() {
        let outcome = SchemaValidator::lenient().validate_value(&json!({
            "partNumber": 90915,
            "vehicleYear": "2019",
            "confidence": "0.8"
        }));
        assert!(outcome.valid);
        assert_eq!(outcome.intent.part_number.as_deref(), Some("90915"));
        assert_eq!(outcome.intent.vehicle_year, Some(2019));
        assert!((outcome.intent.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_singleton_brand_is_wrapped() {
        let outcome = SchemaValidator::lenient().validate_value(&json!({
            "brand": "bosch"
        }));
        assert_eq!(outcome.intent.brand, vec!["Bosch"]);
    }

    #[test]
    fn test_lenient_fixes_category_strict_rejects() {
        let blob = json!({ "category": "brake pads" });

        let lenient = SchemaValidator::lenient().validate_value(&blob);
        assert!(lenient.valid);
        assert_eq!(lenient.intent.category.as_deref(), Some("brake pad"));
        assert!(!lenient.warnings.is_empty());

        let strict = SchemaValidator::strict().validate_value(&blob);
        assert!(!strict.valid);
        assert!(strict.intent.category.is_none());
    }

    #[test]
    fn test_unknown_fields_preserved_in_lenient_dropped_in_strict() {
        let blob = json!({ "category": "oil filter", "shopNote": "ask supplier" });

        let lenient = SchemaValidator::lenient().validate_value(&blob);
        assert!(lenient.valid);
        let raw = lenient.intent.raw.as_ref().unwrap();
        assert_eq!(raw["shopNote"], "ask supplier");

        let strict = SchemaValidator::strict().validate_value(&blob);
        assert!(strict.intent.raw.is_none());
        assert!(strict.warnings.iter().any(|w| w.contains("shopNote")));
    }

    #[test]
    fn test_year_out_of_range() {
        let strict = SchemaValidator::strict().validate_value(&json!({ "vehicleYear": 1830 }));
        assert!(!strict.valid);

        let lenient = SchemaValidator::lenient().validate_value(&json!({ "vehicleYear": 1830 }));
        assert!(lenient.valid);
        assert!(lenient.intent.vehicle_year.is_none());
    }

    #[test]
    fn test_fitment_without_make_downgraded() {
        let lenient = SchemaValidator::lenient().validate_value(&json!({
            "searchType": "fitment",
            "category": "brake pad"
        }));
        assert!(lenient.valid);
        assert_eq!(lenient.intent.search_type, SearchType::General);

        let strict = SchemaValidator::strict().validate_value(&json!({
            "searchType": "fitment",
            "category": "brake pad"
        }));
        assert!(!strict.valid);
    }

    #[test]
    fn test_brand_array_caps_and_dedups() {
        let brands: Vec<_> = std::iter::repeat(json!("Bosch")).take(15).collect();
        let outcome = SchemaValidator::lenient().validate_value(&json!({ "brand": brands }));
        assert_eq!(outcome.intent.brand, vec!["Bosch"]);
        assert!(outcome.warnings.iter().any(|w| w.contains("capped")));
    }

    #[test]
    fn test_string_truncation_warns() {
        let long = "X".repeat(200);
        let outcome = SchemaValidator::lenient().validate_value(&json!({ "vehicleModel": long }));
        assert_eq!(outcome.intent.vehicle_model.as_ref().unwrap().len(), 64);
        assert!(outcome.warnings.iter().any(|w| w.contains("truncated")));
    }

    #[test]
    fn test_merge_intents_fill_missing() {
        let primary = Intent {
            category: Some("brake pad".into()),
            confidence: 0.5,
            ..Intent::default()
        };
        let other = Intent {
            category: Some("brake disc".into()),
            vehicle_make: Some("Toyota".into()),
            brand: vec!["ATE".into()],
            confidence: 0.8,
            ..Intent::default()
        };
        let merged = merge_intents(primary, &[other]);
        assert_eq!(merged.category.as_deref(), Some("brake pad"));
        assert_eq!(merged.vehicle_make.as_deref(), Some("Toyota"));
        assert_eq!(merged.brand, vec!["ATE"]);
        assert!((merged.confidence - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_hybrid_merge_precedence() {
        let token = Intent {
            part_number: Some("GDB1330".into()),
            category: Some("brake disc".into()),
            vehicle_year: Some(2019),
            confidence: 0.6,
            ..Intent::default()
        };
        let llm = Intent {
            part_number: Some("WRONG-1".into()),
            category: Some("brake pad".into()),
            vehicle_make: Some("Toyota".into()),
            vehicle_year: Some(2007),
            search_type: SearchType::Fitment,
            confidence: 0.85,
            ..Intent::default()
        };
        let merged = merge_hybrid(token, llm);
        // LLM wins category, make, search type
        assert_eq!(merged.category.as_deref(), Some("brake pad"));
        assert_eq!(merged.vehicle_make.as_deref(), Some("Toyota"));
        assert_eq!(merged.search_type, SearchType::Fitment);
        // Token wins part number and year
        assert_eq!(merged.part_number.as_deref(), Some("GDB1330"));
        assert_eq!(merged.vehicle_year, Some(2019));
        assert!((merged.confidence - 0.85).abs() < 1e-9);
    }
}
