//! Boolean-query builders for the retrieval strategies
//!
//! Field names are fixed by the index mapping: `partNumber`,
//! `partNumberNormalized`, `partNumber.ngram`, `brand`, `category`,
//! `description`, `specifications`, `vehicleFitments.{make,model,yearFrom,yearTo}`,
//! `crossReferences`, `oemReferences`, `supersededBy`, `position`.

use serde_json::{json, Value};

use parts_search_config::constants::retrieval;
use parts_search_core::Intent;

/// Canonical form used by the `partNumberNormalized` field: uppercase with
/// every non-alphanumeric character stripped. The ETL that populates the
/// index applies the same rule, so queries and documents stay in lock-step.
pub fn normalize_part_number(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// The retrieval plan selected from an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ExactPartNumber,
    FuzzyPartNumber,
    CrossReference,
    Fitment,
    CatalogBrowse,
    MultiField,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::ExactPartNumber => "exactPartNumber",
            Strategy::FuzzyPartNumber => "fuzzyPartNumber",
            Strategy::CrossReference => "crossReference",
            Strategy::Fitment => "fitment",
            Strategy::CatalogBrowse => "catalogBrowse",
            Strategy::MultiField => "multiField",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick exactly one strategy, in priority order
pub fn select_strategy(intent: &Intent) -> Strategy {
    if intent.part_number.is_some() {
        Strategy::ExactPartNumber
    } else if intent.cross_reference.is_some() {
        Strategy::CrossReference
    } else if intent.vehicle_make.is_some() && intent.category.is_some() {
        Strategy::Fitment
    } else if !intent.brand.is_empty() && intent.category.is_some() {
        Strategy::CatalogBrowse
    } else {
        Strategy::MultiField
    }
}

/// Build the query tree for a strategy. `None` when the strategy cannot run
/// on this intent (multi-field with no usable terms).
pub fn build_query(intent: &Intent, strategy: Strategy) -> Option<Value> {
    match strategy {
        Strategy::ExactPartNumber => intent
            .part_number
            .as_deref()
            .map(|pn| exact_part_number_query(pn)),
        Strategy::FuzzyPartNumber => intent
            .part_number
            .as_deref()
            .map(|pn| fuzzy_part_number_query(pn)),
        Strategy::CrossReference => intent
            .cross_reference
            .as_deref()
            .map(|r| cross_reference_query(r)),
        Strategy::Fitment => fitment_query(intent),
        Strategy::CatalogBrowse => catalog_browse_query(intent),
        Strategy::MultiField => multi_field_query(intent),
    }
}

/// Exact lookup on the normalized field, boosted over the raw field and an
/// ngram tiebreaker
pub fn exact_part_number_query(part_number: &str) -> Value {
    let normalized = normalize_part_number(part_number);
    json!({
        "bool": {
            "should": [
                { "term": { "partNumberNormalized": { "value": normalized, "boost": retrieval::BOOST_EXACT } } },
                { "term": { "partNumber": { "value": part_number, "boost": retrieval::BOOST_PART_NUMBER } } },
                { "match": { "partNumber.ngram": { "query": part_number } } }
            ],
            "minimum_should_match": 1
        }
    })
}

/// Edit-distance fallback when the exact probe comes back empty
pub fn fuzzy_part_number_query(part_number: &str) -> Value {
    let normalized = normalize_part_number(part_number);
    json!({
        "bool": {
            "should": [
                {
                    "fuzzy": {
                        "partNumberNormalized": {
                            "value": normalized,
                            "fuzziness": retrieval::FUZZY_FUZZINESS,
                            "prefix_length": retrieval::FUZZY_PREFIX_LENGTH,
                            "boost": retrieval::BOOST_PART_NUMBER
                        }
                    }
                },
                { "prefix": { "partNumberNormalized": { "value": normalized } } }
            ],
            "minimum_should_match": 1
        }
    })
}

/// Look the identifier up across every reference field
pub fn cross_reference_query(reference: &str) -> Value {
    let normalized = normalize_part_number(reference);
    json!({
        "bool": {
            "should": [
                { "terms": { "crossReferences": [normalized], "boost": retrieval::BOOST_EXACT } },
                { "terms": { "oemReferences": [normalized], "boost": retrieval::BOOST_EXACT } },
                { "terms": { "supersededBy": [normalized] } },
                { "term": { "partNumberNormalized": { "value": normalized, "boost": retrieval::BOOST_PART_NUMBER } } }
            ],
            "minimum_should_match": 1
        }
    })
}

/// Make and category are required; model and year refine the match
pub fn fitment_query(intent: &Intent) -> Option<Value> {
    let make = intent.vehicle_make.as_deref()?;
    let category = intent.category.as_deref()?;

    let must = vec![
        json!({ "match": { "vehicleFitments.make": { "query": make } } }),
        json!({ "match": { "category": { "query": category, "boost": retrieval::BOOST_CATEGORY } } }),
    ];
    let mut should = Vec::new();

    if let Some(model) = &intent.vehicle_model {
        should.push(json!({ "match": { "vehicleFitments.model": { "query": model } } }));
    }
    if let Some(year) = intent.vehicle_year {
        // Containment: yearFrom <= year <= yearTo
        should.push(json!({
            "bool": {
                "must": [
                    { "range": { "vehicleFitments.yearFrom": { "lte": year } } },
                    { "range": { "vehicleFitments.yearTo": { "gte": year } } }
                ]
            }
        }));
    }
    if !intent.brand.is_empty() {
        should.push(json!({ "terms": { "brand": intent.brand, "boost": retrieval::BOOST_BRAND } }));
    }
    if !intent.position.is_empty() {
        let positions: Vec<&str> = intent.position.iter().map(|p| p.as_str()).collect();
        should.push(json!({ "terms": { "position": positions } }));
    }
    if let Some(engine_code) = &intent.engine_code {
        should.push(json!({ "terms": { "engineCodes": [engine_code] } }));
    }

    let mut bool_clause = serde_json::Map::new();
    bool_clause.insert("must".to_string(), Value::Array(must));
    if !should.is_empty() {
        bool_clause.insert("should".to_string(), Value::Array(should));
    }
    Some(json!({ "bool": bool_clause }))
}

/// Brand plus category browse
pub fn catalog_browse_query(intent: &Intent) -> Option<Value> {
    if intent.brand.is_empty() {
        return None;
    }
    let category = intent.category.as_deref()?;

    let mut should = Vec::new();
    if !intent.position.is_empty() {
        let positions: Vec<&str> = intent.position.iter().map(|p| p.as_str()).collect();
        should.push(json!({ "terms": { "position": positions } }));
    }
    should.push(json!({ "match": { "description": { "query": category } } }));

    Some(json!({
        "bool": {
            "must": [
                { "terms": { "brand": intent.brand, "boost": retrieval::BOOST_BRAND } },
                { "match": { "category": { "query": category, "boost": retrieval::BOOST_CATEGORY } } }
            ],
            "should": should
        }
    }))
}

/// Free-text fallback across every searchable field. Refuses to run when the
/// intent contributes no terms at all.
pub fn multi_field_query(intent: &Intent) -> Option<Value> {
    let mut terms: Vec<String> = Vec::new();
    if let Some(pn) = &intent.part_number {
        terms.push(pn.clone());
    }
    terms.extend(intent.brand.iter().cloned());
    if let Some(category) = &intent.category {
        terms.push(category.clone());
    }
    if let Some(make) = &intent.vehicle_make {
        terms.push(make.clone());
    }
    if let Some(model) = &intent.vehicle_model {
        terms.push(model.clone());
    }
    if let Some(engine_code) = &intent.engine_code {
        terms.push(engine_code.clone());
    }
    terms.extend(intent.position.iter().map(|p| p.as_str().to_string()));

    if terms.is_empty() {
        return None;
    }

    let query_text = terms.join(" ");
    Some(json!({
        "multi_match": {
            "query": query_text,
            "type": "best_fields",
            "fields": [
                format!("partNumber^{}", retrieval::BOOST_PART_NUMBER),
                format!("brand^{}", retrieval::BOOST_BRAND),
                format!("category^{}", retrieval::BOOST_CATEGORY),
                "description",
                "specifications",
                "oemReferences",
                "crossReferences"
            ],
            "fuzziness": "AUTO"
        }
    }))
}
