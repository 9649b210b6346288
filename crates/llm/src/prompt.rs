//! Intent-extraction prompt and output handling
//!
//! The prompt is deterministic (temperature <= 0.1) and demands JSON-only
//! output in the exact intent shape. Models still wrap JSON in prose or code
//! fences often enough that extraction scans for the first balanced object.

use serde_json::Value;

use parts_search_query::vocab;

/// Build the intent-extraction prompt for one query
pub fn build_intent_prompt(query: &str) -> String {
    let categories: Vec<&str> = vocab::CATEGORIES.iter().map(|c| c.name).collect();
    let makes: Vec<&str> = vocab::MAKES.iter().map(|m| m.name).collect();
    let brands: Vec<&str> = vocab::BRANDS.to_vec();

    format!(
        r#"You are a parts-search query analyzer for an automotive parts catalog.
Analyze the query and respond with ONLY a JSON object, no other text.

The JSON object has exactly these fields (omit a field when not present in the query):
{{
  "partNumber": "OEM-style part identifier, uppercase, keep separators",
  "crossReference": "alternate identifier to cross-reference, if the query asks for an equivalent",
  "category": "one of the known categories",
  "brand": ["manufacturer names from the known brands"],
  "vehicleMake": "one of the known makes",
  "vehicleModel": "model name",
  "vehicleYear": 2019,
  "engineCode": "engine code like N47",
  "position": ["front", "rear", "left", "right", "upper", "lower", "inner", "outer", "driver", "passenger"],
  "searchType": "partNumber" | "fitment" | "catalog" | "general" | "cross-reference",
  "confidence": 0.0
}}

Known categories: {categories}
Known makes: {makes}
Known brands: {brands}

Rules:
- Use only values from the known lists for category, vehicleMake and brand.
- searchType is "partNumber" when a part number is present, "fitment" when a
  vehicle is named, "catalog" for brand plus category, "cross-reference" when
  the query asks for an equivalent or replacement number, otherwise "general".
- confidence is your certainty in [0, 1].
- Respond with the JSON object only.

Query: "{query}""#,
        categories = categories.join(", "),
        makes = makes.join(", "),
        brands = brands.join(", "),
        query = query.replace('"', "'"),
    )
}

/// Extract the first balanced `{...}` substring from LLM output.
///
/// String-literal aware, so braces inside JSON strings do not end the scan.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Quick plausibility check on a parsed LLM object: an intent that names
/// neither a part number, category, brand nor vehicle make is rejected
/// rather than silently producing an empty intent.
pub fn looks_like_intent(value: &Value) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    ["partNumber", "category", "brand", "vehicleMake"]
        .iter()
        .any(|key| match object.get(*key) {
            Some(Value::Null) | None => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(a)) => !a.is_empty(),
            Some(_) => true,
        })
}
