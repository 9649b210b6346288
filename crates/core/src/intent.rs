//! Structured search intent
//!
//! The `Intent` is produced by query understanding and consumed by every
//! downstream stage. It is immutable once produced; stages read it but never
//! write back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the query should be searched, derived from what was recognized in it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchType {
    /// High-confidence OEM part number present
    #[serde(rename = "partNumber")]
    PartNumber,
    /// Vehicle context plus a category
    #[serde(rename = "fitment")]
    Fitment,
    /// Brand plus category browse
    #[serde(rename = "catalog")]
    Catalog,
    /// Free-text fallback
    #[serde(rename = "general")]
    #[default]
    General,
    /// Alternate identifier lookup
    #[serde(rename = "cross-reference")]
    CrossReference,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::PartNumber => "partNumber",
            SearchType::Fitment => "fitment",
            SearchType::Catalog => "catalog",
            SearchType::General => "general",
            SearchType::CrossReference => "cross-reference",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mounting position of a part on the vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Front,
    Rear,
    Left,
    Right,
    Upper,
    Lower,
    Inner,
    Outer,
    Driver,
    Passenger,
}

impl Position {
    pub const ALL: [Position; 10] = [
        Position::Front,
        Position::Rear,
        Position::Left,
        Position::Right,
        Position::Upper,
        Position::Lower,
        Position::Inner,
        Position::Outer,
        Position::Driver,
        Position::Passenger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Front => "front",
            Position::Rear => "rear",
            Position::Left => "left",
            Position::Right => "right",
            Position::Upper => "upper",
            Position::Lower => "lower",
            Position::Inner => "inner",
            Position::Outer => "outer",
            Position::Driver => "driver",
            Position::Passenger => "passenger",
        }
    }
}

impl FromStr for Position {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or(())
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured representation of what the user is searching for
///
/// Invariants maintained by the producer (token parser + validator):
/// - enumerated fields come from the closed vocabularies
/// - `confidence` is clamped to [0, 1] and is >= 0.7 whenever `part_number` is set
/// - `search_type == Fitment` implies `vehicle_make` is set
/// - `brand` and `position` are deduplicated
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Intent {
    /// OEM-style identifier, uppercased with separators preserved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    /// Alternate identifier for cross-reference lookup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_reference: Option<String>,
    /// Normalized product category
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Requested manufacturer names
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub brand: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_code: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub position: Vec<Position>,
    pub search_type: SearchType,
    pub confidence: f64,
    /// Raw token-parser output, preserved for debugging downstream
    #[serde(rename = "_raw", skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl Intent {
    /// Intent with nothing recognized
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when no field was recognized at all
    pub fn is_empty(&self) -> bool {
        self.part_number.is_none()
            && self.cross_reference.is_none()
            && self.category.is_none()
            && self.brand.is_empty()
            && self.vehicle_make.is_none()
            && self.vehicle_model.is_none()
            && self.vehicle_year.is_none()
            && self.engine_code.is_none()
            && self.position.is_empty()
    }

    /// True when a part number was recognized with high confidence, which
    /// lets understanding skip the LLM entirely
    pub fn has_confident_part_number(&self) -> bool {
        self.part_number.is_some() && self.confidence >= 0.85
    }

    /// Add a brand if not already present
    pub fn push_brand(&mut self, brand: impl Into<String>) {
        let brand = brand.into();
        if !self.brand.iter().any(|b| b.eq_ignore_ascii_case(&brand)) {
            self.brand.push(brand);
        }
    }

    /// Add a position if not already present
    pub fn push_position(&mut self, position: Position) {
        if !self.position.contains(&position) {
            self.position.push(position);
        }
    }

    /// Clamp confidence into [0, 1]
    pub fn clamp_confidence(&mut self) {
        self.confidence = self.confidence.clamp(0.0, 1.0);
    }
}
