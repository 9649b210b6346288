//! Retrieval candidates and ranking features
//!
//! A `Candidate` is one record pulled from the text index. Filtering and
//! ranking mutate it in place (adding scores and features, never removing
//! data); the orchestrator truncates the final slice for pagination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One vehicle compatibility entry on a part record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleFitment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_from: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_to: Option<i32>,
}

impl VehicleFitment {
    /// Range containment check, open-ended on missing bounds
    pub fn covers_year(&self, year: i32) -> bool {
        self.year_from.map_or(true, |from| from <= year)
            && self.year_to.map_or(true, |to| year <= to)
    }
}

/// Typed view of the documented subset of an indexed part record
///
/// The record is passed through the pipeline verbatim; unknown fields are
/// preserved in `extra` so the `_source` echo in the response is lossless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PartRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_number_normalized: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub prices: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifications: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vehicle_fitments: Vec<VehicleFitment>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cross_references: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub oem_references: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub superseded_by: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub engine_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Undocumented index fields, passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PartRecord {
    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.is_empty()) || !self.images.is_empty()
    }

    pub fn has_specifications(&self) -> bool {
        match &self.specifications {
            Some(serde_json::Value::Object(map)) => !map.is_empty(),
            Some(serde_json::Value::Null) | None => false,
            Some(_) => true,
        }
    }

    /// Stock indicator: explicit quantity wins over the boolean flag
    pub fn stock_quantity(&self) -> i64 {
        match (self.stock, self.in_stock) {
            (Some(qty), _) => qty.max(0),
            (None, Some(true)) => 1,
            _ => 0,
        }
    }

    pub fn has_stock(&self) -> bool {
        self.stock_quantity() > 0
    }

    pub fn effective_price(&self) -> Option<f64> {
        self.price.or_else(|| {
            self.prices
                .iter()
                .find_map(|p| p.get("price").and_then(|v| v.as_f64()).or_else(|| p.as_f64()))
        })
    }

    pub fn has_price(&self) -> bool {
        self.effective_price().is_some_and(|p| p > 0.0)
    }

    pub fn has_cross_reference(&self) -> bool {
        !self.cross_references.is_empty()
            || !self.oem_references.is_empty()
            || !self.superseded_by.is_empty()
    }
}

/// Identifiers for the ranking features, used by the weight vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Feature {
    EsScore,
    PartNumberMatch,
    CategoryMatch,
    BrandMatch,
    VehicleFitment,
    DataCompleteness,
    HasImage,
    HasStock,
    ClickRate,
    PurchaseRate,
    Freshness,
}

impl Feature {
    pub const ALL: [Feature; 11] = [
        Feature::EsScore,
        Feature::PartNumberMatch,
        Feature::CategoryMatch,
        Feature::BrandMatch,
        Feature::VehicleFitment,
        Feature::DataCompleteness,
        Feature::HasImage,
        Feature::HasStock,
        Feature::ClickRate,
        Feature::PurchaseRate,
        Feature::Freshness,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::EsScore => "esScore",
            Feature::PartNumberMatch => "partNumberMatch",
            Feature::CategoryMatch => "categoryMatch",
            Feature::BrandMatch => "brandMatch",
            Feature::VehicleFitment => "vehicleFitment",
            Feature::DataCompleteness => "dataCompleteness",
            Feature::HasImage => "hasImage",
            Feature::HasStock => "hasStock",
            Feature::ClickRate => "clickRate",
            Feature::PurchaseRate => "purchaseRate",
            Feature::Freshness => "freshness",
        }
    }

    pub fn parse(s: &str) -> Option<Feature> {
        Feature::ALL.iter().find(|f| f.as_str() == s).copied()
    }
}

/// Per-candidate feature values, all in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureVector {
    pub es_score: f64,
    pub part_number_match: f64,
    pub category_match: f64,
    pub brand_match: f64,
    pub vehicle_fitment: f64,
    pub data_completeness: f64,
    pub has_image: f64,
    pub has_stock: f64,
    pub click_rate: f64,
    pub purchase_rate: f64,
    pub freshness: f64,
}

impl FeatureVector {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::EsScore => self.es_score,
            Feature::PartNumberMatch => self.part_number_match,
            Feature::CategoryMatch => self.category_match,
            Feature::BrandMatch => self.brand_match,
            Feature::VehicleFitment => self.vehicle_fitment,
            Feature::DataCompleteness => self.data_completeness,
            Feature::HasImage => self.has_image,
            Feature::HasStock => self.has_stock,
            Feature::ClickRate => self.click_rate,
            Feature::PurchaseRate => self.purchase_rate,
            Feature::Freshness => self.freshness,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        let slot = match feature {
            Feature::EsScore => &mut self.es_score,
            Feature::PartNumberMatch => &mut self.part_number_match,
            Feature::CategoryMatch => &mut self.category_match,
            Feature::BrandMatch => &mut self.brand_match,
            Feature::VehicleFitment => &mut self.vehicle_fitment,
            Feature::DataCompleteness => &mut self.data_completeness,
            Feature::HasImage => &mut self.has_image,
            Feature::HasStock => &mut self.has_stock,
            Feature::ClickRate => &mut self.click_rate,
            Feature::PurchaseRate => &mut self.purchase_rate,
            Feature::Freshness => &mut self.freshness,
        };
        *slot = value.clamp(0.0, 1.0);
    }
}

/// A weight vector over the ranking features
///
/// Weights are kept normalized so scores stay comparable across experiment
/// groups and across online updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankWeights {
    pub es_score: f64,
    pub part_number_match: f64,
    pub category_match: f64,
    pub brand_match: f64,
    pub vehicle_fitment: f64,
    pub data_completeness: f64,
    pub has_image: f64,
    pub has_stock: f64,
    pub click_rate: f64,
    pub purchase_rate: f64,
    pub freshness: f64,
}

impl RankWeights {
    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::EsScore => self.es_score,
            Feature::PartNumberMatch => self.part_number_match,
            Feature::CategoryMatch => self.category_match,
            Feature::BrandMatch => self.brand_match,
            Feature::VehicleFitment => self.vehicle_fitment,
            Feature::DataCompleteness => self.data_completeness,
            Feature::HasImage => self.has_image,
            Feature::HasStock => self.has_stock,
            Feature::ClickRate => self.click_rate,
            Feature::PurchaseRate => self.purchase_rate,
            Feature::Freshness => self.freshness,
        }
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        let slot = match feature {
            Feature::EsScore => &mut self.es_score,
            Feature::PartNumberMatch => &mut self.part_number_match,
            Feature::CategoryMatch => &mut self.category_match,
            Feature::BrandMatch => &mut self.brand_match,
            Feature::VehicleFitment => &mut self.vehicle_fitment,
            Feature::DataCompleteness => &mut self.data_completeness,
            Feature::HasImage => &mut self.has_image,
            Feature::HasStock => &mut self.has_stock,
            Feature::ClickRate => &mut self.click_rate,
            Feature::PurchaseRate => &mut self.purchase_rate,
            Feature::Freshness => &mut self.freshness,
        };
        *slot = value.clamp(0.0, 1.0);
    }

    pub fn sum(&self) -> f64 {
        Feature::ALL.iter().map(|f| self.get(*f)).sum()
    }

    /// Rescale so the weights sum to 1. A degenerate all-zero vector is left
    /// untouched.
    pub fn normalize(&mut self) {
        let sum = self.sum();
        if sum > f64::EPSILON {
            for feature in Feature::ALL {
                let value = self.get(feature) / sum;
                self.set(feature, value);
            }
        }
    }

    /// Weighted linear combination with a feature vector
    pub fn score(&self, features: &FeatureVector) -> f64 {
        Feature::ALL
            .iter()
            .map(|f| self.get(*f) * features.get(*f))
            .sum()
    }
}

impl Default for RankWeights {
    /// The control profile
    fn default() -> Self {
        Self {
            es_score: 0.25,
            part_number_match: 0.15,
            category_match: 0.12,
            brand_match: 0.10,
            vehicle_fitment: 0.12,
            data_completeness: 0.08,
            has_image: 0.03,
            has_stock: 0.05,
            click_rate: 0.05,
            purchase_rate: 0.03,
            freshness: 0.02,
        }
    }
}

/// One retrieved record flowing through the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Unique part id in the text index
    pub id: String,
    /// Engine-assigned relevance score
    pub score: f64,
    /// The part record, passed through verbatim
    pub source: PartRecord,
    /// Filled by the ranking stage
    pub features: FeatureVector,
    /// Filled by the filtering stage
    pub soft_score: f64,
    /// Audit trail for the soft score
    pub soft_factors: Vec<String>,
    /// Filled by the filtering stage
    pub quality_score: f64,
    /// 1-based rank after ranking; 0 while unranked
    pub rank: usize,
    /// Final learning-to-rank score
    pub rank_score: f64,
}

impl Candidate {
    pub fn new(id: impl Into<String>, score: f64, source: PartRecord) -> Self {
        Self {
            id: id.into(),
            score,
            source,
            features: FeatureVector::default(),
            soft_score: 0.0,
            soft_factors: Vec::new(),
            quality_score: 0.0,
            rank: 0,
            rank_score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fitment_year_containment() {
        let fitment = VehicleFitment {
            make: Some("Toyota".into()),
            model: Some("Camry".into()),
            year_from: Some(2018),
            year_to: Some(2023),
        };
        assert!(fitment.covers_year(2019));
        assert!(fitment.covers_year(2018));
        assert!(!fitment.covers_year(2017));

        let open_ended = VehicleFitment {
            year_from: Some(2015),
            ..VehicleFitment::default()
        };
        assert!(open_ended.covers_year(2030));
    }

    #[test]
    fn test_part_record_preserves_unknown_fields() {
        let json = serde_json::json!({
            "partNumber": "0 986 494 104",
            "brand": "Bosch",
            "warehouseShelf": "A-31"
        });
        let record: PartRecord = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(record.brand.as_deref(), Some("Bosch"));
        assert_eq!(record.extra["warehouseShelf"], "A-31");

        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["warehouseShelf"], "A-31");
    }

    #[test]
    fn test_stock_quantity_prefers_explicit_count() {
        let record = PartRecord {
            stock: Some(12),
            in_stock: Some(false),
            ..PartRecord::default()
        };
        assert_eq!(record.stock_quantity(), 12);

        let flag_only = PartRecord {
            in_stock: Some(true),
            ..PartRecord::default()
        };
        assert!(flag_only.has_stock());
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = RankWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_restores_unit_sum() {
        let mut weights = RankWeights::default();
        weights.set(Feature::EsScore, 0.9);
        weights.normalize();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_feature_vector_set_clamps() {
        let mut features = FeatureVector::default();
        features.set(Feature::EsScore, 1.7);
        assert_eq!(features.es_score, 1.0);
        features.set(Feature::Freshness, -0.2);
        assert_eq!(features.freshness, 0.0);
    }
}
