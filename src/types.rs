use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Listing (read-only view of the marketplace entity)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Structured attributes. Which ones are set depends on the category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListingAttributes {
    // electronics
    pub brand: Option<String>,
    pub model: Option<String>,
    pub storage: Option<String>,
    // vehicles (model is shared with electronics)
    pub make: Option<String>,
    pub year: Option<i32>,
    // real estate
    pub realty_type: Option<String>,
    pub district: Option<String>,
    pub area: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub attributes: ListingAttributes,
    pub created_at: DateTime<Utc>,
    pub location: Option<GeoPoint>,
    #[serde(default)]
    pub photo_count: u32,
    #[serde(default)]
    pub has_contact_info: bool,
    pub status: String,
    pub moderation_status: String,
}

/// User-entered fields of an ad that has not been saved yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdDraft {
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub city: Option<String>,
    pub price: Option<f64>,
    #[serde(default)]
    pub attributes: ListingAttributes,
}

// ---------------------------------------------------------------------------
// Comparison strategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonType {
    Electronics,
    Vehicles,
    RealEstate,
    General,
}

impl ComparisonType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "electronics" => Some(ComparisonType::Electronics),
            "vehicles" => Some(ComparisonType::Vehicles),
            "realestate" => Some(ComparisonType::RealEstate),
            "general" => Some(ComparisonType::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for ComparisonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComparisonType::Electronics => "electronics",
            ComparisonType::Vehicles => "vehicles",
            ComparisonType::RealEstate => "realestate",
            ComparisonType::General => "general",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Market level / price position
// ---------------------------------------------------------------------------

/// Facade verdict on a listing price relative to the market average.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketLevel {
    Below,
    Fair,
    Above,
}

impl MarketLevel {
    /// diff% ≤ −5 is below, ≥ +10 is above.
    pub fn from_diff_percent(diff: f64) -> Self {
        use crate::config::market_thresholds::*;
        if diff <= BELOW_MAX {
            MarketLevel::Below
        } else if diff >= ABOVE_MIN {
            MarketLevel::Above
        } else {
            MarketLevel::Fair
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "below" => Some(MarketLevel::Below),
            "fair" => Some(MarketLevel::Fair),
            "above" => Some(MarketLevel::Above),
            _ => None,
        }
    }
}

impl std::fmt::Display for MarketLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MarketLevel::Below => "below",
            MarketLevel::Fair => "fair",
            MarketLevel::Above => "above",
        };
        write!(f, "{s}")
    }
}

/// Calculator verdict on the current price. Uses wider bands than MarketLevel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricePosition {
    Low,
    Optimal,
    High,
}

impl PricePosition {
    /// diff% ≤ −10 is low, ≥ +15 is high.
    pub fn from_diff_percent(diff: f64) -> Self {
        use crate::config::position_thresholds::*;
        if diff <= LOW_MAX {
            PricePosition::Low
        } else if diff >= HIGH_MIN {
            PricePosition::High
        } else {
            PricePosition::Optimal
        }
    }
}

/// `(price - avg) / avg * 100`. None when the average is not positive.
pub fn diff_percent(price: f64, avg: f64) -> Option<f64> {
    if avg <= 0.0 {
        return None;
    }
    Some((price - avg) / avg * 100.0)
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Market statistics
// ---------------------------------------------------------------------------

/// Normalized market view for one subject. Prices are absolute (real estate
/// per-area figures are already multiplied by the subject's area).
#[derive(Debug, Clone, PartialEq)]
pub struct MarketStats {
    pub count: u32,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
    pub median_price: f64,
    /// Real estate only; rounded to 2 decimals, never to an integer.
    pub avg_price_per_area: Option<f64>,
    pub window_days: u32,
    pub comparison_type: ComparisonType,
    /// Which ladder rung produced the sample, e.g. "brand+model".
    pub criteria: &'static str,
    /// Present when the subject has a positive price.
    pub diff_percent: Option<f64>,
    pub market_level: Option<MarketLevel>,
}

/// Serializable market summary served to feeds and seller screens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketBrief {
    pub has_market_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub median_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_price_per_area: Option<f64>,
    pub count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_level: Option<MarketLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_type: Option<ComparisonType>,
}

impl MarketBrief {
    pub fn no_data() -> Self {
        Self {
            has_market_data: false,
            avg_price: None,
            min_price: None,
            max_price: None,
            median_price: None,
            avg_price_per_area: None,
            count: 0,
            diff_percent: None,
            market_level: None,
            window_days: None,
            comparison_type: None,
        }
    }
}

impl From<Option<&MarketStats>> for MarketBrief {
    fn from(stats: Option<&MarketStats>) -> Self {
        let Some(s) = stats else {
            return MarketBrief::no_data();
        };
        Self {
            has_market_data: true,
            avg_price: Some(s.avg_price),
            min_price: Some(s.min_price),
            max_price: Some(s.max_price),
            median_price: Some(s.median_price),
            avg_price_per_area: s.avg_price_per_area,
            count: s.count,
            diff_percent: s.diff_percent,
            market_level: s.market_level,
            window_days: Some(s.window_days),
            comparison_type: Some(s.comparison_type),
        }
    }
}

/// Short recommendation shown to a seller next to the price field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerLabel {
    pub level: MarketLevel,
    pub message: String,
    pub suggested_min: f64,
    pub suggested_max: f64,
}

/// Response of the pre-listing estimate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdEstimate {
    #[serde(flatten)]
    pub brief: MarketBrief,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<SellerLabel>,
}

// ---------------------------------------------------------------------------
// Price recommendation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceFactors {
    pub seasonal: f64,
    pub time_of_day: f64,
    pub demand: f64,
    pub quality: f64,
    pub competition: f64,
    /// Competing listings within the competition radius (None without a location).
    pub competitor_count: Option<u64>,
}

impl PriceFactors {
    pub fn product(&self) -> f64 {
        self.seasonal * self.time_of_day * self.demand * self.quality * self.competition
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpulseAction {
    Raise,
    Lower,
    Timing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseSuggestion {
    pub action: ImpulseAction,
    pub urgency: Urgency,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRecommendation {
    pub has_market_data: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommended_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_average: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<PricePosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factors: Option<PriceFactors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison_type: Option<ComparisonType>,
    pub reasons: Vec<String>,
    #[serde(default)]
    pub impulses: Vec<ImpulseSuggestion>,
}

impl PriceRecommendation {
    pub fn no_data() -> Self {
        Self {
            has_market_data: false,
            current_price: None,
            recommended_price: None,
            market_average: None,
            position: None,
            confidence: None,
            factors: None,
            sample_size: None,
            window_days: None,
            comparison_type: None,
            reasons: vec!["insufficient data".to_string()],
            impulses: Vec::new(),
        }
    }
}

/// Outcome of a calculation as handed to transport layers.
/// `success: false` carries the error message and no partial data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceResponse {
    pub success: bool,
    #[serde(flatten)]
    pub recommendation: Option<PriceRecommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PriceResponse {
    pub fn ok(recommendation: PriceRecommendation) -> Self {
        Self { success: true, recommendation: Some(recommendation), error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, recommendation: None, error: Some(error.into()) }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
