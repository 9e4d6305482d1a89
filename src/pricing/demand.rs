//! Geo-demand estimator seam. The external service reports demand hotspots
//! around a point; a hotspot whose top categories include the listing's
//! category lifts the price. Every failure path yields the neutral 1.0.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{DEMAND_LOOKBACK_HOURS, DEMAND_RADIUS_KM};
use crate::error::{AppError, Result};
use crate::types::Listing;

pub const DEMAND_RANGE: (f64, f64) = (0.9, 1.3);

/// Hotspot demand scores are reported on a 0-100 scale.
const MAX_DEMAND_SCORE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: f64,
    pub hours: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HotspotResponse {
    pub success: bool,
    pub data: Option<HotspotData>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HotspotData {
    pub hotspots: Vec<Hotspot>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Hotspot {
    pub top_categories: Vec<String>,
    pub demand_score: f64,
}

#[async_trait]
pub trait DemandEstimator: Send + Sync {
    async fn demand_hotspots(&self, query: &HotspotQuery) -> Result<HotspotResponse>;
}

/// Talks to the demand service over HTTP:
/// `GET {base_url}/demand/hotspots?lat&lng&radiusKm&hours`.
pub struct HttpDemandEstimator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDemandEstimator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl DemandEstimator for HttpDemandEstimator {
    async fn demand_hotspots(&self, query: &HotspotQuery) -> Result<HotspotResponse> {
        let url = format!("{}/demand/hotspots", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await?
            .error_for_status()?;
        let body: HotspotResponse = resp.json().await?;
        Ok(body)
    }
}

/// Used when no demand service is configured. Reports no hotspots.
pub struct NeutralDemandEstimator;

#[async_trait]
impl DemandEstimator for NeutralDemandEstimator {
    async fn demand_hotspots(&self, _query: &HotspotQuery) -> Result<HotspotResponse> {
        Ok(HotspotResponse { success: true, data: Some(HotspotData::default()) })
    }
}

/// Maps a 0-100 demand score linearly onto DEMAND_RANGE.
pub fn normalize_demand_score(score: f64) -> f64 {
    let (lo, hi) = DEMAND_RANGE;
    let unit = if score.is_finite() { (score / MAX_DEMAND_SCORE).clamp(0.0, 1.0) } else { 0.0 };
    lo + (hi - lo) * unit
}

/// Strongest hotspot listing the category (or subcategory) among its top
/// categories. 1.0 when the response is unsuccessful or nothing matches.
pub fn factor_from_hotspots(
    resp: &HotspotResponse,
    category_id: &str,
    subcategory_id: Option<&str>,
) -> f64 {
    if !resp.success {
        return 1.0;
    }
    let Some(data) = &resp.data else {
        return 1.0;
    };
    let wanted = |c: &str| {
        let c = c.trim();
        c.eq_ignore_ascii_case(category_id.trim())
            || subcategory_id.is_some_and(|s| c.eq_ignore_ascii_case(s.trim()))
    };

    data.hotspots
        .iter()
        .filter(|h| h.top_categories.iter().any(|c| wanted(c)))
        .map(|h| h.demand_score)
        .max_by(|a, b| a.total_cmp(b))
        .map_or(1.0, normalize_demand_score)
}

/// Demand multiplier for a listing. Never fails: a missing location, an
/// estimator error or a call slower than `timeout` all give 1.0.
pub async fn demand_factor(
    estimator: &dyn DemandEstimator,
    listing: &Listing,
    timeout: Duration,
) -> f64 {
    let Some(location) = listing.location else {
        return 1.0;
    };
    let query = HotspotQuery {
        lat: location.lat,
        lng: location.lng,
        radius_km: DEMAND_RADIUS_KM,
        hours: DEMAND_LOOKBACK_HOURS,
    };

    let outcome = match tokio::time::timeout(timeout, estimator.demand_hotspots(&query)).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Demand(format!("no answer within {}ms", timeout.as_millis()))),
    };

    match outcome {
        Ok(resp) => {
            let factor =
                factor_from_hotspots(&resp, &listing.category_id, listing.subcategory_id.as_deref());
            debug!(listing_id = %listing.id, demand = factor, "demand factor resolved");
            factor
        }
        Err(e) => {
            warn!(listing_id = %listing.id, error = %e, "demand estimator unavailable, using neutral factor");
            1.0
        }
    }
}
