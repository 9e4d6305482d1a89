use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Datelike, FixedOffset, Offset, Timelike, Utc};
use tracing::{debug, info, warn};

use crate::api::latency::LatencyStats;
use crate::config::{Config, COMPETITION_RADIUS_KM};
use crate::db::ListingStore;
use crate::error::{AppError, Result};
use crate::market::MarketStatsService;
use crate::pricing::advice::{confidence, impulses, reasons};
use crate::pricing::demand::{demand_factor, DemandEstimator};
use crate::pricing::factors::{
    competition_factor, quality_factor, seasonal_factor, time_of_day_factor,
};
use crate::state::ResultCache;
use crate::types::{diff_percent, Listing, PriceFactors, PricePosition, PriceRecommendation, PriceResponse};

#[derive(Debug, Clone, Copy)]
pub struct CalculatorSettings {
    /// Upper bound on the geo-demand call; slower answers count as neutral.
    pub demand_timeout: Duration,
    /// Offset used to read the local month and hour.
    pub utc_offset: FixedOffset,
    pub competition_radius_km: f64,
}

impl CalculatorSettings {
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let utc_offset = FixedOffset::east_opt(cfg.local_utc_offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!(
                "LOCAL_UTC_OFFSET_HOURS={} is not a valid offset",
                cfg.local_utc_offset_hours
            ))
        })?;
        Ok(Self {
            demand_timeout: Duration::from_millis(cfg.demand_timeout_ms),
            utc_offset,
            competition_radius_km: COMPETITION_RADIUS_KM,
        })
    }
}

impl Default for CalculatorSettings {
    fn default() -> Self {
        Self {
            demand_timeout: Duration::from_millis(1500),
            utc_offset: Utc.fix(),
            competition_radius_km: COMPETITION_RADIUS_KM,
        }
    }
}

/// Recommended price = market average scaled by five situational factors.
///
/// Results (including the no-data outcome) are memoized per listing id in the
/// injected `ResultCache`. Failures are never cached.
pub struct PriceCalculator {
    market: Arc<MarketStatsService>,
    listings: Arc<dyn ListingStore>,
    demand: Arc<dyn DemandEstimator>,
    cache: Arc<ResultCache>,
    latency: Arc<LatencyStats>,
    settings: CalculatorSettings,
}

impl PriceCalculator {
    pub fn new(
        market: Arc<MarketStatsService>,
        listings: Arc<dyn ListingStore>,
        demand: Arc<dyn DemandEstimator>,
        cache: Arc<ResultCache>,
        latency: Arc<LatencyStats>,
        settings: CalculatorSettings,
    ) -> Self {
        Self { market, listings, demand, cache, latency, settings }
    }

    /// `Err` only for an unusable listing (empty id). Store failures come back
    /// as `PriceResponse { success: false, .. }`.
    pub async fn calculate_price(&self, listing: &Listing) -> Result<PriceResponse> {
        if listing.id.trim().is_empty() {
            return Err(AppError::InvalidListing("listing id is empty".to_string()));
        }

        if let Some(cached) = self.cache.get(&listing.id) {
            debug!(listing_id = %listing.id, "price served from result cache");
            return Ok(PriceResponse::ok(cached));
        }

        let started = Instant::now();
        match self.compute(listing, Utc::now()).await {
            Ok(recommendation) => {
                let elapsed = started.elapsed();
                self.latency.record(elapsed);
                info!(
                    listing_id = %listing.id,
                    has_market_data = recommendation.has_market_data,
                    recommended = recommendation.recommended_price,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "price calculated"
                );
                self.cache.insert(listing.id.clone(), recommendation.clone());
                Ok(PriceResponse::ok(recommendation))
            }
            Err(e) => {
                warn!(listing_id = %listing.id, error = %e, "price calculation failed");
                Ok(PriceResponse::failed(e.to_string()))
            }
        }
    }

    /// Uncached calculation at a fixed instant.
    pub async fn compute(&self, listing: &Listing, now: DateTime<Utc>) -> Result<PriceRecommendation> {
        let Some(stats) = self.market.market_stats(listing).await? else {
            return Ok(PriceRecommendation::no_data());
        };

        let (demand, competitors) = tokio::join!(
            demand_factor(self.demand.as_ref(), listing, self.settings.demand_timeout),
            self.competitor_count(listing),
        );
        let competitors = competitors?;

        let local = now.with_timezone(&self.settings.utc_offset);
        let subcategory = listing.subcategory_id.as_deref();
        let factors = PriceFactors {
            seasonal: seasonal_factor(&listing.category_id, subcategory, local.month()),
            time_of_day: time_of_day_factor(&listing.category_id, subcategory, local.hour()),
            demand,
            quality: quality_factor(listing),
            competition: competitors.map_or(1.0, competition_factor),
            competitor_count: competitors,
        };

        let market_average = stats.avg_price;
        let position = diff_percent(listing.price, market_average)
            .map_or(PricePosition::Optimal, PricePosition::from_diff_percent);

        Ok(PriceRecommendation {
            has_market_data: true,
            current_price: Some(listing.price),
            recommended_price: Some((market_average * factors.product()).round()),
            market_average: Some(market_average),
            position: Some(position),
            confidence: Some(confidence(stats.count, factors.demand)),
            sample_size: Some(stats.count),
            window_days: Some(stats.window_days),
            comparison_type: Some(stats.comparison_type),
            reasons: reasons(listing, market_average, &factors),
            impulses: impulses(position, &factors),
            factors: Some(factors),
        })
    }

    /// None when the listing has no location.
    async fn competitor_count(&self, listing: &Listing) -> Result<Option<u64>> {
        let Some(center) = listing.location else {
            return Ok(None);
        };
        let n = self
            .listings
            .count_competitors(center, &listing.category_id, &listing.id, self.settings.competition_radius_km)
            .await?;
        Ok(Some(n))
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }
}
