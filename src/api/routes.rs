use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::{LatencyStats, LatencySummary};
use crate::db::ListingStore;
use crate::error::AppError;
use crate::market::{seller_label, MarketStatsService};
use crate::pricing::PriceCalculator;
use crate::snapshot::{BriefService, RefreshReport};
use crate::types::{Listing, MarketBrief, NewAdDraft, NewAdEstimate, PriceResponse};

#[derive(Clone)]
pub struct ApiState {
    pub pool: sqlx::SqlitePool,
    pub listings: Arc<dyn ListingStore>,
    pub market: Arc<MarketStatsService>,
    pub calculator: Arc<PriceCalculator>,
    pub briefs: Arc<BriefService>,
    pub latency: Arc<LatencyStats>,
    pub health: Arc<HealthState>,
    /// Used when `/snapshots/refresh` is called without parameters.
    pub refresh_max_age_hours: i64,
    pub refresh_batch_size: usize,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/listings/:id/market-stats", get(get_market_stats))
        .route("/listings/:id/price", get(get_price).delete(delete_cached_price))
        .route("/price-cache", delete(delete_price_cache))
        .route("/listings/:id/brief", get(get_brief))
        .route("/briefs", get(get_briefs))
        .route("/stats/new-ad", post(post_new_ad_stats))
        .route("/snapshots/refresh", post(post_refresh_snapshots))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct BriefsQuery {
    /// Comma-separated listing ids.
    pub ids: Option<String>,
}

#[derive(Deserialize)]
pub struct RefreshQuery {
    pub max_age_hours: Option<i64>,
    pub batch_size: Option<usize>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub db_ok: bool,
    pub result_cache_entries: usize,
    pub last_snapshot_refresh_ms: Option<i64>,
    pub snapshots_refreshed: u64,
    pub consecutive_refresh_failures: u64,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    pub price_calculation: LatencySummary,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let db_ok = sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_ok();

    Json(HealthResponse {
        db_ok,
        result_cache_entries: state.calculator.cache().len(),
        last_snapshot_refresh_ms: state.health.last_refresh_at_ms(),
        snapshots_refreshed: state.health.snapshots_refreshed(),
        consecutive_refresh_failures: state.health.consecutive_refresh_failures(),
    })
}

async fn load_listing(state: &ApiState, id: &str) -> Result<Listing, AppError> {
    state
        .listings
        .get_listing(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("listing {id}")))
}

async fn get_market_stats(
    State(state): State<ApiState>,
    Path(listing_id): Path<String>,
) -> Result<Json<MarketBrief>, AppError> {
    let listing = load_listing(&state, &listing_id).await?;
    let stats = state.market.market_stats(&listing).await?;
    Ok(Json(MarketBrief::from(stats.as_ref())))
}

async fn get_price(
    State(state): State<ApiState>,
    Path(listing_id): Path<String>,
) -> Result<Json<PriceResponse>, AppError> {
    let listing = match state.listings.get_listing(&listing_id).await {
        Ok(Some(listing)) => listing,
        Ok(None) => return Err(AppError::NotFound(format!("listing {listing_id}"))),
        // store failures surface as an unsuccessful calculation, not a 5xx
        Err(e) => return Ok(Json(PriceResponse::failed(e.to_string()))),
    };
    Ok(Json(state.calculator.calculate_price(&listing).await?))
}

/// Drops one memoized price so the next request recomputes it.
async fn delete_cached_price(
    State(state): State<ApiState>,
    Path(listing_id): Path<String>,
) -> StatusCode {
    state.calculator.cache().invalidate(&listing_id);
    StatusCode::NO_CONTENT
}

async fn delete_price_cache(State(state): State<ApiState>) -> StatusCode {
    state.calculator.cache().clear();
    StatusCode::NO_CONTENT
}

async fn get_brief(
    State(state): State<ApiState>,
    Path(listing_id): Path<String>,
) -> Result<Json<MarketBrief>, AppError> {
    state
        .briefs
        .get_brief(&listing_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("listing {listing_id}")))
}

async fn get_briefs(
    State(state): State<ApiState>,
    Query(params): Query<BriefsQuery>,
) -> Result<Json<HashMap<String, MarketBrief>>, AppError> {
    let ids: Vec<String> = params
        .ids
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    Ok(Json(state.briefs.get_briefs(&ids).await?))
}

async fn post_new_ad_stats(
    State(state): State<ApiState>,
    Json(draft): Json<NewAdDraft>,
) -> Result<Json<NewAdEstimate>, AppError> {
    if draft.category_id.trim().is_empty() {
        return Err(AppError::InvalidListing("categoryId is required".to_string()));
    }
    let stats = state.market.stats_for_new_ad(&draft).await?;
    Ok(Json(NewAdEstimate {
        brief: MarketBrief::from(stats.as_ref()),
        label: stats.as_ref().and_then(seller_label),
    }))
}

async fn post_refresh_snapshots(
    State(state): State<ApiState>,
    Query(params): Query<RefreshQuery>,
) -> Result<Json<RefreshReport>, AppError> {
    let max_age_hours = params.max_age_hours.unwrap_or(state.refresh_max_age_hours);
    let batch_size = params.batch_size.unwrap_or(state.refresh_batch_size);
    Ok(Json(state.briefs.refresh_stale(max_age_hours, batch_size).await?))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(LatencyResponse {
        price_calculation: state.latency.summary(),
    })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::{MIN_SAMPLE_SIZE, RESULT_CACHE_TTL_SECS, SNAPSHOT_TTL_HOURS, WINDOW_DAYS};
    use crate::db::test_support::{insert_comparables, insert_listing, listing, memory_pool};
    use crate::db::{SnapshotStore, SqliteListingStore};
    use crate::market::WindowedAggregator;
    use crate::pricing::{CalculatorSettings, NeutralDemandEstimator};
    use crate::state::ResultCache;
    use crate::types::{MarketLevel, PricePosition};

    async fn state() -> ApiState {
        let pool = memory_pool().await;
        let listings: Arc<dyn ListingStore> = Arc::new(SqliteListingStore::new(pool.clone()));
        let market = Arc::new(MarketStatsService::new(WindowedAggregator::new(
            Arc::clone(&listings),
            WINDOW_DAYS,
            MIN_SAMPLE_SIZE,
        )));
        let latency = Arc::new(LatencyStats::new());
        let calculator = Arc::new(PriceCalculator::new(
            Arc::clone(&market),
            Arc::clone(&listings),
            Arc::new(NeutralDemandEstimator),
            Arc::new(ResultCache::new(Duration::from_secs(RESULT_CACHE_TTL_SECS), 100)),
            Arc::clone(&latency),
            CalculatorSettings::default(),
        ));
        let briefs = Arc::new(BriefService::new(
            Arc::clone(&listings),
            SnapshotStore::new(pool.clone()),
            Arc::clone(&market),
            chrono::Duration::hours(SNAPSHOT_TTL_HOURS),
        ));
        ApiState {
            pool,
            listings,
            market,
            calculator,
            briefs,
            latency,
            health: Arc::new(HealthState::new()),
            refresh_max_age_hours: SNAPSHOT_TTL_HOURS,
            refresh_batch_size: 50,
        }
    }

    #[tokio::test]
    async fn unknown_listing_is_not_found() {
        let state = state().await;
        let err = get_market_stats(State(state.clone()), Path("ghost".into())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = get_price(State(state.clone()), Path("ghost".into())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = get_brief(State(state), Path("ghost".into())).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn price_endpoint_records_latency() {
        let state = state().await;
        insert_comparables(&state.pool, "c", "misc", 1, &[1000.0; 5]).await;
        insert_listing(&state.pool, &listing("me", "misc", 1500.0)).await;

        let Json(resp) = get_price(State(state.clone()), Path("me".into())).await.unwrap();
        assert!(resp.success);
        assert_eq!(resp.recommendation.unwrap().position, Some(PricePosition::High));

        let Json(latency) = get_stats_latency(State(state)).await;
        assert_eq!(latency.price_calculation.samples, 1);
    }

    #[tokio::test]
    async fn cached_price_can_be_invalidated() {
        let state = state().await;
        insert_comparables(&state.pool, "c", "misc", 1, &[1000.0; 5]).await;
        insert_listing(&state.pool, &listing("me", "misc", 1500.0)).await;
        insert_listing(&state.pool, &listing("you", "misc", 900.0)).await;

        for id in ["me", "you"] {
            get_price(State(state.clone()), Path(id.into())).await.unwrap();
        }
        assert_eq!(state.calculator.cache().len(), 2);

        let status = delete_cached_price(State(state.clone()), Path("me".into())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(state.calculator.cache().get("me").is_none());
        assert!(state.calculator.cache().get("you").is_some());

        // recomputed on the next request
        get_price(State(state.clone()), Path("me".into())).await.unwrap();
        let Json(latency) = get_stats_latency(State(state.clone())).await;
        assert_eq!(latency.price_calculation.samples, 3);

        assert_eq!(delete_price_cache(State(state.clone())).await, StatusCode::NO_CONTENT);
        assert_eq!(state.calculator.cache().len(), 0);
    }

    #[tokio::test]
    async fn briefs_query_splits_ids() {
        let state = state().await;
        insert_listing(&state.pool, &listing("a", "misc", 10.0)).await;
        insert_listing(&state.pool, &listing("b", "misc", 10.0)).await;

        let query = BriefsQuery { ids: Some(" a, ,b,missing".into()) };
        let Json(briefs) = get_briefs(State(state), Query(query)).await.unwrap();
        let mut ids: Vec<_> = briefs.keys().cloned().collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn new_ad_estimate_carries_label() {
        let state = state().await;
        insert_comparables(&state.pool, "c", "misc", 1, &[200.0; 5]).await;

        let draft = NewAdDraft { category_id: "misc".into(), price: Some(250.0), ..NewAdDraft::default() };
        let Json(estimate) = post_new_ad_stats(State(state), Json(draft)).await.unwrap();
        assert!(estimate.brief.has_market_data);
        assert_eq!(estimate.label.map(|l| l.level), Some(MarketLevel::Above));
    }

    #[tokio::test]
    async fn new_ad_without_category_is_rejected() {
        let state = state().await;
        let err = post_new_ad_stats(State(state), Json(NewAdDraft::default())).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidListing(_)));
    }

    #[tokio::test]
    async fn health_reports_db_and_cache() {
        let state = state().await;
        let Json(health) = get_health(State(state)).await;
        assert!(health.db_ok);
        assert_eq!(health.result_cache_entries, 0);
        assert!(health.last_snapshot_refresh_ms.is_none());
    }
}
