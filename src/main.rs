mod config;
mod db;
mod error;
mod market;
mod pricing;
mod snapshot;
mod state;
mod types;
mod api;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::api::routes::{ApiState, router};
use crate::config::{Config, MIN_SAMPLE_SIZE, RESULT_CACHE_TTL_SECS, SNAPSHOT_TTL_HOURS, WINDOW_DAYS};
use crate::db::{ListingStore, SnapshotStore, SqliteListingStore};
use crate::error::Result;
use crate::market::{MarketStatsService, WindowedAggregator};
use crate::pricing::{
    CalculatorSettings, DemandEstimator, HttpDemandEstimator, NeutralDemandEstimator,
    PriceCalculator,
};
use crate::snapshot::{BriefService, SnapshotRefresher};
use crate::state::ResultCache;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", cfg.db_path))?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database ready at {}", cfg.db_path);

    // --- Engine ---
    let listings: Arc<dyn ListingStore> = Arc::new(SqliteListingStore::new(pool.clone()));
    let market = Arc::new(MarketStatsService::new(WindowedAggregator::new(
        Arc::clone(&listings),
        WINDOW_DAYS,
        MIN_SAMPLE_SIZE,
    )));

    let demand: Arc<dyn DemandEstimator> = match &cfg.demand_api_url {
        Some(url) => {
            info!("Geo-demand estimator at {url} (timeout {}ms)", cfg.demand_timeout_ms);
            Arc::new(HttpDemandEstimator::new(
                url.clone(),
                Duration::from_millis(cfg.demand_timeout_ms),
            )?)
        }
        None => {
            warn!("DEMAND_API_URL not set: demand factor will always be neutral (1.0)");
            Arc::new(NeutralDemandEstimator)
        }
    };

    let cache = Arc::new(ResultCache::new(
        Duration::from_secs(RESULT_CACHE_TTL_SECS),
        cfg.result_cache_capacity,
    ));
    let latency = Arc::new(LatencyStats::new());
    let calculator = Arc::new(PriceCalculator::new(
        Arc::clone(&market),
        Arc::clone(&listings),
        demand,
        cache,
        Arc::clone(&latency),
        CalculatorSettings::from_config(&cfg)?,
    ));

    let briefs = Arc::new(BriefService::new(
        Arc::clone(&listings),
        SnapshotStore::new(pool.clone()),
        Arc::clone(&market),
        chrono::Duration::hours(SNAPSHOT_TTL_HOURS),
    ));
    let health = Arc::new(HealthState::new());

    // --- Spawn tasks ---

    // Snapshot refresher (background, every SNAPSHOT_REFRESH_INTERVAL_SECS)
    let refresher = SnapshotRefresher::new(
        Arc::clone(&briefs),
        Arc::clone(&health),
        Duration::from_secs(cfg.snapshot_refresh_interval_secs.max(1)),
        cfg.snapshot_refresh_max_age_hours,
        cfg.snapshot_refresh_batch,
    );
    tokio::spawn(async move { refresher.run().await });
    info!(
        "Snapshot refresher: every {}s, max_age={}h, batch={}",
        cfg.snapshot_refresh_interval_secs,
        cfg.snapshot_refresh_max_age_hours,
        cfg.snapshot_refresh_batch,
    );

    // HTTP API server
    let api_state = ApiState {
        pool: pool.clone(),
        listings,
        market,
        calculator,
        briefs,
        latency,
        health,
        refresh_max_age_hours: cfg.snapshot_refresh_max_age_hours,
        refresh_batch_size: cfg.snapshot_refresh_batch,
    };
    let app = router(api_state);
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
