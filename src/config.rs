use crate::error::{AppError, Result};

/// Ascending comparable search windows (days). The first window whose sample
/// reaches MIN_SAMPLE_SIZE wins; otherwise the widest one is reported.
pub const WINDOW_DAYS: &[u32] = &[7, 30, 90];

/// Minimum comparable count before a window (or ladder rung) is trusted.
pub const MIN_SAMPLE_SIZE: usize = 5;

/// A persisted snapshot older than this is recomputed before being served.
pub const SNAPSHOT_TTL_HOURS: i64 = 6;

/// In-process result cache TTL (seconds).
pub const RESULT_CACHE_TTL_SECS: u64 = 15 * 60;

/// Default maximum resident entries in the in-process result cache.
pub const RESULT_CACHE_CAPACITY: usize = 1000;

/// Radius for counting competing listings around the subject.
pub const COMPETITION_RADIUS_KM: f64 = 3.0;

/// Geo-demand hotspot query parameters.
pub const DEMAND_RADIUS_KM: f64 = 2.0;
pub const DEMAND_LOOKBACK_HOURS: u32 = 24;

/// Vehicles are compared against model years within this distance.
pub const VEHICLE_YEAR_TOLERANCE: i32 = 1;

/// Facade market level: diff% of listing price vs market average.
pub mod market_thresholds {
    /// diff% at or below this is "below".
    pub const BELOW_MAX: f64 = -5.0;
    /// diff% at or above this is "above".
    pub const ABOVE_MIN: f64 = 10.0;
}

/// Calculator price position: diff% of current price vs market average.
pub mod position_thresholds {
    pub const LOW_MAX: f64 = -10.0;
    pub const HIGH_MIN: f64 = 15.0;
}

/// Seller label suggested band around the market average.
pub const SUGGESTED_BAND: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Base URL of the geo-demand service (DEMAND_API_URL). None = neutral demand.
    pub demand_api_url: Option<String>,
    /// Upper bound on a single geo-demand call (DEMAND_TIMEOUT_MS)
    pub demand_timeout_ms: u64,
    /// Max resident calculation results (RESULT_CACHE_CAPACITY)
    pub result_cache_capacity: usize,
    /// How often the background refresher runs (SNAPSHOT_REFRESH_INTERVAL_SECS)
    pub snapshot_refresh_interval_secs: u64,
    /// Snapshots older than this are picked up by the refresher (SNAPSHOT_REFRESH_MAX_AGE_HOURS)
    pub snapshot_refresh_max_age_hours: i64,
    /// Max snapshots recomputed per refresher run (SNAPSHOT_REFRESH_BATCH)
    pub snapshot_refresh_batch: usize,
    /// Offset used to derive the local month and hour (LOCAL_UTC_OFFSET_HOURS)
    pub local_utc_offset_hours: i32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let local_utc_offset_hours = std::env::var("LOCAL_UTC_OFFSET_HOURS")
            .unwrap_or_else(|_| "0".to_string())
            .parse::<i32>()
            .map_err(|_| {
                AppError::Config("LOCAL_UTC_OFFSET_HOURS must be an integer".to_string())
            })?;
        if !(-12..=14).contains(&local_utc_offset_hours) {
            return Err(AppError::Config(
                "LOCAL_UTC_OFFSET_HOURS must be within -12..=14".to_string(),
            ));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "pricing.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            demand_api_url: std::env::var("DEMAND_API_URL")
                .ok()
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
            demand_timeout_ms: std::env::var("DEMAND_TIMEOUT_MS")
                .unwrap_or_else(|_| "1500".to_string())
                .parse::<u64>()
                .unwrap_or(1500),
            result_cache_capacity: std::env::var("RESULT_CACHE_CAPACITY")
                .unwrap_or_else(|_| RESULT_CACHE_CAPACITY.to_string())
                .parse::<usize>()
                .unwrap_or(RESULT_CACHE_CAPACITY),
            snapshot_refresh_interval_secs: std::env::var("SNAPSHOT_REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| "900".to_string())
                .parse::<u64>()
                .unwrap_or(900),
            snapshot_refresh_max_age_hours: std::env::var("SNAPSHOT_REFRESH_MAX_AGE_HOURS")
                .unwrap_or_else(|_| SNAPSHOT_TTL_HOURS.to_string())
                .parse::<i64>()
                .unwrap_or(SNAPSHOT_TTL_HOURS),
            snapshot_refresh_batch: std::env::var("SNAPSHOT_REFRESH_BATCH")
                .unwrap_or_else(|_| "50".to_string())
                .parse::<usize>()
                .unwrap_or(50),
            local_utc_offset_hours,
        })
    }
}
