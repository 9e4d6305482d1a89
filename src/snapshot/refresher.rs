use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::error;

use crate::api::health::HealthState;
use crate::snapshot::BriefService;

/// Background task that keeps price snapshots from going stale. Each tick
/// recomputes one bounded batch of the oldest snapshots.
pub struct SnapshotRefresher {
    briefs: Arc<BriefService>,
    health: Arc<HealthState>,
    interval: Duration,
    max_age_hours: i64,
    batch_size: usize,
}

impl SnapshotRefresher {
    pub fn new(
        briefs: Arc<BriefService>,
        health: Arc<HealthState>,
        interval: Duration,
        max_age_hours: i64,
        batch_size: usize,
    ) -> Self {
        Self { briefs, health, interval, max_age_hours, batch_size }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.tick().await; // consume immediate first tick

        loop {
            interval.tick().await;
            self.run_once().await;
        }
    }

    pub async fn run_once(&self) {
        match self.briefs.refresh_stale(self.max_age_hours, self.batch_size).await {
            Ok(report) => self.health.record_refresh(&report, Utc::now()),
            Err(e) => {
                error!("Snapshot refresher error: {e}");
                self.health.record_refresh_failure();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MIN_SAMPLE_SIZE, SNAPSHOT_TTL_HOURS, WINDOW_DAYS};
    use crate::db::models::SnapshotRow;
    use crate::db::test_support::{insert_listing, listing, memory_pool};
    use crate::db::{ListingStore, SnapshotStore, SqliteListingStore};
    use crate::market::{MarketStatsService, WindowedAggregator};

    async fn refresher() -> (SnapshotRefresher, Arc<HealthState>, sqlx::SqlitePool) {
        let pool = memory_pool().await;
        let store: Arc<dyn ListingStore> = Arc::new(SqliteListingStore::new(pool.clone()));
        let market = Arc::new(MarketStatsService::new(WindowedAggregator::new(
            Arc::clone(&store),
            WINDOW_DAYS,
            MIN_SAMPLE_SIZE,
        )));
        let briefs = Arc::new(BriefService::new(
            store,
            SnapshotStore::new(pool.clone()),
            market,
            chrono::Duration::hours(SNAPSHOT_TTL_HOURS),
        ));
        let health = Arc::new(HealthState::new());
        let task = SnapshotRefresher::new(briefs, Arc::clone(&health), Duration::from_secs(60), 6, 10);
        (task, health, pool)
    }

    #[tokio::test]
    async fn run_records_refresh_in_health() {
        let (task, health, pool) = refresher().await;
        let l = listing("l1", "bikes", 100.0);
        insert_listing(&pool, &l).await;
        let old = SnapshotRow::from_stats(&l, None, Utc::now() - chrono::Duration::hours(12));
        SnapshotStore::new(pool.clone()).upsert(&old).await.unwrap();

        task.run_once().await;
        assert_eq!(health.snapshots_refreshed(), 1);
        assert!(health.last_refresh_at_ms().is_some());
    }

    #[tokio::test]
    async fn failed_run_is_counted() {
        let (task, health, pool) = refresher().await;
        pool.close().await;

        task.run_once().await;
        assert_eq!(health.consecutive_refresh_failures(), 1);
        assert!(health.last_refresh_at_ms().is_none());
    }
}
