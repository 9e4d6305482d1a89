use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::db::models::SnapshotRow;
use crate::db::{ListingStore, SnapshotStore};
use crate::error::Result;
use crate::market::MarketStatsService;
use crate::types::{Listing, MarketBrief};

/// Outcome of one `refresh_stale` batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub scanned: usize,
    pub refreshed: usize,
    /// Snapshots dropped because their listing no longer exists.
    pub removed: usize,
    pub failed: usize,
}

/// Market briefs backed by the persisted snapshot table.
///
/// Snapshots younger than `ttl` are served as stored. Older (or missing) ones
/// are recomputed through the market stats service and written back.
pub struct BriefService {
    listings: Arc<dyn ListingStore>,
    snapshots: SnapshotStore,
    market: Arc<MarketStatsService>,
    ttl: Duration,
}

impl BriefService {
    pub fn new(
        listings: Arc<dyn ListingStore>,
        snapshots: SnapshotStore,
        market: Arc<MarketStatsService>,
        ttl: Duration,
    ) -> Self {
        Self { listings, snapshots, market, ttl }
    }

    /// None when the listing does not exist.
    pub async fn get_brief(&self, listing_id: &str) -> Result<Option<MarketBrief>> {
        let now = Utc::now();
        if let Some(row) = self.snapshots.get(listing_id).await? {
            if row.is_fresh(now, self.ttl) {
                return Ok(Some(row.to_brief()));
            }
        }
        let Some(listing) = self.listings.get_listing(listing_id).await? else {
            return Ok(None);
        };
        self.recompute(&listing, now).await.map(Some)
    }

    /// Briefs keyed by listing id. Fresh snapshots are read in one query; the
    /// rest are recomputed one at a time. Unknown ids and listings whose
    /// recomputation fails are left out of the map.
    pub async fn get_briefs(&self, listing_ids: &[String]) -> Result<HashMap<String, MarketBrief>> {
        let now = Utc::now();
        let mut seen = HashSet::new();
        let ids: Vec<String> = listing_ids
            .iter()
            .filter(|&id| !id.trim().is_empty() && seen.insert(id.as_str()))
            .cloned()
            .collect();

        let mut briefs = HashMap::with_capacity(ids.len());
        for row in self.snapshots.get_many(&ids).await? {
            if row.is_fresh(now, self.ttl) {
                briefs.insert(row.listing_id.clone(), row.to_brief());
            }
        }
        let fresh = briefs.len();

        let stale: Vec<String> = ids.into_iter().filter(|id| !briefs.contains_key(id)).collect();
        for listing in self.listings.get_listings(&stale).await? {
            match self.recompute(&listing, now).await {
                Ok(brief) => {
                    briefs.insert(listing.id, brief);
                }
                Err(e) => {
                    warn!(listing_id = %listing.id, error = %e, "brief recompute failed, skipping");
                }
            }
        }

        debug!(requested = listing_ids.len(), fresh, stale = stale.len(), "briefs served");
        Ok(briefs)
    }

    /// Recompute up to `batch_size` snapshots older than `max_age_hours`,
    /// oldest first. Safe to re-run and to interrupt: each snapshot is
    /// rewritten independently.
    pub async fn refresh_stale(&self, max_age_hours: i64, batch_size: usize) -> Result<RefreshReport> {
        let now = Utc::now();
        let cutoff = stale_cutoff(now, max_age_hours);
        let ids = self.snapshots.oldest_stale(cutoff, batch_size).await?;

        let mut report = RefreshReport { scanned: ids.len(), ..RefreshReport::default() };
        for id in &ids {
            let listing = match self.listings.get_listing(id).await {
                Ok(Some(listing)) => listing,
                Ok(None) => {
                    self.snapshots.delete(id).await?;
                    report.removed += 1;
                    continue;
                }
                Err(e) => {
                    warn!(listing_id = %id, error = %e, "snapshot refresh: listing lookup failed");
                    report.failed += 1;
                    continue;
                }
            };
            match self.recompute(&listing, now).await {
                Ok(_) => report.refreshed += 1,
                Err(e) => {
                    warn!(listing_id = %id, error = %e, "snapshot refresh: recompute failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            event = "SNAPSHOT_REFRESH",
            max_age_hours,
            batch_size,
            scanned = report.scanned,
            refreshed = report.refreshed,
            removed = report.removed,
            failed = report.failed,
            "Snapshot refresh: {} scanned, {} refreshed, {} removed, {} failed",
            report.scanned, report.refreshed, report.removed, report.failed,
        );
        Ok(report)
    }

    async fn recompute(&self, listing: &Listing, now: DateTime<Utc>) -> Result<MarketBrief> {
        let stats = self.market.market_stats(listing).await?;
        self.snapshots
            .upsert(&SnapshotRow::from_stats(listing, stats.as_ref(), now))
            .await?;
        debug!(
            listing_id = %listing.id,
            has_market_data = stats.is_some(),
            "snapshot recomputed"
        );
        Ok(MarketBrief::from(stats.as_ref()))
    }
}

/// Snapshots computed before this instant are stale. An age too large to
/// represent leaves nothing stale.
fn stale_cutoff(now: DateTime<Utc>, max_age_hours: i64) -> DateTime<Utc> {
    Duration::try_hours(max_age_hours.max(0))
        .and_then(|age| now.checked_sub_signed(age))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
