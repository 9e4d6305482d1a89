use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use crate::db::models::SnapshotRow;
use crate::db::to_millis;
use crate::error::Result;

const SNAPSHOT_COLUMNS: &str = "listing_id, has_market_data, avg_price, min_price, max_price, \
     median_price, avg_price_per_area, count, diff_percent, market_level, window_days, \
     comparison_type, snapshot_listing_price, snapshot_category_id, updated_at";

/// Persisted per-listing market briefs (`price_snapshots`).
#[derive(Clone)]
pub struct SnapshotStore {
    pool: sqlx::SqlitePool,
}

impl SnapshotStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, listing_id: &str) -> Result<Option<SnapshotRow>> {
        let row: Option<SnapshotRow> = sqlx::query_as(&format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM price_snapshots WHERE listing_id = ?"
        ))
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_many(&self, listing_ids: &[String]) -> Result<Vec<SnapshotRow>> {
        if listing_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM price_snapshots WHERE listing_id IN ("
        ));
        let mut sep = qb.separated(", ");
        for id in listing_ids {
            sep.push_bind(id.clone());
        }
        sep.push_unseparated(")");

        let rows: Vec<SnapshotRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Last write wins; every column is replaced from `row`.
    pub async fn upsert(&self, row: &SnapshotRow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO price_snapshots (
                listing_id, has_market_data, avg_price, min_price, max_price,
                median_price, avg_price_per_area, count, diff_percent, market_level,
                window_days, comparison_type, snapshot_listing_price, snapshot_category_id,
                updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(listing_id) DO UPDATE SET
                has_market_data = excluded.has_market_data,
                avg_price = excluded.avg_price,
                min_price = excluded.min_price,
                max_price = excluded.max_price,
                median_price = excluded.median_price,
                avg_price_per_area = excluded.avg_price_per_area,
                count = excluded.count,
                diff_percent = excluded.diff_percent,
                market_level = excluded.market_level,
                window_days = excluded.window_days,
                comparison_type = excluded.comparison_type,
                snapshot_listing_price = excluded.snapshot_listing_price,
                snapshot_category_id = excluded.snapshot_category_id,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&row.listing_id)
        .bind(row.has_market_data)
        .bind(row.avg_price)
        .bind(row.min_price)
        .bind(row.max_price)
        .bind(row.median_price)
        .bind(row.avg_price_per_area)
        .bind(row.count)
        .bind(row.diff_percent)
        .bind(&row.market_level)
        .bind(row.window_days)
        .bind(&row.comparison_type)
        .bind(row.snapshot_listing_price)
        .bind(&row.snapshot_category_id)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Ids of snapshots last updated before `cutoff`, oldest first.
    pub async fn oldest_stale(&self, cutoff: DateTime<Utc>, limit: usize) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT listing_id FROM price_snapshots
            WHERE updated_at < ?
            ORDER BY updated_at ASC
            LIMIT ?
            "#,
        )
        .bind(to_millis(cutoff))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    pub async fn delete(&self, listing_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM price_snapshots WHERE listing_id = ?")
            .bind(listing_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
