//! Database row types matching migrations/0001_init.sql.
//! Used by sqlx for typed queries.
use chrono::{DateTime, Utc};

use crate::db::{from_millis, to_millis};
use crate::types::{
    ComparisonType, GeoPoint, Listing, ListingAttributes, MarketBrief, MarketLevel, MarketStats,
};

pub const ACTIVE_STATUS: &str = "active";
pub const APPROVED_STATUS: &str = "approved";

#[derive(Debug, sqlx::FromRow)]
pub struct ListingRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub category_id: String,
    pub subcategory_id: Option<String>,
    pub city: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub storage: Option<String>,
    pub make: Option<String>,
    pub year: Option<i64>,
    pub realty_type: Option<String>,
    pub district: Option<String>,
    pub area: Option<f64>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub photo_count: i64,
    pub has_contact_info: bool,
    pub status: String,
    pub moderation_status: String,
    pub created_at: i64,
}

impl From<ListingRow> for Listing {
    fn from(r: ListingRow) -> Self {
        let location = match (r.lat, r.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };
        Listing {
            id: r.id,
            title: r.title,
            description: r.description,
            price: r.price,
            category_id: r.category_id,
            subcategory_id: r.subcategory_id,
            city: r.city,
            attributes: ListingAttributes {
                brand: r.brand,
                model: r.model,
                storage: r.storage,
                make: r.make,
                year: r.year.and_then(|y| i32::try_from(y).ok()),
                realty_type: r.realty_type,
                district: r.district,
                area: r.area,
            },
            created_at: from_millis(r.created_at),
            location,
            photo_count: u32::try_from(r.photo_count.max(0)).unwrap_or(u32::MAX),
            has_contact_info: r.has_contact_info,
            status: r.status,
            moderation_status: r.moderation_status,
        }
    }
}

/// One persisted market brief per listing (`price_snapshots`).
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SnapshotRow {
    pub listing_id: String,
    pub has_market_data: bool,
    pub avg_price: Option<f64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub median_price: Option<f64>,
    pub avg_price_per_area: Option<f64>,
    pub count: i64,
    pub diff_percent: Option<f64>,
    pub market_level: Option<String>,
    pub window_days: Option<i64>,
    pub comparison_type: Option<String>,
    pub snapshot_listing_price: Option<f64>,
    pub snapshot_category_id: Option<String>,
    pub updated_at: i64,
}

impl SnapshotRow {
    /// Build the row written after a fresh computation. `stats = None` records
    /// a no-data outcome so it is not recomputed until the snapshot goes stale.
    pub fn from_stats(listing: &Listing, stats: Option<&MarketStats>, now: DateTime<Utc>) -> Self {
        Self {
            listing_id: listing.id.clone(),
            has_market_data: stats.is_some(),
            avg_price: stats.map(|s| s.avg_price),
            min_price: stats.map(|s| s.min_price),
            max_price: stats.map(|s| s.max_price),
            median_price: stats.map(|s| s.median_price),
            avg_price_per_area: stats.and_then(|s| s.avg_price_per_area),
            count: stats.map_or(0, |s| i64::from(s.count)),
            diff_percent: stats.and_then(|s| s.diff_percent),
            market_level: stats.and_then(|s| s.market_level).map(|l| l.to_string()),
            window_days: stats.map(|s| i64::from(s.window_days)),
            comparison_type: stats.map(|s| s.comparison_type.to_string()),
            snapshot_listing_price: Some(listing.price),
            snapshot_category_id: Some(listing.category_id.clone()),
            updated_at: to_millis(now),
        }
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        from_millis(self.updated_at)
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.updated_at() < ttl
    }

    pub fn to_brief(&self) -> MarketBrief {
        if !self.has_market_data {
            return MarketBrief::no_data();
        }
        MarketBrief {
            has_market_data: true,
            avg_price: self.avg_price,
            min_price: self.min_price,
            max_price: self.max_price,
            median_price: self.median_price,
            avg_price_per_area: self.avg_price_per_area,
            count: u32::try_from(self.count.max(0)).unwrap_or(u32::MAX),
            diff_percent: self.diff_percent,
            market_level: self.market_level.as_deref().and_then(MarketLevel::from_tag),
            window_days: self.window_days.and_then(|d| u32::try_from(d).ok()),
            comparison_type: self.comparison_type.as_deref().and_then(ComparisonType::from_tag),
        }
    }
}
