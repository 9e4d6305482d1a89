use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use crate::db::models::{ListingRow, ACTIVE_STATUS, APPROVED_STATUS};
use crate::db::to_millis;
use crate::error::Result;
use crate::market::ladder::{ComparableFilter, Metric};
use crate::types::{GeoPoint, Listing};

const LISTING_COLUMNS: &str = "id, title, description, price, category_id, subcategory_id, city, \
     brand, model, storage, make, year, realty_type, district, area, lat, lng, \
     photo_count, has_contact_info, status, moderation_status, created_at";

const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE_LAT: f64 = 111.32;

/// Read access to the marketplace listing store.
#[async_trait]
pub trait ListingStore: Send + Sync {
    async fn get_listing(&self, id: &str) -> Result<Option<Listing>>;

    /// Listings for the given ids; unknown ids are silently absent.
    async fn get_listings(&self, ids: &[String]) -> Result<Vec<Listing>>;

    /// Metric values (price or price per area) of eligible comparables created
    /// at or after `since`. Eligible = active, approved, price > 0.
    async fn comparable_values(
        &self,
        filter: &ComparableFilter,
        since: DateTime<Utc>,
    ) -> Result<Vec<f64>>;

    /// Eligible listings of `category_id` within `radius_km` of `center`,
    /// not counting `exclude_id`.
    async fn count_competitors(
        &self,
        center: GeoPoint,
        category_id: &str,
        exclude_id: &str,
        radius_km: f64,
    ) -> Result<u64>;
}

#[derive(Clone)]
pub struct SqliteListingStore {
    pool: sqlx::SqlitePool,
}

impl SqliteListingStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingStore for SqliteListingStore {
    async fn get_listing(&self, id: &str) -> Result<Option<Listing>> {
        let row: Option<ListingRow> =
            sqlx::query_as(&format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Listing::from))
    }

    async fn get_listings(&self, ids: &[String]) -> Result<Vec<Listing>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id IN ("));
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(id.clone());
        }
        sep.push_unseparated(")");

        let rows: Vec<ListingRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Listing::from).collect())
    }

    async fn comparable_values(
        &self,
        filter: &ComparableFilter,
        since: DateTime<Utc>,
    ) -> Result<Vec<f64>> {
        let value_expr = match filter.metric {
            Metric::Price => "price",
            Metric::PricePerArea => "price / area",
        };

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {value_expr} FROM listings WHERE status = "));
        qb.push_bind(ACTIVE_STATUS)
            .push(" AND moderation_status = ")
            .push_bind(APPROVED_STATUS)
            .push(" AND price > 0 AND created_at >= ")
            .push_bind(to_millis(since))
            .push(" AND category_id = ")
            .push_bind(filter.category_id.clone())
            .push(" COLLATE NOCASE");

        if filter.metric == Metric::PricePerArea {
            qb.push(" AND area > 0");
        }
        if let Some(id) = &filter.exclude_id {
            qb.push(" AND id <> ").push_bind(id.clone());
        }
        if let Some(v) = &filter.subcategory_id {
            qb.push(" AND subcategory_id = ")
                .push_bind(v.clone())
                .push(" COLLATE NOCASE");
        }
        for (column, value) in [
            ("city", &filter.city),
            ("brand", &filter.brand),
            ("model", &filter.model),
            ("storage", &filter.storage),
            ("make", &filter.make),
            ("realty_type", &filter.realty_type),
            ("district", &filter.district),
        ] {
            if let Some(v) = value {
                qb.push(format!(" AND {column} = "))
                    .push_bind(v.clone())
                    .push(" COLLATE NOCASE");
            }
        }
        if let Some((from, to)) = filter.year_range {
            qb.push(" AND year BETWEEN ")
                .push_bind(i64::from(from))
                .push(" AND ")
                .push_bind(i64::from(to));
        }

        let values: Vec<f64> = qb.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(values)
    }

    async fn count_competitors(
        &self,
        center: GeoPoint,
        category_id: &str,
        exclude_id: &str,
        radius_km: f64,
    ) -> Result<u64> {
        // Bounding box prefilter, exact distance below.
        let dlat = radius_km / KM_PER_DEGREE_LAT;
        let dlng = radius_km / (KM_PER_DEGREE_LAT * center.lat.to_radians().cos().abs().max(0.01));

        let points: Vec<(f64, f64)> = sqlx::query_as(
            r#"
            SELECT lat, lng FROM listings
            WHERE status = ? AND moderation_status = ? AND price > 0
              AND category_id = ? COLLATE NOCASE AND id <> ?
              AND lat BETWEEN ? AND ? AND lng BETWEEN ? AND ?
            "#,
        )
        .bind(ACTIVE_STATUS)
        .bind(APPROVED_STATUS)
        .bind(category_id)
        .bind(exclude_id)
        .bind(center.lat - dlat)
        .bind(center.lat + dlat)
        .bind(center.lng - dlng)
        .bind(center.lng + dlng)
        .fetch_all(&self.pool)
        .await?;

        let count = points
            .into_iter()
            .filter(|&(lat, lng)| haversine_km(center, GeoPoint { lat, lng }) <= radius_km)
            .count();
        Ok(count as u64)
    }
}

/// Great-circle distance in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::{days_ago, insert_listing, listing, memory_pool};
    use crate::types::ListingAttributes;

    #[test]
    fn haversine_one_degree_latitude() {
        let d = haversine_km(GeoPoint { lat: 53.0, lng: 27.0 }, GeoPoint { lat: 54.0, lng: 27.0 });
        assert!((d - 111.19).abs() < 0.5, "d={d}");
    }

    #[tokio::test]
    async fn comparables_skip_ineligible_and_excluded() {
        let pool = memory_pool().await;
        let store = SqliteListingStore::new(pool.clone());

        insert_listing(&pool, &listing("subject", "bikes", 100.0)).await;
        insert_listing(&pool, &listing("ok", "bikes", 120.0)).await;
        insert_listing(&pool, &listing("free", "bikes", 0.0)).await;
        let mut pending = listing("pending", "bikes", 90.0);
        pending.moderation_status = "pending".into();
        insert_listing(&pool, &pending).await;
        let mut sold = listing("sold", "bikes", 80.0);
        sold.status = "sold".into();
        insert_listing(&pool, &sold).await;
        let mut old = listing("old", "bikes", 70.0);
        old.created_at = days_ago(40);
        insert_listing(&pool, &old).await;

        let filter = ComparableFilter {
            category_id: "bikes".into(),
            exclude_id: Some("subject".into()),
            ..ComparableFilter::default()
        };
        let values = store.comparable_values(&filter, days_ago(30)).await.unwrap();
        assert_eq!(values, vec![120.0]);
    }

    #[tokio::test]
    async fn attribute_match_is_case_insensitive_and_year_ranged() {
        let pool = memory_pool().await;
        let store = SqliteListingStore::new(pool.clone());

        for (id, make, year, price) in [
            ("a", "toyota", 2014, 9000.0),
            ("b", "TOYOTA", 2016, 11000.0),
            ("c", "Toyota", 2018, 15000.0),
            ("d", "Honda", 2015, 8000.0),
        ] {
            let mut l = listing(id, "cars", price);
            l.attributes = ListingAttributes {
                make: Some(make.into()),
                model: Some("Corolla".into()),
                year: Some(year),
                ..Default::default()
            };
            insert_listing(&pool, &l).await;
        }

        let filter = ComparableFilter {
            category_id: "cars".into(),
            make: Some("Toyota".into()),
            model: Some("corolla".into()),
            year_range: Some((2014, 2016)),
            ..ComparableFilter::default()
        };
        let mut values = store.comparable_values(&filter, days_ago(90)).await.unwrap();
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(values, vec![9000.0, 11000.0]);
    }

    #[tokio::test]
    async fn category_and_subcategory_match_ignore_case() {
        let pool = memory_pool().await;
        let store = SqliteListingStore::new(pool.clone());

        for (id, category, subcategory, price) in [
            ("a", "Bikes", "Road", 100.0),
            ("b", "BIKES", "road", 200.0),
            ("c", "bikes", "MTB", 300.0),
        ] {
            let mut l = listing(id, category, price);
            l.subcategory_id = Some(subcategory.into());
            insert_listing(&pool, &l).await;
        }

        let filter = ComparableFilter {
            category_id: "bikes".into(),
            subcategory_id: Some("ROAD".into()),
            ..ComparableFilter::default()
        };
        let mut values = store.comparable_values(&filter, days_ago(7)).await.unwrap();
        values.sort_by(|a, b| a.total_cmp(b));
        assert_eq!(values, vec![100.0, 200.0]);

        let all = ComparableFilter { category_id: "bIkEs".into(), ..ComparableFilter::default() };
        assert_eq!(store.comparable_values(&all, days_ago(7)).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn price_per_area_ignores_missing_area() {
        let pool = memory_pool().await;
        let store = SqliteListingStore::new(pool.clone());

        let mut with_area = listing("f1", "apartments", 100_000.0);
        with_area.attributes.area = Some(50.0);
        insert_listing(&pool, &with_area).await;
        insert_listing(&pool, &listing("f2", "apartments", 80_000.0)).await;

        let filter = ComparableFilter {
            category_id: "apartments".into(),
            metric: Metric::PricePerArea,
            ..ComparableFilter::default()
        };
        let values = store.comparable_values(&filter, days_ago(7)).await.unwrap();
        assert_eq!(values, vec![2000.0]);
    }

    #[tokio::test]
    async fn competitors_are_counted_within_radius_only() {
        let pool = memory_pool().await;
        let store = SqliteListingStore::new(pool.clone());
        let center = GeoPoint { lat: 53.9, lng: 27.56 };

        let mut subject = listing("me", "bakery", 5.0);
        subject.location = Some(center);
        insert_listing(&pool, &subject).await;

        // ~1.1 km and ~2.2 km north, then ~11 km north
        for (id, dlat) in [("n1", 0.01), ("n2", 0.02), ("far", 0.1)] {
            let mut l = listing(id, "bakery", 5.0);
            l.location = Some(GeoPoint { lat: center.lat + dlat, lng: center.lng });
            insert_listing(&pool, &l).await;
        }
        let mut other_cat = listing("shoes", "shoes", 50.0);
        other_cat.location = Some(center);
        insert_listing(&pool, &other_cat).await;

        let n = store.count_competitors(center, "bakery", "me", 3.0).await.unwrap();
        assert_eq!(n, 2);
        let n = store.count_competitors(center, "Bakery", "me", 3.0).await.unwrap();
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn get_listings_returns_known_ids() {
        let pool = memory_pool().await;
        let store = SqliteListingStore::new(pool.clone());
        insert_listing(&pool, &listing("x", "bikes", 10.0)).await;
        insert_listing(&pool, &listing("y", "bikes", 20.0)).await;

        let mut ids: Vec<String> = store
            .get_listings(&["x".to_string(), "missing".to_string(), "y".to_string()])
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["x", "y"]);
        assert!(store.get_listing("missing").await.unwrap().is_none());
    }
}
