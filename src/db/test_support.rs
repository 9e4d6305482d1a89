//! In-memory SQLite fixtures shared by store-backed tests.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;

use crate::db::to_millis;
use crate::types::{Listing, ListingAttributes};

/// Single-connection pool so every query sees the same in-memory database.
pub async fn memory_pool() -> sqlx::SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations").run(&pool).await.expect("migrations");
    pool
}

pub fn days_ago(days: i64) -> DateTime<Utc> {
    Utc::now() - Duration::days(days)
}

/// Active, approved listing created a day ago with no attributes or location.
pub fn listing(id: &str, category_id: &str, price: f64) -> Listing {
    Listing {
        id: id.to_string(),
        title: format!("Listing {id}"),
        description: String::new(),
        price,
        category_id: category_id.to_string(),
        subcategory_id: None,
        city: None,
        attributes: ListingAttributes::default(),
        created_at: days_ago(1),
        location: None,
        photo_count: 0,
        has_contact_info: false,
        status: "active".to_string(),
        moderation_status: "approved".to_string(),
    }
}

pub async fn insert_listing(pool: &sqlx::SqlitePool, l: &Listing) {
    sqlx::query(
        r#"
        INSERT OR REPLACE INTO listings (
            id, title, description, price, category_id, subcategory_id, city,
            brand, model, storage, make, year, realty_type, district, area,
            lat, lng, photo_count, has_contact_info, status, moderation_status, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&l.id)
    .bind(&l.title)
    .bind(&l.description)
    .bind(l.price)
    .bind(&l.category_id)
    .bind(&l.subcategory_id)
    .bind(&l.city)
    .bind(&l.attributes.brand)
    .bind(&l.attributes.model)
    .bind(&l.attributes.storage)
    .bind(&l.attributes.make)
    .bind(l.attributes.year.map(i64::from))
    .bind(&l.attributes.realty_type)
    .bind(&l.attributes.district)
    .bind(l.attributes.area)
    .bind(l.location.map(|p| p.lat))
    .bind(l.location.map(|p| p.lng))
    .bind(i64::from(l.photo_count))
    .bind(l.has_contact_info)
    .bind(&l.status)
    .bind(&l.moderation_status)
    .bind(to_millis(l.created_at))
    .execute(pool)
    .await
    .expect("insert listing");
}

/// Insert `n` comparables of one category, created `age_days` ago, priced from `prices`.
pub async fn insert_comparables(
    pool: &sqlx::SqlitePool,
    prefix: &str,
    category_id: &str,
    age_days: i64,
    prices: &[f64],
) {
    for (i, price) in prices.iter().enumerate() {
        let mut l = listing(&format!("{prefix}-{i}"), category_id, *price);
        l.created_at = days_ago(age_days);
        insert_listing(pool, &l).await;
    }
}
