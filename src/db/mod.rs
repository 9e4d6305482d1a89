pub mod listings;
pub mod models;
pub mod snapshots;

#[cfg(test)]
pub mod test_support;

pub use listings::{ListingStore, SqliteListingStore};
pub use snapshots::SnapshotStore;

use chrono::{DateTime, Utc};

/// Timestamps are stored as unix milliseconds.
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}
