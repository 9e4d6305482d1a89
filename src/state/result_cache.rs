use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::types::PriceRecommendation;

struct CachedResult {
    recommendation: PriceRecommendation,
    inserted_at: Instant,
    /// Insertion sequence; the smallest value is evicted first.
    seq: u64,
}

/// Short-lived memo of price calculations keyed by listing id.
///
/// Expired entries are dropped lazily on read. Capacity is enforced on the
/// inserting task: once the map grows past `capacity` the oldest entries are
/// removed before `insert` returns.
pub struct ResultCache {
    entries: DashMap<String, CachedResult>,
    ttl: Duration,
    capacity: usize,
    next_seq: AtomicU64,
}

impl ResultCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
            next_seq: AtomicU64::new(0),
        }
    }

    pub fn get(&self, listing_id: &str) -> Option<PriceRecommendation> {
        if let Some(entry) = self.entries.get(listing_id) {
            if entry.inserted_at.elapsed() < self.ttl {
                return Some(entry.recommendation.clone());
            }
        }
        self.entries
            .remove_if(listing_id, |_, e| e.inserted_at.elapsed() >= self.ttl);
        None
    }

    pub fn insert(&self, listing_id: String, recommendation: PriceRecommendation) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.entries.insert(
            listing_id,
            CachedResult { recommendation, inserted_at: Instant::now(), seq },
        );
        while self.entries.len() > self.capacity {
            if !self.evict_oldest() {
                break;
            }
        }
    }

    pub fn invalidate(&self, listing_id: &str) {
        self.entries.remove(listing_id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict_oldest(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.value().seq)
            .map(|e| e.key().clone());
        match oldest {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(reason: &str) -> PriceRecommendation {
        let mut r = PriceRecommendation::no_data();
        r.reasons = vec![reason.to_string()];
        r
    }

    #[test]
    fn hit_returns_stored_result() {
        let cache = ResultCache::new(Duration::from_secs(60), 10);
        cache.insert("l1".into(), rec("a"));
        assert_eq!(cache.get("l1"), Some(rec("a")));
        assert!(cache.get("l2").is_none());
    }

    #[test]
    fn expired_entry_is_dropped_on_read() {
        let cache = ResultCache::new(Duration::ZERO, 10);
        cache.insert("l1".into(), rec("a"));
        assert!(cache.get("l1").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn overflow_evicts_oldest_first() {
        let cache = ResultCache::new(Duration::from_secs(60), 2);
        cache.insert("first".into(), rec("1"));
        cache.insert("second".into(), rec("2"));
        cache.insert("third".into(), rec("3"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("first").is_none());
        assert!(cache.get("second").is_some());
        assert!(cache.get("third").is_some());
    }

    #[test]
    fn reinsert_refreshes_position() {
        let cache = ResultCache::new(Duration::from_secs(60), 2);
        cache.insert("a".into(), rec("1"));
        cache.insert("b".into(), rec("2"));
        cache.insert("a".into(), rec("1b"));
        cache.insert("c".into(), rec("3"));

        assert!(cache.get("b").is_none());
        assert_eq!(cache.get("a"), Some(rec("1b")));
    }

    #[test]
    fn invalidate_and_clear() {
        let cache = ResultCache::new(Duration::from_secs(60), 10);
        cache.insert("a".into(), rec("1"));
        cache.insert("b".into(), rec("2"));
        cache.invalidate("a");
        assert!(cache.get("a").is_none());
        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn instances_are_isolated() {
        let one = ResultCache::new(Duration::from_secs(60), 10);
        let two = ResultCache::new(Duration::from_secs(60), 10);
        one.insert("a".into(), rec("1"));
        assert!(two.get("a").is_none());
    }
}
