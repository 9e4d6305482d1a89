use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::db::ListingStore;
use crate::error::Result;
use crate::market::ladder::ComparableFilter;

/// count / mean / min / max / median over one sample. Values are unrounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceSummary {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

impl PriceSummary {
    /// None for an empty sample.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let mid = count / 2;
        let median = if count % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        } else {
            sorted[mid]
        };

        Some(Self {
            count,
            mean: sorted.iter().sum::<f64>() / count as f64,
            min: sorted[0],
            max: sorted[count - 1],
            median,
        })
    }
}

/// Result of one windowed aggregation. `summary` is None when even the widest
/// window matched nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowedStats {
    pub window_days: u32,
    pub summary: Option<PriceSummary>,
}

impl WindowedStats {
    pub fn count(&self) -> usize {
        self.summary.map_or(0, |s| s.count)
    }
}

/// Queries comparables over widening time windows until one holds a
/// sufficient sample.
pub struct WindowedAggregator {
    store: Arc<dyn ListingStore>,
    windows: Vec<u32>,
    min_sample: usize,
}

impl WindowedAggregator {
    /// `windows` must be ascending and non-empty.
    pub fn new(store: Arc<dyn ListingStore>, windows: &[u32], min_sample: usize) -> Self {
        Self { store, windows: windows.to_vec(), min_sample }
    }

    pub fn min_sample(&self) -> usize {
        self.min_sample
    }

    pub async fn aggregate(&self, filter: &ComparableFilter) -> Result<WindowedStats> {
        self.aggregate_at(filter, Utc::now()).await
    }

    /// First window reaching `min_sample` wins. If none does, the widest
    /// window's sample is returned whatever its size.
    pub async fn aggregate_at(
        &self,
        filter: &ComparableFilter,
        now: DateTime<Utc>,
    ) -> Result<WindowedStats> {
        let mut widest = WindowedStats {
            window_days: self.windows.last().copied().unwrap_or(0),
            summary: None,
        };

        for &days in &self.windows {
            let since = now - Duration::days(i64::from(days));
            let values = self.store.comparable_values(filter, since).await?;
            debug!(
                category = %filter.category_id,
                window_days = days,
                count = values.len(),
                "comparable window probed"
            );

            let stats = WindowedStats { window_days: days, summary: PriceSummary::from_values(&values) };
            if values.len() >= self.min_sample {
                return Ok(stats);
            }
            widest = stats;
        }

        Ok(widest)
    }
}
