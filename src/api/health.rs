//! Shared health state for the /health endpoint.
//! Updated by the snapshot refresher after every run.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::snapshot::RefreshReport;

/// Shared health metrics. Updated by background tasks, read by API.
#[derive(Default)]
pub struct HealthState {
    /// Unix ms of the last successful refresher run (0 = none).
    pub last_refresh_at_ms: AtomicI64,
    /// Snapshots recomputed since startup.
    pub snapshots_refreshed: AtomicU64,
    /// Refresher runs in a row that ended in an error.
    pub consecutive_refresh_failures: AtomicU64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_refresh(&self, report: &RefreshReport, at: DateTime<Utc>) {
        self.last_refresh_at_ms.store(at.timestamp_millis(), Ordering::Relaxed);
        self.snapshots_refreshed
            .fetch_add(report.refreshed as u64, Ordering::Relaxed);
        self.consecutive_refresh_failures.store(0, Ordering::Relaxed);
    }

    pub fn record_refresh_failure(&self) {
        self.consecutive_refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_refresh_at_ms(&self) -> Option<i64> {
        match self.last_refresh_at_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Some(ms),
        }
    }

    pub fn snapshots_refreshed(&self) -> u64 {
        self.snapshots_refreshed.load(Ordering::Relaxed)
    }

    pub fn consecutive_refresh_failures(&self) -> u64 {
        self.consecutive_refresh_failures.load(Ordering::Relaxed)
    }
}
