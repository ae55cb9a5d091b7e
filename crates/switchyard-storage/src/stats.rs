//! Per-backend usage counters

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

/// Snapshot of one backend's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackendStats {
    pub queries: u64,
    pub errors: u64,
    #[serde(rename = "lastUsed")]
    pub last_used: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounter {
    queries: AtomicU64,
    errors: AtomicU64,
    last_used: Mutex<Option<DateTime<Utc>>>,
}

impl StatsCounter {
    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
        *self.last_used.lock() = Some(Utc::now());
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BackendStats {
        BackendStats {
            queries: self.queries.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            last_used: *self.last_used.lock(),
        }
    }
}
