//! Endpoint health cache
//!
//! One observation per endpoint URL, overwritten by every dispatch attempt and
//! every probe. Observations expire after the freshness window and must then
//! be re-probed. The cache is bounded by `capacity`; moka evicts past it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::sync::Cache;
use serde::Serialize;

/// Last observed health of one endpoint
#[derive(Debug, Clone, Serialize)]
pub struct EndpointHealth {
    pub endpoint: String,
    pub healthy: bool,
    #[serde(rename = "lastCheck")]
    pub last_check: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct HealthCache {
    entries: Cache<String, EndpointHealth>,
}

impl HealthCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        let entries = Cache::builder()
            .max_capacity(capacity.max(1) as u64)
            .time_to_live(ttl)
            .build();
        Self { entries }
    }

    /// Cached observation, only if fresher than the window
    pub fn get(&self, endpoint: &str) -> Option<EndpointHealth> {
        self.entries.get(endpoint)
    }

    pub fn record_success(&self, endpoint: &str) {
        self.record(endpoint, true, None);
    }

    pub fn record_failure(&self, endpoint: &str, error: impl Into<String>) {
        self.record(endpoint, false, Some(error.into()));
    }

    fn record(&self, endpoint: &str, healthy: bool, error: Option<String>) {
        self.entries.insert(
            endpoint.to_string(),
            EndpointHealth {
                endpoint: endpoint.to_string(),
                healthy,
                last_check: Utc::now(),
                error,
            },
        );
    }

    /// Live entries after pending evictions are applied
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}
