//! Performance counters.
//!
//! Owned by the coordinator and passed by reference to executors; reset
//! deterministically on activation. Instance-local: multiple worker
//! instances across tabs do not share counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Process-instance-local performance counters.
#[derive(Debug, Default)]
pub struct Metrics {
    cache_hits: AtomicU64,
    network_requests: AtomicU64,
    total_requests: AtomicU64,
    network_time_micros: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a handled fetch.
    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a response served from cache.
    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a completed network fetch and its duration.
    pub fn record_network(&self, elapsed: Duration) {
        self.network_requests.fetch_add(1, Ordering::Relaxed);
        self.network_time_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Count a network fetch that failed before producing a response.
    pub fn record_network_failure(&self) {
        self.network_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.cache_hits.store(0, Ordering::Relaxed);
        self.network_requests.store(0, Ordering::Relaxed);
        self.total_requests.store(0, Ordering::Relaxed);
        self.network_time_micros.store(0, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Snapshot of the counters with derived rates.
    pub fn snapshot(&self, version: &str) -> StatsSnapshot {
        let cache_hits = self.cache_hits.load(Ordering::Relaxed);
        let network_requests = self.network_requests.load(Ordering::Relaxed);
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let network_time_micros = self.network_time_micros.load(Ordering::Relaxed);

        let cache_hit_rate = if total_requests == 0 {
            0.0
        } else {
            round2(cache_hits as f64 / total_requests as f64 * 100.0)
        };

        let average_response_time = if network_requests == 0 {
            0.0
        } else {
            round2(network_time_micros as f64 / network_requests as f64 / 1000.0)
        };

        StatsSnapshot {
            cache_hits,
            network_requests,
            total_requests,
            average_response_time,
            cache_hit_rate,
            version: version.to_string(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Stats payload reported over the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub network_requests: u64,
    pub total_requests: u64,
    /// Average network response time in milliseconds.
    pub average_response_time: f64,
    /// Cache hit percentage, two decimals.
    pub cache_hit_rate: f64,
    pub version: String,
}
