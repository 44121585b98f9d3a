//! Counter-backed metrics sink
//!
//! [`AtomicMetrics`] keeps the engine's counters in atomics so an outer
//! layer (an HTTP `/metrics` handler, a log line) can read them at any time
//! through [`AtomicMetrics::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::traits::{METRIC_HOSTNAME_TOTAL, METRIC_IP_TOTAL, METRIC_RELOADS_TOTAL, MetricsSink};

/// Metrics sink backed by atomic counters
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    hostname_total: AtomicU64,
    ip_total: AtomicU64,
    reloads_total: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Distinct hostnames in the last rebuild or flush
    pub hostname_total: u64,
    /// IP entries in the last rebuild or flush
    pub ip_total: u64,
    /// Reload invocations since start
    pub reloads_total: u64,
}

impl MetricsSnapshot {
    /// Counters as `(metric name, value)` pairs
    pub fn counters(&self) -> [(&'static str, u64); 3] {
        [
            (METRIC_HOSTNAME_TOTAL, self.hostname_total),
            (METRIC_IP_TOTAL, self.ip_total),
            (METRIC_RELOADS_TOTAL, self.reloads_total),
        ]
    }
}

impl AtomicMetrics {
    /// Create a sink with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hostname_total: self.hostname_total.load(Ordering::Relaxed),
            ip_total: self.ip_total.load(Ordering::Relaxed),
            reloads_total: self.reloads_total.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for AtomicMetrics {
    fn set_hostname_total(&self, count: u64) {
        self.hostname_total.store(count, Ordering::Relaxed);
    }

    fn set_ip_total(&self, count: u64) {
        self.ip_total.store(count, Ordering::Relaxed);
    }

    fn inc_reloads(&self) {
        self.reloads_total.fetch_add(1, Ordering::Relaxed);
    }
}
