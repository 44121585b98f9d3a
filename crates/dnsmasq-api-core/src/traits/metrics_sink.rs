//! Observability sink the engine reports counts to

/// Metric name for the number of distinct hostnames
pub const METRIC_HOSTNAME_TOTAL: &str = "dnsmasq_hostname_total";

/// Metric name for the number of IP entries
pub const METRIC_IP_TOTAL: &str = "dnsmasq_ip_total";

/// Metric name for the number of reload invocations
pub const METRIC_RELOADS_TOTAL: &str = "dnsmasq_reloads_total";

/// Receiver for the engine's counters
///
/// Implementations must be cheap and non-blocking; they are called inline
/// on every rebuild and flush.
pub trait MetricsSink: Send + Sync {
    /// Set the current number of distinct hostnames
    fn set_hostname_total(&self, count: u64);

    /// Set the current number of IP entries
    fn set_ip_total(&self, count: u64);

    /// Count one reload invocation
    fn inc_reloads(&self);
}
