//! Core traits for the dnsmasq sync system
//!
//! This module defines the abstract interfaces the engine is built on.
//!
//! - [`RecordStore`]: Durable hostname → records storage
//! - [`Reloader`]: Forwarder reload mechanism
//! - [`MetricsSink`]: Receiver for engine counters

pub mod metrics_sink;
pub mod record_store;
pub mod reloader;

pub use metrics_sink::{
    METRIC_HOSTNAME_TOTAL, METRIC_IP_TOTAL, METRIC_RELOADS_TOTAL, MetricsSink,
};
pub use record_store::{DnsRecord, RecordStore};
pub use reloader::Reloader;
