// # dnsmasq-api-core
//
// Core library keeping a dnsmasq `address=` file in sync with a durable
// record store.
//
// ## Architecture Overview
//
// - **RecordStore**: Trait for the durable hostname → records mapping
// - **codec**: Parse and render `address=/<hostname>/<ip>` config text
// - **Reloader**: Trait for asking dnsmasq to re-read its config
// - **MetricsSink**: Trait receiving host, IP and reload counts
// - **SyncEngine**: Rebuilds the store from the config file at boot,
//   serves mutations and publishes the store back to the file
//
// ## Design Principles
//
// 1. **Store is authoritative**: after boot the config file is only ever
//    regenerated in full from the store, never patched
// 2. **Permissive parsing**: unrecognized lines are skipped, not rejected
// 3. **Surfaced failures**: errors are passed up with context, never
//    retried or swallowed
// 4. **Library-first**: the daemon is a thin layer over this crate

pub(crate) mod atomic_file;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod reload;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{ReloadConfig, StoreConfig, SyncSettings};
pub use engine::{Published, SyncEngine, SyncEvent, SyncSummary};
pub use error::{Error, ErrorKind, Result};
pub use metrics::{AtomicMetrics, MetricsSnapshot};
pub use reload::CommandReloader;
pub use store::{FileRecordStore, MemoryRecordStore};
pub use traits::{DnsRecord, MetricsSink, RecordStore, Reloader};
