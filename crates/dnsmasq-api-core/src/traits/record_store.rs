// # Record Store Trait
//
// Defines the interface for the durable hostname → records mapping.
//
// ## Purpose
//
// The record store is the single source of truth once the engine has
// booted. The dnsmasq config file is derived from it on every flush.
//
// ## Implementations
//
// - File-based: bucketed JSON file with atomic replace (`FileRecordStore`)
// - In-memory: `MemoryRecordStore`
//
// ## Usage
//
// ```rust,ignore
// use dnsmasq_api_core::{DnsRecord, RecordStore};
//
// let store = /* RecordStore implementation */;
//
// store.put("nas.lan", &[DnsRecord::new("nas.lan", "10.0.0.5")]).await?;
// let records = store.get_by_host("nas.lan").await?;
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One hostname → IP mapping
///
/// Many records may share a hostname, one per IP.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DnsRecord {
    /// The hostname as given (case-sensitive)
    pub hostname: String,
    /// The address dnsmasq answers with
    pub ip: String,
}

impl DnsRecord {
    /// Create a new record
    pub fn new(hostname: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ip: ip.into(),
        }
    }
}

/// Trait for record store implementations
///
/// Each entry is keyed by hostname and holds the ordered records for that
/// host. Entries are replaced wholesale, never merged.
///
/// # Transactions
///
/// Every method must be atomic with respect to every other: no caller may
/// observe a partially written entry, and a failed write must leave the
/// previous entry visible.
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Get every record across all hosts
    ///
    /// Order across hosts is unspecified, but all records for one host are
    /// contiguous and keep their stored order.
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DnsRecord>)`: All records (empty if the store is empty)
    /// - `Err(Error::StoreUnavailable)`: Storage error
    async fn get_all(&self) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Get the records stored for `hostname`
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<DnsRecord>)`: The stored records
    /// - `Err(Error::HostNotFound)`: No entry exists for `hostname`
    /// - `Err(Error::StoreUnavailable)`: Storage error
    async fn get_by_host(&self, hostname: &str) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Replace the entry for `hostname` with `records`
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The new entry is durable and visible
    /// - `Err(Error::StoreUnavailable)`: Nothing changed
    async fn put(&self, hostname: &str, records: &[DnsRecord]) -> Result<(), crate::Error>;

    /// Delete the entry for `hostname`
    ///
    /// Deleting a hostname that has no entry succeeds.
    async fn delete(&self, hostname: &str) -> Result<(), crate::Error>;

    /// Remove every entry in one transaction
    async fn clear(&self) -> Result<(), crate::Error>;

    /// Replace every entry with `entries` in one transaction
    ///
    /// On error the previous entries stay visible.
    async fn replace_all(
        &self,
        entries: BTreeMap<String, Vec<DnsRecord>>,
    ) -> Result<(), crate::Error>;

    /// Persist pending state and release the handle
    ///
    /// Calls made after `close` fail with `Error::StoreUnavailable`.
    async fn close(&self) -> Result<(), crate::Error>;

    /// Get the store type name (for logging)
    fn store_name(&self) -> &'static str;
}
