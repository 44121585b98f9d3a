// # Memory Record Store
//
// In-memory implementation of RecordStore.
//
// ## Purpose
//
// Same transactional semantics as the file store without persistence.
// Since the engine rebuilds the store from the dnsmasq config on every
// boot, losing it on restart only loses changes that were never flushed.
//
// ## When to Use
//
// - Testing environments
// - Deployments where the dnsmasq config file is the only state worth keeping

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::traits::record_store::{DnsRecord, RecordStore};

/// In-memory record store implementation
///
/// # Example
///
/// ```rust,no_run
/// use dnsmasq_api_core::store::MemoryRecordStore;
/// use dnsmasq_api_core::{DnsRecord, RecordStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///
///     store.put("nas.lan", &[DnsRecord::new("nas.lan", "10.0.0.5")]).await?;
///     assert_eq!(store.get_all().await?.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    entries: BTreeMap<String, Vec<DnsRecord>>,
    closed: bool,
}

impl MemoryState {
    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::store_unavailable("record store is closed"));
        }
        Ok(())
    }
}

impl MemoryRecordStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of hostnames in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_all(&self) -> Result<Vec<DnsRecord>, Error> {
        let guard = self.inner.read().await;
        guard.ensure_open()?;
        Ok(guard.entries.values().flatten().cloned().collect())
    }

    async fn get_by_host(&self, hostname: &str) -> Result<Vec<DnsRecord>, Error> {
        let guard = self.inner.read().await;
        guard.ensure_open()?;
        guard
            .entries
            .get(hostname)
            .cloned()
            .ok_or_else(|| Error::host_not_found(hostname))
    }

    async fn put(&self, hostname: &str, records: &[DnsRecord]) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.ensure_open()?;
        guard.entries.insert(hostname.to_string(), records.to_vec());
        Ok(())
    }

    async fn delete(&self, hostname: &str) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.ensure_open()?;
        guard.entries.remove(hostname);
        Ok(())
    }

    async fn clear(&self) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.ensure_open()?;
        guard.entries.clear();
        Ok(())
    }

    async fn replace_all(&self, entries: BTreeMap<String, Vec<DnsRecord>>) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.ensure_open()?;
        guard.entries = entries;
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        self.inner.write().await.closed = true;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_basic() {
        let store = MemoryRecordStore::new();

        assert!(store.is_empty().await);

        let records = vec![DnsRecord::new("h", "1.1.1.1")];
        store.put("h", &records).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(store.get_by_host("h").await.unwrap(), records);

        store.delete("h").await.unwrap();
        assert!(store.is_empty().await);
        assert!(store.get_by_host("h").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_memory_store_clones_share_state() {
        let store = MemoryRecordStore::new();
        let handle = store.clone();

        handle.put("h", &[DnsRecord::new("h", "1.1.1.1")]).await.unwrap();
        assert_eq!(store.get_all().await.unwrap().len(), 1);

        store.clear().await.unwrap();
        assert!(handle.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_replace_all() {
        let store = MemoryRecordStore::new();
        store.put("old", &[DnsRecord::new("old", "1.1.1.1")]).await.unwrap();

        let mut entries = BTreeMap::new();
        entries.insert("new".to_string(), vec![DnsRecord::new("new", "2.2.2.2")]);
        store.replace_all(entries).await.unwrap();

        assert!(store.get_by_host("old").await.unwrap_err().is_not_found());
        assert_eq!(store.get_all().await.unwrap(), vec![DnsRecord::new("new", "2.2.2.2")]);
    }

    #[tokio::test]
    async fn test_memory_store_closed() {
        let store = MemoryRecordStore::new();
        store.close().await.unwrap();

        assert!(matches!(
            store.delete("h").await,
            Err(Error::StoreUnavailable(_))
        ));
    }
}
