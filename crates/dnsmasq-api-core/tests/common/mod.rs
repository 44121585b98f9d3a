//! Test doubles and common utilities for sync contract tests
//!
//! This module provides fakes for the engine's collaborators and a
//! harness that wires them to a scratch dnsmasq config file.

#![allow(dead_code)]

use dnsmasq_api_core::error::{Error, Result};
use dnsmasq_api_core::{
    AtomicMetrics, DnsRecord, MemoryRecordStore, RecordStore, Reloader, SyncEngine, SyncEvent,
    SyncSettings,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::mpsc;

/// A Reloader that counts calls and can be told to fail
pub struct CountingReloader {
    /// Call counter for reload()
    call_count: Arc<AtomicUsize>,
    /// Whether reload() fails
    fail: Arc<AtomicBool>,
}

impl CountingReloader {
    pub fn new() -> Self {
        Self {
            call_count: Arc::new(AtomicUsize::new(0)),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Get the number of times reload() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Make subsequent reload() calls fail (or succeed again)
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Create a new CountingReloader that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            call_count: Arc::clone(&other.call_count),
            fail: Arc::clone(&other.fail),
        }
    }
}

#[async_trait::async_trait]
impl Reloader for CountingReloader {
    async fn reload(&self) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::reload_failed("exit status: 1"));
        }
        Ok(())
    }

    fn reloader_name(&self) -> &'static str {
        "counting"
    }
}

/// A RecordStore wrapper whose reads and writes can be made to fail
pub struct FlakyStore {
    inner: MemoryRecordStore,
    unavailable: Arc<AtomicBool>,
    /// Write transactions attempted (put, delete, clear, replace_all)
    write_count: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn new(inner: MemoryRecordStore) -> Self {
        Self {
            inner,
            unavailable: Arc::new(AtomicBool::new(false)),
            write_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Handle that toggles availability of this store
    pub fn switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.unavailable)
    }

    /// Handle on the write transaction counter
    pub fn write_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.write_count)
    }

    fn check(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::store_unavailable("database file is locked"));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<()> {
        self.write_count.fetch_add(1, Ordering::SeqCst);
        self.check()
    }
}

#[async_trait::async_trait]
impl RecordStore for FlakyStore {
    async fn get_all(&self) -> Result<Vec<DnsRecord>> {
        self.check()?;
        self.inner.get_all().await
    }

    async fn get_by_host(&self, hostname: &str) -> Result<Vec<DnsRecord>> {
        self.check()?;
        self.inner.get_by_host(hostname).await
    }

    async fn put(&self, hostname: &str, records: &[DnsRecord]) -> Result<()> {
        self.check_write()?;
        self.inner.put(hostname, records).await
    }

    async fn delete(&self, hostname: &str) -> Result<()> {
        self.check_write()?;
        self.inner.delete(hostname).await
    }

    async fn clear(&self) -> Result<()> {
        self.check_write()?;
        self.inner.clear().await
    }

    async fn replace_all(&self, entries: BTreeMap<String, Vec<DnsRecord>>) -> Result<()> {
        self.check_write()?;
        self.inner.replace_all(entries).await
    }

    async fn close(&self) -> Result<()> {
        self.inner.close().await
    }

    fn store_name(&self) -> &'static str {
        "flaky"
    }
}

/// An engine wired to fakes and a scratch config file
pub struct Harness {
    /// Keeps the scratch directory alive
    pub dir: TempDir,
    /// The managed dnsmasq config file
    pub config_path: PathBuf,
    pub engine: SyncEngine,
    pub events: mpsc::Receiver<SyncEvent>,
    /// Shares counters with the engine's reloader
    pub reloader: CountingReloader,
    pub metrics: Arc<AtomicMetrics>,
    /// Shares state with the engine's store
    pub store: MemoryRecordStore,
}

impl Harness {
    /// Current contents of the config file
    pub fn config_text(&self) -> String {
        std::fs::read_to_string(&self.config_path).expect("config file readable")
    }

    /// Drain all pending engine events
    pub fn drain_events(&mut self) -> Vec<SyncEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Scratch directory with `dnsmasq.d/api.conf` containing `initial_config`
pub fn scratch_config(initial_config: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let conf_dir = dir.path().join("dnsmasq.d");
    std::fs::create_dir_all(&conf_dir).expect("create conf dir");
    let config_path = conf_dir.join("api.conf");
    std::fs::write(&config_path, initial_config).expect("write config");
    (dir, config_path)
}

/// Engine over a memory store, not yet rebuilt
pub fn harness_with(initial_config: &str, skip_reload: bool) -> Harness {
    let (dir, config_path) = scratch_config(initial_config);
    let settings = SyncSettings::new(&config_path).with_skip_reload(skip_reload);

    let store = MemoryRecordStore::new();
    let reloader = CountingReloader::new();
    let metrics = Arc::new(AtomicMetrics::new());

    let (engine, events) = SyncEngine::new(
        Box::new(store.clone()),
        Box::new(CountingReloader::sharing_counters_with(&reloader)),
        metrics.clone(),
        &settings,
    )
    .expect("engine construction succeeds");

    Harness {
        dir,
        config_path,
        engine,
        events,
        reloader,
        metrics,
        store,
    }
}

/// Engine over a memory store, rebuilt from `initial_config`
pub async fn harness(initial_config: &str) -> Harness {
    let harness = harness_with(initial_config, false);
    harness
        .engine
        .rebuild_from_config()
        .await
        .expect("rebuild succeeds");
    harness
}

/// Shorthand for a record
pub fn rec(hostname: &str, ip: &str) -> DnsRecord {
    DnsRecord::new(hostname, ip)
}
