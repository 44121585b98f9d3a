//! Core sync engine
//!
//! The SyncEngine is responsible for:
//! - Rebuilding the record store from the dnsmasq config file at boot
//! - Serving reads and mutations against the record store
//! - Rendering the store back into the config file on flush
//! - Reloading dnsmasq after a successful flush (unless disabled)
//!
//! ## Architecture
//!
//! ```text
//!                 rebuild                       flush
//! dnsmasq.conf ──────────────┐          ┌──────────────────► dnsmasq.conf
//!   (parse)                  ▼          │   (render)              │
//!                      ┌──────────────┐ │                         ▼
//!   set / delete ─────►│  SyncEngine  │─┘                   ┌──────────┐
//!   list / lookup ◄────│              │──────────────────►  │ Reloader │
//!                      └──────────────┘                     └──────────┘
//!                             │
//!              ┌──────────────┼──────────────┐
//!              ▼              ▼              ▼
//!       ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!       │ RecordStore │ │ MetricsSink │ │   Events    │
//!       └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! ## Mutation vs. publication
//!
//! `set` and `delete_host` only touch the store; `flush` publishes the
//! whole store to the config file. The `*_and_flush` operations run both
//! steps for callers that want a mutation to be visible to dnsmasq. Two
//! concurrent flushes may publish each other's mutations; the last write
//! to the file wins.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::atomic_file::{hidden_temp_path, write_atomic};
use crate::codec;
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::reload::CommandReloader;
use crate::store::open_store;
use crate::traits::{DnsRecord, MetricsSink, RecordStore, Reloader};

/// Permissions of the generated dnsmasq config file
const DNSMASQ_FILE_MODE: u32 = 0o644;

/// Events emitted by the SyncEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Store rebuilt from the config file
    Rebuilt { hosts: usize, ips: usize },

    /// Records stored for a hostname
    RecordsSet {
        hostname: String,
        records: usize,
        appended: bool,
    },

    /// Hostname removed from the store
    HostDeleted { hostname: String },

    /// Config file written
    Flushed { hosts: usize, ips: usize },

    /// dnsmasq reloaded after a flush
    ReloadSucceeded,

    /// dnsmasq reload failed after a flush
    ReloadFailed { error: String },

    /// Reload skipped by configuration
    ReloadSkipped,

    /// Engine closed its store
    Closed,
}

/// Host and IP counts of a rebuild
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncSummary {
    /// Distinct hostnames
    pub hosts: usize,
    /// IP entries as read from the file
    pub ips: usize,
}

/// Result of a mutation followed by a flush
///
/// The mutation and the config file write both succeeded. `reload_error`
/// is set when dnsmasq could not be reloaded afterwards: the file on disk
/// is correct but the running forwarder may still serve the old mappings.
#[derive(Debug)]
pub struct Published<T> {
    /// Value returned by the mutation
    pub value: T,
    /// Reload failure, if any
    pub reload_error: Option<Error>,
}

impl<T> Published<T> {
    /// Whether dnsmasq was reloaded (or reloading is disabled)
    pub fn is_complete(&self) -> bool {
        self.reload_error.is_none()
    }

    /// Treat a reload failure as an error
    pub fn into_result(self) -> Result<T> {
        match self.reload_error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

/// Core sync engine
///
/// Owns the record store for its whole lifetime. Share it between request
/// handlers as `Arc<SyncEngine>`; every operation runs to completion on
/// the caller's task.
///
/// ## Lifecycle
///
/// 1. Create with [`SyncEngine::open()`] (builds the configured store and
///    reloader, then rebuilds from the config file) or [`SyncEngine::new()`]
/// 2. Serve operations
/// 3. [`SyncEngine::close()`] on shutdown
pub struct SyncEngine {
    /// Authoritative record storage
    store: Box<dyn RecordStore>,

    /// Forwarder reload mechanism
    reloader: Box<dyn Reloader>,

    /// Counter sink
    metrics: Arc<dyn MetricsSink>,

    /// Managed dnsmasq config file
    dnsmasq_config: PathBuf,

    /// Skip the reload after flush
    skip_reload: bool,

    /// Serializes the read-modify-write in `set`
    set_lock: Mutex<()>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SyncEvent>,
}

impl SyncEngine {
    /// Create a new sync engine from its collaborators
    ///
    /// The store is used as-is; call [`SyncEngine::rebuild_from_config()`]
    /// to load the config file into it.
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        store: Box<dyn RecordStore>,
        reloader: Box<dyn Reloader>,
        metrics: Arc<dyn MetricsSink>,
        settings: &SyncSettings,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        settings.validate()?;

        let (tx, rx) = mpsc::channel(settings.event_channel_capacity);

        debug!(
            "Sync engine for {} using {} store and {} reloader",
            settings.dnsmasq_config.display(),
            store.store_name(),
            reloader.reloader_name()
        );

        let engine = Self {
            store,
            reloader,
            metrics,
            dnsmasq_config: settings.dnsmasq_config.clone(),
            skip_reload: settings.skip_reload,
            set_lock: Mutex::new(()),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Open the configured store and reloader, then rebuild from the config file
    ///
    /// This is the boot path: any error (including an unreadable config
    /// file) means the engine must not serve. The store is closed again
    /// before the error is returned.
    pub async fn open(
        settings: &SyncSettings,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<(Self, mpsc::Receiver<SyncEvent>)> {
        settings.validate()?;

        let store = open_store(&settings.store).await?;
        let reloader = if settings.skip_reload {
            CommandReloader::default()
        } else {
            CommandReloader::from_config(&settings.reload)?
        };

        let (engine, rx) = Self::new(store, Box::new(reloader), metrics, settings)?;

        if let Err(e) = engine.rebuild_from_config().await {
            if let Err(close_err) = engine.store.close().await {
                warn!("Failed to close record store after boot error: {}", close_err);
            }
            return Err(e);
        }

        Ok((engine, rx))
    }

    /// Path of the managed dnsmasq config file
    pub fn config_path(&self) -> &Path {
        &self.dnsmasq_config
    }

    /// Whether flushes skip the dnsmasq reload
    pub fn skip_reload(&self) -> bool {
        self.skip_reload
    }

    /// Replace the store contents with the records in the config file
    ///
    /// The replacement is a single store transaction. Fails with
    /// `Error::ConfigRead` if the file cannot be read; the store is left
    /// untouched in that case, and on any store error.
    pub async fn rebuild_from_config(&self) -> Result<SyncSummary> {
        let text = fs::read_to_string(&self.dnsmasq_config)
            .await
            .map_err(|source| Error::ConfigRead {
                path: self.dnsmasq_config.clone(),
                source,
            })?;

        let entries = codec::parse(&text);
        let summary = SyncSummary {
            hosts: entries.len(),
            ips: entries.values().map(Vec::len).sum(),
        };

        let entries: BTreeMap<String, Vec<DnsRecord>> = entries
            .into_iter()
            .map(|(hostname, ips)| {
                let records = ips
                    .into_iter()
                    .map(|ip| DnsRecord::new(hostname.as_str(), ip))
                    .collect();
                (hostname, dedup_by_ip(records))
            })
            .collect();

        {
            let _guard = self.set_lock.lock().await;
            self.store.replace_all(entries).await?;
        }

        self.metrics.set_hostname_total(summary.hosts as u64);
        self.metrics.set_ip_total(summary.ips as u64);

        info!(
            "Rebuilt record store from {}: {} host(s), {} IP entr(ies)",
            self.dnsmasq_config.display(),
            summary.hosts,
            summary.ips
        );
        self.emit_event(SyncEvent::Rebuilt {
            hosts: summary.hosts,
            ips: summary.ips,
        });

        Ok(summary)
    }

    /// All records across all hosts
    pub async fn list_all(&self) -> Result<Vec<DnsRecord>> {
        self.store.get_all().await
    }

    /// Records for one hostname
    ///
    /// Fails with `Error::HostNotFound` if the hostname has no entry.
    pub async fn lookup(&self, hostname: &str) -> Result<Vec<DnsRecord>> {
        self.store.get_by_host(hostname).await
    }

    /// Store `ips` for `hostname`
    ///
    /// With `append`, the existing records (if any) come first. The combined
    /// list is deduplicated by IP, keeping the first occurrence. The config
    /// file is not touched; see [`SyncEngine::set_and_flush()`].
    ///
    /// # Returns
    ///
    /// The records now stored for `hostname`
    pub async fn set<I, S>(&self, hostname: &str, ips: I, append: bool) -> Result<Vec<DnsRecord>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ips: Vec<String> = ips.into_iter().map(Into::into).collect();
        validate_set_input(hostname, &ips)?;

        self.store_records(hostname, ips, append).await
    }

    /// Remove every record for `hostname`
    ///
    /// Succeeds whether or not the hostname had an entry.
    pub async fn delete_host(&self, hostname: &str) -> Result<()> {
        self.store.delete(hostname).await?;

        debug!("Deleted host {}", hostname);
        self.emit_event(SyncEvent::HostDeleted {
            hostname: hostname.to_string(),
        });
        Ok(())
    }

    /// Write the whole store to the config file, then reload dnsmasq
    ///
    /// # Errors
    ///
    /// - `Error::StoreUnavailable`: the store could not be read; nothing written
    /// - `Error::ConfigWrite`: the file could not be written; no reload attempted
    /// - `Error::ReloadFailed`: the file was written but the reload failed
    pub async fn flush(&self) -> Result<()> {
        let records = self.store.get_all().await?;
        let text = codec::render(&records);

        let temp_path = hidden_temp_path(&self.dnsmasq_config);
        write_atomic(
            &self.dnsmasq_config,
            &temp_path,
            text.as_bytes(),
            DNSMASQ_FILE_MODE,
        )
        .await
        .map_err(|source| Error::ConfigWrite {
            path: self.dnsmasq_config.clone(),
            source,
        })?;

        let hosts = count_hosts(&records);
        self.metrics.set_hostname_total(hosts as u64);
        self.metrics.set_ip_total(records.len() as u64);

        debug!(
            "Wrote {}: {} host(s), {} IP entr(ies)",
            self.dnsmasq_config.display(),
            hosts,
            records.len()
        );
        self.emit_event(SyncEvent::Flushed {
            hosts,
            ips: records.len(),
        });

        if self.skip_reload {
            debug!("Reload disabled, not reloading dnsmasq");
            self.emit_event(SyncEvent::ReloadSkipped);
            return Ok(());
        }

        self.reload().await
    }

    /// [`SyncEngine::set()`] followed by [`SyncEngine::flush()`]
    ///
    /// A reload failure does not fail the call; it is reported in
    /// [`Published::reload_error`].
    pub async fn set_and_flush<I, S>(
        &self,
        hostname: &str,
        ips: I,
        append: bool,
    ) -> Result<Published<Vec<DnsRecord>>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let records = self.set(hostname, ips, append).await?;
        self.publish(records).await
    }

    /// [`SyncEngine::delete_host()`] followed by [`SyncEngine::flush()`]
    ///
    /// A reload failure does not fail the call; it is reported in
    /// [`Published::reload_error`].
    pub async fn delete_and_flush(&self, hostname: &str) -> Result<Published<()>> {
        self.delete_host(hostname).await?;
        self.publish(()).await
    }

    /// Close the record store
    ///
    /// Operations after `close` fail with `Error::StoreUnavailable`.
    pub async fn close(&self) -> Result<()> {
        self.store.close().await?;

        info!("Record store closed");
        self.emit_event(SyncEvent::Closed);
        Ok(())
    }

    /// Read-modify-write behind `set`
    async fn store_records(
        &self,
        hostname: &str,
        ips: Vec<String>,
        append: bool,
    ) -> Result<Vec<DnsRecord>> {
        let _guard = self.set_lock.lock().await;

        let mut records = if append {
            match self.store.get_by_host(hostname).await {
                Ok(existing) => existing,
                Err(Error::HostNotFound(_)) => Vec::new(),
                Err(e) => return Err(e),
            }
        } else {
            Vec::new()
        };
        records.extend(ips.into_iter().map(|ip| DnsRecord::new(hostname, ip)));

        let records = dedup_by_ip(records);
        self.store.put(hostname, &records).await?;

        debug!("Stored {} record(s) for {}", records.len(), hostname);
        self.emit_event(SyncEvent::RecordsSet {
            hostname: hostname.to_string(),
            records: records.len(),
            appended: append,
        });

        Ok(records)
    }

    /// Run the reloader once, counting the attempt
    async fn reload(&self) -> Result<()> {
        self.metrics.inc_reloads();

        match self.reloader.reload().await {
            Ok(()) => {
                self.emit_event(SyncEvent::ReloadSucceeded);
                Ok(())
            }
            Err(e) => {
                let e = match e {
                    Error::ReloadFailed(_) => e,
                    other => Error::reload_failed(other.to_string()),
                };
                warn!(
                    "Config written to {} but {} reload failed: {}",
                    self.dnsmasq_config.display(),
                    self.reloader.reloader_name(),
                    e
                );
                self.emit_event(SyncEvent::ReloadFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn publish<T>(&self, value: T) -> Result<Published<T>> {
        match self.flush().await {
            Ok(()) => Ok(Published {
                value,
                reload_error: None,
            }),
            Err(e @ Error::ReloadFailed(_)) => Ok(Published {
                value,
                reload_error: Some(e),
            }),
            Err(e) => Err(e),
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: SyncEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

/// Keep the first record for each IP, in order
fn dedup_by_ip(records: Vec<DnsRecord>) -> Vec<DnsRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.ip.clone()))
        .collect()
}

/// Number of distinct hostnames in `records`
fn count_hosts(records: &[DnsRecord]) -> usize {
    records
        .iter()
        .map(|record| record.hostname.as_str())
        .collect::<HashSet<_>>()
        .len()
}

/// Reject values that cannot be stored or written back as `address=` lines
fn validate_set_input(hostname: &str, ips: &[String]) -> Result<()> {
    validate_field("hostname", hostname)?;

    if ips.is_empty() {
        return Err(Error::invalid_input("IP address list is required"));
    }
    for ip in ips {
        validate_field("IP address", ip)?;
    }

    Ok(())
}

fn validate_field(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_input(format!("{} cannot be empty", what)));
    }
    if value.contains('/') || value.chars().any(char::is_whitespace) {
        return Err(Error::invalid_input(format!(
            "{} '{}' cannot contain '/' or whitespace",
            what, value
        )));
    }
    Ok(())
}
