// # File Record Store
//
// File-backed implementation of RecordStore with crash recovery.
//
// ## Purpose
//
// Keeps the hostname → records mapping durable across daemon restarts.
// The whole store lives in memory behind an RwLock; every mutation is
// persisted before it becomes visible.
//
// ## Transactions
//
// - Writers take the write lock, build the next state on a copy,
//   persist it, then swap it in. A failed persist leaves the old state
//   in place, so readers never observe an entry that is not on disk.
// - Readers take the read lock and always see a committed state.
//
// ## Crash Recovery
//
// - Atomic writes: write-then-rename
// - Automatic backup: keeps `<path>.backup` of the last good file
// - Recovery: falls back to the backup if the main file is corrupt;
//   with no usable backup, opening fails instead of discarding the file
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "updated_at": "2026-01-01T12:00:00Z",
//   "buckets": {
//     "dnsRecords": {
//       "nas.lan": [{ "hostname": "nas.lan", "ip": "10.0.0.5" }]
//     }
//   }
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use crate::Error;
use crate::atomic_file::{with_suffix, write_atomic};
use crate::traits::record_store::{DnsRecord, RecordStore};

/// Store file format version
const STORE_FILE_VERSION: &str = "1.0";

/// Permissions of the persistence file
const DB_FILE_MODE: u32 = 0o600;

type Bucket = BTreeMap<String, Vec<DnsRecord>>;

/// File-based record store
///
/// Records are kept in a named bucket inside the persistence file; other
/// buckets in the same file are preserved untouched.
///
/// # Example
///
/// ```rust,no_run
/// use dnsmasq_api_core::store::FileRecordStore;
/// use dnsmasq_api_core::{DnsRecord, RecordStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileRecordStore::open("/var/lib/dnsmasq-api/dns.db", "dnsRecords").await?;
///
///     store.put("nas.lan", &[DnsRecord::new("nas.lan", "10.0.0.5")]).await?;
///     assert_eq!(store.get_by_host("nas.lan").await?.len(), 1);
///
///     store.close().await?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileRecordStore {
    path: PathBuf,
    bucket: String,
    state: RwLock<FileState>,
}

#[derive(Debug)]
struct FileState {
    buckets: BTreeMap<String, Bucket>,
    closed: bool,
}

impl FileState {
    fn ensure_open(&self) -> Result<(), Error> {
        if self.closed {
            return Err(Error::store_unavailable("record store is closed"));
        }
        Ok(())
    }
}

/// Serializable store file format
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct StoreFileFormat {
    version: String,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    buckets: BTreeMap<String, Bucket>,
}

/// Why a store file could not be loaded
#[derive(Debug)]
enum LoadError {
    /// File exists but cannot be read
    Io(std::io::Error),
    /// File was read but does not parse
    Corrupt(serde_json::Error),
}

impl FileRecordStore {
    /// Open (or create) the store file and select `bucket`
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Load the existing file, falling back to the backup if corrupt
    /// 3. Create the bucket (and the file) if it does not exist yet
    pub async fn open(path: impl AsRef<Path>, bucket: impl Into<String>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let bucket = bucket.into();

        if bucket.is_empty() {
            return Err(Error::config("Store bucket name cannot be empty"));
        }

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to create store directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let existed = path.exists();
        let mut buckets = Self::load_with_recovery(&path).await?;
        let needs_write = !existed || !buckets.contains_key(&bucket);
        buckets.entry(bucket.clone()).or_default();

        let store = Self {
            path,
            bucket,
            state: RwLock::new(FileState {
                buckets,
                closed: false,
            }),
        };

        if needs_write {
            let guard = store.state.read().await;
            store.persist(&guard.buckets).await?;
        }

        debug!(
            "Opened record store {} (bucket {})",
            store.path.display(),
            store.bucket
        );
        Ok(store)
    }

    /// Path of the persistence file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the bucket this handle reads and writes
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Load the store file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try the main file
    /// 2. If it does not parse, try the backup (and restore it)
    /// 3. If the backup is missing or also corrupt, fail with
    ///    `StoreUnavailable` and leave both files for the operator
    async fn load_with_recovery(path: &Path) -> Result<BTreeMap<String, Bucket>, Error> {
        let err = match Self::load(path).await {
            Ok(buckets) => return Ok(buckets),
            Err(LoadError::Io(e)) => {
                return Err(Error::store_unavailable(format!(
                    "Failed to read store file {}: {}",
                    path.display(),
                    e
                )));
            }
            Err(LoadError::Corrupt(e)) => e,
        };

        warn!(
            "Store file {} appears corrupted: {}. Attempting recovery from backup.",
            path.display(),
            err
        );

        let backup_path = with_suffix(path, ".backup");
        if !backup_path.exists() {
            error!("Store file {} is corrupt and has no backup", path.display());
            return Err(Error::store_unavailable(format!(
                "Store file {} is corrupt ({}) and no backup exists",
                path.display(),
                err
            )));
        }

        match Self::load(&backup_path).await {
            Ok(buckets) => {
                info!("Recovered store from backup: {} bucket(s)", buckets.len());
                if let Err(e) = fs::copy(&backup_path, path).await {
                    error!("Failed to restore store file from backup: {}", e);
                }
                Ok(buckets)
            }
            Err(backup_err) => {
                error!("Backup {} also unusable: {:?}", backup_path.display(), backup_err);
                Err(Error::store_unavailable(format!(
                    "Store file {} and its backup are both unreadable",
                    path.display()
                )))
            }
        }
    }

    /// Load a store file; a missing file is an empty store
    async fn load(path: &Path) -> Result<BTreeMap<String, Bucket>, LoadError> {
        if !path.exists() {
            debug!("Store file does not exist: {}", path.display());
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(LoadError::Io)?;
        let file: StoreFileFormat = serde_json::from_str(&content).map_err(LoadError::Corrupt)?;

        if file.version != STORE_FILE_VERSION {
            warn!(
                "Store file version mismatch: expected {}, got {}. Attempting to load anyway.",
                STORE_FILE_VERSION, file.version
            );
        }

        Ok(file.buckets)
    }

    /// Write `buckets` to disk atomically, keeping a backup of the previous file
    async fn persist(&self, buckets: &BTreeMap<String, Bucket>) -> Result<(), Error> {
        let file = StoreFileFormat {
            version: STORE_FILE_VERSION.to_string(),
            updated_at: Utc::now(),
            buckets: buckets.clone(),
        };

        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| Error::store_unavailable(format!("Failed to serialize store: {}", e)))?;

        if self.path.exists() {
            let backup_path = with_suffix(&self.path, ".backup");
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                warn!("Failed to create store backup: {}", e);
            }
        }

        let temp_path = with_suffix(&self.path, ".tmp");
        write_atomic(&self.path, &temp_path, &json, DB_FILE_MODE)
            .await
            .map_err(|e| {
                Error::store_unavailable(format!(
                    "Failed to write store file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        trace!("Store written to file: {}", self.path.display());
        Ok(())
    }

    /// Apply `mutate` to this handle's bucket as one transaction
    async fn commit<F>(&self, mutate: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Bucket),
    {
        let mut guard = self.state.write().await;
        guard.ensure_open()?;

        let mut next = guard.buckets.clone();
        mutate(next.entry(self.bucket.clone()).or_default());

        self.persist(&next).await?;
        guard.buckets = next;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for FileRecordStore {
    async fn get_all(&self) -> Result<Vec<DnsRecord>, Error> {
        let guard = self.state.read().await;
        guard.ensure_open()?;
        Ok(guard
            .buckets
            .get(&self.bucket)
            .map(|bucket| bucket.values().flatten().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_host(&self, hostname: &str) -> Result<Vec<DnsRecord>, Error> {
        let guard = self.state.read().await;
        guard.ensure_open()?;
        guard
            .buckets
            .get(&self.bucket)
            .and_then(|bucket| bucket.get(hostname))
            .cloned()
            .ok_or_else(|| Error::host_not_found(hostname))
    }

    async fn put(&self, hostname: &str, records: &[DnsRecord]) -> Result<(), Error> {
        self.commit(|bucket| {
            bucket.insert(hostname.to_string(), records.to_vec());
        })
        .await
    }

    async fn delete(&self, hostname: &str) -> Result<(), Error> {
        {
            let guard = self.state.read().await;
            guard.ensure_open()?;
            let present = guard
                .buckets
                .get(&self.bucket)
                .is_some_and(|bucket| bucket.contains_key(hostname));
            if !present {
                return Ok(());
            }
        }

        self.commit(|bucket| {
            bucket.remove(hostname);
        })
        .await
    }

    async fn clear(&self) -> Result<(), Error> {
        self.commit(|bucket| bucket.clear()).await
    }

    async fn replace_all(&self, entries: Bucket) -> Result<(), Error> {
        self.commit(|bucket| *bucket = entries).await
    }

    async fn close(&self) -> Result<(), Error> {
        let mut guard = self.state.write().await;
        if !guard.closed {
            guard.closed = true;
            debug!("Closed record store {}", self.path.display());
        }
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}
