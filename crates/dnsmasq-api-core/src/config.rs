//! Configuration types for the dnsmasq sync core
//!
//! This module defines the settings value handed to [`crate::SyncEngine`]
//! at construction time.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default persistence file for the file-backed record store
pub const DEFAULT_DB_FILE_PATH: &str = "dns.db";

/// Default bucket holding DNS records inside the persistence file
pub const DEFAULT_DB_BUCKET_NAME: &str = "dnsRecords";

/// Main sync engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Path of the dnsmasq config file managed by the engine
    pub dnsmasq_config: PathBuf,

    /// Skip the forwarder reload after writing the config file
    #[serde(default)]
    pub skip_reload: bool,

    /// Record store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Reload command configuration
    #[serde(default)]
    pub reload: ReloadConfig,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SyncSettings {
    /// Create settings for the given dnsmasq config file with defaults
    pub fn new(dnsmasq_config: impl Into<PathBuf>) -> Self {
        Self {
            dnsmasq_config: dnsmasq_config.into(),
            skip_reload: false,
            store: StoreConfig::default(),
            reload: ReloadConfig::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Skip or perform the reload after each flush
    pub fn with_skip_reload(mut self, skip_reload: bool) -> Self {
        self.skip_reload = skip_reload;
        self
    }

    /// Use the given store configuration
    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    /// Use the given reload configuration
    pub fn with_reload(mut self, reload: ReloadConfig) -> Self {
        self.reload = reload;
        self
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.dnsmasq_config.as_os_str().is_empty() {
            return Err(crate::Error::config("dnsmasq config path cannot be empty"));
        }

        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        self.store.validate()?;

        // The reload command is never run when reloading is disabled
        if !self.skip_reload {
            self.reload.validate()?;
        }

        Ok(())
    }
}

/// Record store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-backed store
    File {
        /// Path to the persistence file
        #[serde(default = "default_db_file_path")]
        path: PathBuf,
        /// Bucket holding the records
        #[serde(default = "default_db_bucket_name")]
        bucket: String,
    },

    /// In-memory store (not persistent)
    Memory,
}

impl StoreConfig {
    /// File-backed store at `path` using the default bucket
    pub fn file(path: impl Into<PathBuf>) -> Self {
        StoreConfig::File {
            path: path.into(),
            bucket: default_db_bucket_name(),
        }
    }

    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path, bucket } => {
                if path.as_os_str().is_empty() {
                    return Err(crate::Error::config("Store file path cannot be empty"));
                }
                if bucket.is_empty() {
                    return Err(crate::Error::config("Store bucket name cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: default_db_file_path(),
            bucket: default_db_bucket_name(),
        }
    }
}

/// Reload command configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadConfig {
    /// Program and arguments run to reload the forwarder
    #[serde(default = "default_reload_command")]
    pub command: Vec<String>,

    /// Optional upper bound on the reload command's run time (in seconds)
    ///
    /// Unset means the reload may block its caller indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ReloadConfig {
    /// Validate the reload configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self.command.first() {
            Some(program) if !program.is_empty() => {}
            _ => return Err(crate::Error::config("Reload command cannot be empty")),
        }

        if self.timeout_secs == Some(0) {
            return Err(crate::Error::config("Reload timeout must be > 0"));
        }

        Ok(())
    }
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            command: default_reload_command(),
            timeout_secs: None,
        }
    }
}

fn default_db_file_path() -> PathBuf {
    PathBuf::from(DEFAULT_DB_FILE_PATH)
}

fn default_db_bucket_name() -> String {
    DEFAULT_DB_BUCKET_NAME.to_string()
}

fn default_reload_command() -> Vec<String> {
    ["sudo", "systemctl", "reload", "dnsmasq"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_event_channel_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = SyncSettings::new("/etc/dnsmasq.d/api.conf");

        assert!(!settings.skip_reload);
        assert_eq!(
            settings.store,
            StoreConfig::File {
                path: PathBuf::from("dns.db"),
                bucket: "dnsRecords".to_string(),
            }
        );
        assert_eq!(
            settings.reload.command,
            vec!["sudo", "systemctl", "reload", "dnsmasq"]
        );
        assert_eq!(settings.reload.timeout_secs, None);
        assert!(settings.validate().is_ok());
        assert_eq!(settings.store.type_name(), "file");
        assert_eq!(StoreConfig::Memory.type_name(), "memory");
    }

    #[test]
    fn test_deserialize_partial() {
        let settings: SyncSettings = serde_json::from_value(serde_json::json!({
            "dnsmasq_config": "/etc/dnsmasq.d/api.conf",
            "skip_reload": true,
            "store": { "type": "file", "path": "/var/lib/dnsmasq-api/dns.db" }
        }))
        .unwrap();

        assert!(settings.skip_reload);
        assert_eq!(
            settings.store,
            StoreConfig::File {
                path: PathBuf::from("/var/lib/dnsmasq-api/dns.db"),
                bucket: "dnsRecords".to_string(),
            }
        );
        assert_eq!(settings.event_channel_capacity, 100);
    }

    #[test]
    fn test_validation_errors() {
        assert!(SyncSettings::new("").validate().is_err());

        let empty_bucket = SyncSettings::new("api.conf").with_store(StoreConfig::File {
            path: PathBuf::from("dns.db"),
            bucket: String::new(),
        });
        assert!(empty_bucket.validate().is_err());

        let no_command = SyncSettings::new("api.conf").with_reload(ReloadConfig {
            command: Vec::new(),
            timeout_secs: None,
        });
        assert!(no_command.validate().is_err());

        // Reload command is irrelevant when reloading is skipped
        let skipped = no_command.with_skip_reload(true);
        assert!(skipped.validate().is_ok());

        let zero_timeout = SyncSettings::new("api.conf").with_reload(ReloadConfig {
            timeout_secs: Some(0),
            ..ReloadConfig::default()
        });
        assert!(zero_timeout.validate().is_err());
    }
}
