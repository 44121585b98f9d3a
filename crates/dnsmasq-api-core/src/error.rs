//! Error types for the dnsmasq sync core
//!
//! Every fallible operation in the crate returns [`Result`]. Variants are
//! chosen so that a transport layer can tell "absent key" apart from every
//! other failure, and so that a reload failure after a successful write can
//! be reported as a partial success.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the dnsmasq sync system
#[derive(Error, Debug)]
pub enum Error {
    /// The record store cannot be read or written (I/O failure, corrupt data,
    /// or the handle has been closed)
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// No entry exists for the requested hostname
    #[error("No records found for host: {0}")]
    HostNotFound(String),

    /// The dnsmasq config file could not be read
    #[error("Failed to read dnsmasq config {}: {source}", path.display())]
    ConfigRead {
        /// Path of the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The rendered dnsmasq config could not be persisted
    #[error("Failed to write dnsmasq config {}: {source}", path.display())]
    ConfigWrite {
        /// Path of the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The forwarder reload did not complete successfully
    ///
    /// When returned from a flush, the config file on disk is already
    /// correct; only the running forwarder may be stale.
    #[error("dnsmasq reload failed: {0}")]
    ReloadFailed(String),

    /// Invalid input (hostname or IP list)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Settings errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Transport-independent classification of an [`Error`]
///
/// A façade maps these onto its own status codes (for HTTP: 404, 400, 503,
/// 200-with-warning and 500 respectively).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The requested hostname has no entry
    NotFound,
    /// The caller supplied something that can never succeed
    InvalidInput,
    /// The record store could not be reached
    Unavailable,
    /// The config file was written but the forwarder was not reloaded
    PartialSuccess,
    /// Anything else
    Internal,
}

impl Error {
    /// Create a store-unavailable error
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Create a host-not-found error
    pub fn host_not_found(hostname: impl Into<String>) -> Self {
        Self::HostNotFound(hostname.into())
    }

    /// Create a reload failure
    pub fn reload_failed(msg: impl Into<String>) -> Self {
        Self::ReloadFailed(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify this error for a transport layer
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::HostNotFound(_) => ErrorKind::NotFound,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::StoreUnavailable(_) => ErrorKind::Unavailable,
            Error::ReloadFailed(_) => ErrorKind::PartialSuccess,
            Error::ConfigRead { .. }
            | Error::ConfigWrite { .. }
            | Error::Config(_) => ErrorKind::Internal,
        }
    }

    /// Whether this error means "no entry for that hostname"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::HostNotFound(_))
    }
}
