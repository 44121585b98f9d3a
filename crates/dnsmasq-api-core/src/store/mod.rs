// # Record Store Implementations
//
// This module provides implementations of the RecordStore trait for
// different persistence strategies, plus construction from StoreConfig.

pub mod file;
pub mod memory;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;

use crate::config::StoreConfig;
use crate::error::Result;
use crate::traits::RecordStore;

/// Open the record store described by `config`
pub async fn open_store(config: &StoreConfig) -> Result<Box<dyn RecordStore>> {
    config.validate()?;

    match config {
        StoreConfig::File { path, bucket } => {
            Ok(Box::new(FileRecordStore::open(path, bucket.as_str()).await?))
        }
        StoreConfig::Memory => Ok(Box::new(MemoryRecordStore::new())),
    }
}
