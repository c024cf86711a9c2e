// src/store/mod.rs
pub mod archive;
pub mod blob;
pub mod warehouse;

use anyhow::Result;

use crate::extract::ExchangeRateRecord;

/// Durable home for raw bulletin bytes.
pub trait BlobStore {
    /// Store `bytes` under `key`, returning the object's location.
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String>;
}

/// Append-only table of extracted records. Never updates or dedupes.
pub trait Warehouse {
    /// Append `records`, returning how many rows were written.
    fn append(&self, records: &[ExchangeRateRecord]) -> Result<usize>;
}

pub use archive::Archive;
pub use blob::LocalBlobStore;
pub use warehouse::ParquetWarehouse;
