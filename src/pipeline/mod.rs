// src/pipeline/mod.rs
pub mod batch;
pub mod latest;

use anyhow::{Context, Result};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ExtractError;
use crate::extract::{extract_rate, DateSource, ExchangeRateRecord};
use crate::fetch::bulletin::RawBulletin;
use crate::store::{blob::raw_key, BlobStore, Warehouse};

pub use batch::{run_batch, BatchSummary};
pub use latest::{run_latest, LatestOutcome};

/// Where a fetched bulletin goes after download.
pub struct Sinks<'a> {
    pub blob: &'a dyn BlobStore,
    pub warehouse: &'a dyn Warehouse,
}

/// What became of one bulletin that reached the sinks.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The rate was extracted and appended to the warehouse.
    Loaded(ExchangeRateRecord),
    /// The raw bytes were stored but no record could be extracted.
    Rejected(ExtractError),
}

/// Store the raw bytes, extract the target rate and append it.
/// An `Err` is a sink fault (blob or warehouse I/O).
fn load_bulletin(cfg: &Config, sinks: &Sinks<'_>, raw: &RawBulletin) -> Result<LoadOutcome> {
    let key = raw_key(&cfg.storage.raw_prefix, &raw.filename);
    sinks
        .blob
        .put(&key, &raw.bytes)
        .with_context(|| format!("storing raw bulletin {}", raw.filename))?;

    let record = match extract_rate(&raw.bytes, &cfg.target, &raw.filename) {
        Ok(r) => r,
        Err(e) => {
            report_rejection(&raw.filename, &e);
            return Ok(LoadOutcome::Rejected(e));
        }
    };
    if record.date_source == DateSource::ProcessingDate {
        warn!(file = %raw.filename, "record dated by processing date, not by bulletin window");
    }

    sinks
        .warehouse
        .append(std::slice::from_ref(&record))
        .with_context(|| format!("appending record from {}", raw.filename))?;
    info!(file = %raw.filename, rate = %record.rate, start = %record.start_date, "loaded");
    Ok(LoadOutcome::Loaded(record))
}

fn report_rejection(filename: &str, err: &ExtractError) {
    if err.is_format_change() {
        error!(file = filename, error = %err, "bulletin format changed");
    } else {
        warn!(file = filename, error = %err, "bulletin rejected");
    }
}
