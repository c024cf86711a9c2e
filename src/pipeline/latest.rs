// src/pipeline/latest.rs
use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, instrument};
use url::Url;

use super::{load_bulletin, LoadOutcome, Sinks};
use crate::config::Config;
use crate::extract::ExchangeRateRecord;
use crate::fetch::{bulletin::download, index::fetch_latest_url, Fetch};

/// Result of one successful latest-bulletin run.
#[derive(Debug, Clone, Serialize)]
pub struct LatestOutcome {
    pub url: Url,
    pub record: ExchangeRateRecord,
}

impl LatestOutcome {
    pub fn message(&self) -> String {
        format!(
            "Success: Loaded {} rate {} for {} from {}",
            self.record.iso_code,
            self.record.rate.normalize(),
            self.record.start_date,
            self.record.source_file
        )
    }
}

/// Find the newest bulletin on the index page, store it, and load its rate.
/// Any failure is returned with an explanation; nothing is retried.
#[instrument(level = "info", skip(cfg, fetcher, sinks), fields(index = %cfg.index_url))]
pub async fn run_latest<F: Fetch + ?Sized>(
    cfg: &Config,
    fetcher: &F,
    sinks: &Sinks<'_>,
) -> Result<LatestOutcome> {
    let url = fetch_latest_url(fetcher, &cfg.index_url)
        .await
        .context("locating latest bulletin")?;
    info!(%url, "target bulletin");

    let raw = download(fetcher, &url)
        .await
        .with_context(|| format!("downloading {}", url))?;

    let record = match load_bulletin(cfg, sinks, &raw)? {
        LoadOutcome::Loaded(record) => record,
        LoadOutcome::Rejected(e) => {
            return Err(anyhow::Error::new(e).context(format!(
                "extracting {} rate from {}",
                cfg.target.iso_code, raw.filename
            )))
        }
    };

    Ok(LatestOutcome { url, record })
}
