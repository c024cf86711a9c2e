// src/pipeline/batch.rs
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, instrument};

use super::{load_bulletin, LoadOutcome, Sinks};
use crate::config::Config;
use crate::error::FetchError;
use crate::fetch::{bulletin::download_window, Fetch};
use crate::store::Archive;
use crate::window::enumerate_weeks;

/// Per-run tallies. Per-bulletin failures land here instead of aborting.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub windows: usize,
    /// Fetched and archived this run.
    pub downloaded: usize,
    /// Already in the archive; not fetched again.
    pub skipped: usize,
    pub not_found: usize,
    /// Transport errors and sink faults; these windows stay unarchived.
    pub failed: usize,
    pub loaded: usize,
    pub rejected: usize,
}

impl BatchSummary {
    /// Bulletins present in the archive after the run.
    pub fn available(&self) -> usize {
        self.downloaded + self.skipped
    }
}

/// Archive every weekly bulletin between `start` and `end`, and when `sinks`
/// is given also store and load each newly downloaded one.
#[instrument(level = "info", skip(cfg, fetcher, archive, sinks), fields(archive = %archive.dir().display()))]
pub async fn run_batch<F: Fetch + ?Sized>(
    cfg: &Config,
    fetcher: &F,
    archive: &Archive,
    sinks: Option<&Sinks<'_>>,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BatchSummary> {
    let weeks = enumerate_weeks(start, end);
    let total = weeks.clone().count();
    info!(%start, %end, total, "batch start");

    let mut summary = BatchSummary {
        windows: total,
        ..Default::default()
    };

    for (i, window) in weeks.enumerate() {
        let id = window.id();
        let filename = id.filename();
        let progress = format!("{}/{}", i + 1, total);

        if archive.contains(&filename) {
            info!(%progress, file = %filename, "already archived, skipping");
            summary.skipped += 1;
            continue;
        }

        match download_window(fetcher, &cfg.csv_base_url, &id).await {
            Ok(raw) => {
                info!(%progress, file = %filename, bytes = raw.bytes.len(), "downloaded");

                // archived only once the sinks hold it, so a sink fault is retried next run
                let settled = match sinks {
                    None => true,
                    Some(sinks) => match load_bulletin(cfg, sinks, &raw) {
                        Ok(LoadOutcome::Loaded(_)) => {
                            summary.loaded += 1;
                            true
                        }
                        Ok(LoadOutcome::Rejected(_)) => {
                            summary.rejected += 1;
                            true
                        }
                        Err(e) => {
                            error!(%progress, file = %filename, "load failed: {:#}", e);
                            summary.failed += 1;
                            false
                        }
                    },
                };
                if settled {
                    archive.save(&raw)?;
                    summary.downloaded += 1;
                }
            }
            Err(FetchError::NotFound(_)) => {
                info!(%progress, file = %filename, "not published");
                summary.not_found += 1;
            }
            Err(e) => {
                error!(%progress, file = %filename, error = %e, "download failed");
                summary.failed += 1;
            }
        }

        if !cfg.request_delay().is_zero() {
            sleep(cfg.request_delay()).await;
        }
    }

    archive.write_manifest()?;
    info!(
        downloaded = summary.downloaded,
        skipped = summary.skipped,
        not_found = summary.not_found,
        failed = summary.failed,
        loaded = summary.loaded,
        rejected = summary.rejected,
        available = summary.available(),
        "batch done"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::bulletin;
    use crate::fetch::tests::StaticFetcher;
    use crate::extract::ExchangeRateRecord;
    use crate::store::{archive::MANIFEST_FILE, LocalBlobStore, ParquetWarehouse, Warehouse};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    const BASE: &str = "https://www.customs.go.jp/tetsuzuki/kawase/csv";

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn config() -> Config {
        Config {
            request_delay_ms: 0,
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn archives_counts_and_writes_manifest() -> Result<()> {
        crate::test_util::init_test_logging();
        let tmp = tempdir()?;
        let archive = Archive::new(tmp.path().join("csv"))?;
        fs::write(archive.dir().join("240107-240113.csv"), b"old")?;

        let mut fetcher = StaticFetcher::default()
            .with(&format!("{BASE}/231231-240106.csv"), bulletin("19.40", ""));
        fetcher.broken.push(format!("{BASE}/240121-240127.csv"));

        // 2024-01-02 .. 2024-01-27: four windows
        let summary =
            run_batch(&config(), &fetcher, &archive, None, d(2024, 1, 2), d(2024, 1, 27)).await?;

        assert_eq!(
            summary,
            BatchSummary {
                windows: 4,
                downloaded: 1,
                skipped: 1,
                not_found: 1,
                failed: 1,
                loaded: 0,
                rejected: 0,
            }
        );
        // the archived window is never requested
        assert!(!fetcher
            .requested()
            .iter()
            .any(|u| u.ends_with("240107-240113.csv")));
        assert_eq!(
            fs::read_to_string(archive.dir().join(MANIFEST_FILE))?,
            "231231-240106.csv\n240107-240113.csv\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn loads_new_bulletins_into_sinks() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config();
        let archive = Archive::new(tmp.path().join("csv"))?;
        let blob = LocalBlobStore::new(tmp.path(), &cfg.storage.bucket)?;
        let warehouse = ParquetWarehouse::new(tmp.path(), "etc", "rates")?;
        let sinks = Sinks {
            blob: &blob,
            warehouse: &warehouse,
        };

        let fetcher = StaticFetcher::default()
            .with(&format!("{BASE}/240107-240113.csv"), bulletin("19.50", ""))
            .with(&format!("{BASE}/240114-240120.csv"), b"garbage".to_vec());

        let summary = run_batch(
            &cfg,
            &fetcher,
            &archive,
            Some(&sinks),
            d(2024, 1, 7),
            d(2024, 1, 20),
        )
        .await?;
        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.loaded, 1);
        assert_eq!(summary.rejected, 1);

        let rows: usize = warehouse.scan()?.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 1);
        assert!(tmp
            .path()
            .join("customs-exchange-rate/raw_customs_csv/240114-240120.csv")
            .is_file());

        // second run finds both archived and loads nothing more
        let again = run_batch(
            &cfg,
            &fetcher,
            &archive,
            Some(&sinks),
            d(2024, 1, 7),
            d(2024, 1, 20),
        )
        .await?;
        assert_eq!(again.skipped, 2);
        assert_eq!(again.loaded, 0);
        Ok(())
    }

    /// Refuses the first `failures` appends, then writes through.
    struct FlakyWarehouse {
        inner: ParquetWarehouse,
        failures: AtomicUsize,
    }

    impl Warehouse for FlakyWarehouse {
        fn append(&self, records: &[ExchangeRateRecord]) -> Result<usize> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                anyhow::bail!("warehouse unavailable");
            }
            self.inner.append(records)
        }
    }

    #[tokio::test]
    async fn sink_fault_leaves_window_for_the_next_run() -> Result<()> {
        let tmp = tempdir()?;
        let cfg = config();
        let archive = Archive::new(tmp.path().join("csv"))?;
        let blob = LocalBlobStore::new(tmp.path(), &cfg.storage.bucket)?;
        let warehouse = FlakyWarehouse {
            inner: ParquetWarehouse::new(tmp.path(), "etc", "rates")?,
            failures: AtomicUsize::new(1),
        };
        let sinks = Sinks {
            blob: &blob,
            warehouse: &warehouse,
        };
        let fetcher = StaticFetcher::default()
            .with(&format!("{BASE}/240107-240113.csv"), bulletin("19.50", ""));

        let first = run_batch(
            &cfg,
            &fetcher,
            &archive,
            Some(&sinks),
            d(2024, 1, 7),
            d(2024, 1, 13),
        )
        .await?;
        assert_eq!(first.failed, 1);
        assert_eq!(first.loaded, 0);
        assert_eq!(first.downloaded, 0);
        assert!(!archive.contains("240107-240113.csv"));

        let second = run_batch(
            &cfg,
            &fetcher,
            &archive,
            Some(&sinks),
            d(2024, 1, 7),
            d(2024, 1, 13),
        )
        .await?;
        assert_eq!(second.skipped, 0);
        assert_eq!(second.loaded, 1);
        assert_eq!(second.downloaded, 1);
        assert!(archive.contains("240107-240113.csv"));

        let rows: usize = warehouse.inner.scan()?.iter().map(|b| b.num_rows()).sum();
        assert_eq!(rows, 1);
        Ok(())
    }
}
