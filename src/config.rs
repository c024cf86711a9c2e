// src/config.rs
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{fs, path::Path, path::PathBuf, time::Duration};
use url::Url;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// The single currency pulled out of each bulletin.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetCurrency {
    pub iso_code: String,
    pub display_name: String,
}

impl Default for TargetCurrency {
    fn default() -> Self {
        Self {
            iso_code: "CNY".into(),
            display_name: "人民元".into(),
        }
    }
}

/// Where raw bulletins and records end up.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Local directory the blob store and warehouse live under.
    pub root: PathBuf,
    pub bucket: String,
    pub raw_prefix: String,
    pub dataset: String,
    pub table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            bucket: "customs-exchange-rate".into(),
            raw_prefix: "raw_customs_csv".into(),
            dataset: "etc".into(),
            table: "weekly-custom-exchange-rates".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index_url: Url,
    pub csv_base_url: Url,
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Pause between consecutive bulletin downloads in a batch.
    pub request_delay_ms: u64,
    pub archive_dir: PathBuf,
    pub target: TargetCurrency,
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url: Url::parse("https://www.customs.go.jp/tetsuzuki/kawase/index.htm")
                .expect("default index url is valid"),
            csv_base_url: Url::parse("https://www.customs.go.jp/tetsuzuki/kawase/csv")
                .expect("default csv base url is valid"),
            user_agent: DEFAULT_USER_AGENT.into(),
            timeout_secs: 30,
            request_delay_ms: 300,
            archive_dir: PathBuf::from("downloaded_csv"),
            target: TargetCurrency::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, overlaid with the JSON file at `path` when one is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let cfg = match path {
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config {}", p.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("parsing config {}", p.display()))?
            }
            None => Config::default(),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be greater than zero");
        }
        let iso = &self.target.iso_code;
        if iso.len() != 3 || !iso.chars().all(|c| c.is_ascii_uppercase()) {
            bail!("target iso_code {:?} is not a 3-letter code", iso);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}
