use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use kawasescraper::{
    config::Config,
    fetch::HttpFetcher,
    pipeline::{run_batch, run_latest, Sinks},
    store::{Archive, LocalBlobStore, ParquetWarehouse},
};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

/// Weekly customs exchange-rate scraper.
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// JSON config file; built-in defaults otherwise
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Overrides `archive_dir`
    #[arg(long, global = true)]
    archive_dir: Option<PathBuf>,

    /// Overrides `storage.root`
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every weekly bulletin in a date range into the archive
    Batch {
        /// First day to cover (YYYY-MM-DD)
        #[arg(long, default_value = "2023-01-01")]
        from: NaiveDate,

        /// Last day to cover (YYYY-MM-DD), today if omitted
        #[arg(long)]
        to: Option<NaiveDate>,

        /// Only archive; skip blob storage and warehouse loading
        #[arg(long)]
        archive_only: bool,
    },
    /// Load the newest bulletin listed on the portal index page
    Latest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(dir) = args.archive_dir {
        cfg.archive_dir = dir;
    }
    if let Some(root) = args.storage_root {
        cfg.storage.root = root;
    }
    info!(index = %cfg.index_url, target = %cfg.target.iso_code, "startup");

    let fetcher = HttpFetcher::new(&cfg)?;
    let blob = LocalBlobStore::from_config(&cfg.storage)?;
    let warehouse = ParquetWarehouse::from_config(&cfg.storage)?;
    let sinks = Sinks {
        blob: &blob,
        warehouse: &warehouse,
    };

    match args.command {
        Command::Batch {
            from,
            to,
            archive_only,
        } => {
            let to = to.unwrap_or_else(|| Local::now().date_naive());
            let archive = Archive::new(&cfg.archive_dir)?;
            let sinks = (!archive_only).then_some(&sinks);
            let summary = run_batch(&cfg, &fetcher, &archive, sinks, from, to).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("serializing summary")?
            );
        }
        Command::Latest => match run_latest(&cfg, &fetcher, &sinks).await {
            Ok(outcome) => {
                info!("{}", outcome.message());
                println!(
                    "{}",
                    serde_json::to_string_pretty(&outcome).context("serializing outcome")?
                );
            }
            Err(e) => {
                error!("latest run failed: {:#}", e);
                return Err(e);
            }
        },
    }

    Ok(())
}
