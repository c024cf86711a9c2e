// src/fetch/bulletin.rs
use tracing::{debug, instrument};
use url::Url;

use super::{file_name, Fetch};
use crate::error::FetchError;
use crate::window::BulletinId;

/// Bulletin bytes as published, with the filename they were published under.
#[derive(Debug, Clone)]
pub struct RawBulletin {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Download the bulletin at `url`.
#[instrument(level = "debug", skip(fetcher), fields(url = %url))]
pub async fn download<F: Fetch + ?Sized>(fetcher: &F, url: &Url) -> Result<RawBulletin, FetchError> {
    let filename = file_name(url).unwrap_or("bulletin.csv").to_string();
    let bytes = fetcher.get_bytes(url).await?;
    debug!(filename = %filename, size = bytes.len(), "downloaded");
    Ok(RawBulletin { filename, bytes })
}

/// Download the bulletin for `id` from its predictable location under
/// `csv_base`.
pub async fn download_window<F: Fetch + ?Sized>(
    fetcher: &F,
    csv_base: &Url,
    id: &BulletinId,
) -> Result<RawBulletin, FetchError> {
    let url = id.url(csv_base).map_err(|e| FetchError::Transport {
        url: format!("{}/{}", csv_base, id.filename()),
        message: e.to_string(),
    })?;
    let mut raw = download(fetcher, &url).await?;
    raw.filename = id.filename();
    Ok(raw)
}
