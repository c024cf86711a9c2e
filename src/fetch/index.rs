// src/fetch/index.rs
use scraper::{Html, Selector};
use tracing::{debug, instrument, trace};
use url::Url;

use super::Fetch;
use crate::error::FetchError;

/// A bulletin link lives under a `csv` directory and names a `.csv` file.
fn is_bulletin_link(url: &Url) -> bool {
    let in_csv_dir = url
        .path_segments()
        .map(|mut segs| segs.any(|s| s == "csv"))
        .unwrap_or(false);
    in_csv_dir && url.path().ends_with(".csv")
}

/// Find the newest bulletin on the portal index page. The portal lists the
/// newest bulletin first, so the first matching anchor wins.
pub fn locate_latest(index_html: &[u8], page_url: &Url) -> Result<Url, FetchError> {
    let html = String::from_utf8_lossy(index_html);
    let selector = Selector::parse("a[href]").expect("CSS selector for links should be valid");

    Html::parse_document(&html)
        .select(&selector)
        .filter_map(|e| e.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .inspect(|u| trace!(url = %u, "candidate link"))
        .find(is_bulletin_link)
        .ok_or_else(|| FetchError::NotFound(format!("no bulletin link on {}", page_url)))
}

/// Download the index page and locate the newest bulletin on it.
#[instrument(level = "info", skip(fetcher), fields(index = %index_url))]
pub async fn fetch_latest_url<F: Fetch + ?Sized>(
    fetcher: &F,
    index_url: &Url,
) -> Result<Url, FetchError> {
    let body = fetcher.get_bytes(index_url).await?;
    let url = locate_latest(&body, index_url)?;
    debug!(%url, "latest bulletin");
    Ok(url)
}
