// src/fetch/mod.rs
pub mod bulletin;
pub mod index;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::FetchError;

/// Anything that can GET a URL and hand back the body.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed fetcher with the portal-friendly User-Agent and timeout.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(cfg.timeout())
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        debug!(%url, "GET");
        let transport = |message: String| FetchError::Transport {
            url: url.to_string(),
            message,
        };

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(transport(format!("HTTP status {}", status)));
        }

        let bytes = resp.bytes().await.map_err(|e| transport(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

/// Last path segment of `url`, used as the bulletin's filename.
pub fn file_name(url: &Url) -> Option<&str> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
}
