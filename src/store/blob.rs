// src/store/blob.rs
use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use super::BlobStore;
use crate::config::StorageConfig;

/// Bucket laid out on the local filesystem as `<root>/<bucket>/<key>`.
pub struct LocalBlobStore {
    bucket_dir: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl AsRef<Path>, bucket: &str) -> Result<Self> {
        let bucket_dir = root.as_ref().join(bucket);
        fs::create_dir_all(&bucket_dir)
            .with_context(|| format!("creating bucket directory {:?}", &bucket_dir))?;
        Ok(Self { bucket_dir })
    }

    pub fn from_config(cfg: &StorageConfig) -> Result<Self> {
        Self::new(&cfg.root, &cfg.bucket)
    }
}

impl BlobStore for LocalBlobStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<String> {
        let path = self.bucket_dir.join(key.trim_start_matches('/'));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).with_context(|| format!("writing blob {:?}", &tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("committing blob {:?}", &path))?;
        info!(object = %path.display(), bytes = bytes.len(), "stored blob");
        Ok(path.display().to_string())
    }
}

/// Object key for a raw bulletin: `<prefix>/<filename>`.
pub fn raw_key(prefix: &str, filename: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", prefix, filename)
    }
}
