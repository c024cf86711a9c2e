// src/store/archive.rs
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::fetch::bulletin::RawBulletin;

pub const MANIFEST_FILE: &str = "downloaded_files.txt";

/// Local directory of downloaded bulletins, keyed by filename.
pub struct Archive {
    dir: PathBuf,
}

impl Archive {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("creating archive directory {:?}", &dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.dir.join(filename).is_file()
    }

    pub fn save(&self, raw: &RawBulletin) -> Result<PathBuf> {
        let path = self.dir.join(&raw.filename);
        let tmp = self.dir.join(format!("{}.tmp", raw.filename));
        fs::write(&tmp, &raw.bytes).with_context(|| format!("writing {:?}", &tmp))?;
        fs::rename(&tmp, &path).with_context(|| format!("renaming into {:?}", &path))?;
        Ok(path)
    }

    /// Every archived bulletin filename, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let pattern = format!("{}/*.csv", self.dir.display());
        let mut names: Vec<String> = glob(&pattern)?
            .filter_map(Result::ok)
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Regenerate the manifest from the directory contents.
    pub fn write_manifest(&self) -> Result<PathBuf> {
        let names = self.list()?;
        let path = self.dir.join(MANIFEST_FILE);
        let mut file =
            fs::File::create(&path).with_context(|| format!("creating manifest {:?}", &path))?;
        for name in &names {
            writeln!(file, "{}", name)?;
        }
        info!(manifest = %path.display(), files = names.len(), "wrote manifest");
        Ok(path)
    }
}
