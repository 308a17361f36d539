// ============================================================
// Layer 4 — Dataset Downloader
// ============================================================
// Makes sure the image dataset is present on disk.
//
// The default dataset is the "hymenoptera" subset of ImageNet:
// roughly 120 training and 75 validation images for each of
// two classes (ants, bees), laid out as
//
//   hymenoptera_data/
//     train/ants/*.jpg   train/bees/*.jpg
//     val/ants/*.jpg     val/bees/*.jpg

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::infra::downloader::{download_file, extract_zip};

pub const HYMENOPTERA_URL: &str = "https://download.pytorch.org/tutorial/hymenoptera_data.zip";
pub const HYMENOPTERA_DIR: &str = "hymenoptera_data";

pub struct DatasetDownloader {
    url: String,
    root: PathBuf,
    extracted_dir: String,
}

impl DatasetDownloader {
    pub fn new(url: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            root: root.into(),
            extracted_dir: HYMENOPTERA_DIR.to_string(),
        }
    }

    /// Name of the directory the archive unpacks into.
    pub fn with_extracted_dir(mut self, name: impl Into<String>) -> Self {
        self.extracted_dir = name.into();
        self
    }

    /// Where the dataset lives once extracted.
    pub fn dataset_dir(&self) -> PathBuf {
        self.root.join(&self.extracted_dir)
    }

    pub fn is_present(&self) -> bool {
        self.dataset_dir().join("train").is_dir()
    }

    /// Download and extract the dataset if it is not already there.
    /// Returns the dataset directory.
    pub fn ensure(&self) -> Result<PathBuf> {
        let dataset_dir = self.dataset_dir();
        if self.is_present() {
            tracing::info!("Dataset already present at '{}'", dataset_dir.display());
            return Ok(dataset_dir);
        }

        fs::create_dir_all(&self.root)
            .with_context(|| format!("Cannot create '{}'", self.root.display()))?;

        let archive = self.root.join(format!("{}.zip", self.extracted_dir));
        download_file(&self.url, &archive)?;

        let files = extract_zip(&archive, &self.root)?;
        tracing::info!("Extracted {} files into '{}'", files, self.root.display());

        remove_archive(&archive);

        if !self.is_present() {
            anyhow::bail!(
                "Archive from '{}' did not contain '{}/train'",
                self.url,
                self.extracted_dir
            );
        }
        Ok(dataset_dir)
    }
}

fn remove_archive(archive: &Path) {
    if let Err(e) = fs::remove_file(archive) {
        tracing::warn!("Could not remove '{}': {}", archive.display(), e);
    }
}
