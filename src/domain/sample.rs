// ============================================================
// Layer 3 — Image Sample
// ============================================================
// One labelled image on disk. Pixels are not held here; they are
// decoded lazily by the dataset so that only the current batch
// lives in memory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the encoded image file
    pub path: PathBuf,

    /// Index into the dataset's ClassLabels
    pub label: usize,
}

impl ImageSample {
    pub fn new(path: impl Into<PathBuf>, label: usize) -> Self {
        Self {
            path: path.into(),
            label,
        }
    }
}
