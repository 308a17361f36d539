// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer talks to these traits rather than to
// the concrete loaders and inferencers, so a folder-based
// source could be swapped for a manifest file or an in-memory
// fixture without touching the use cases.

use anyhow::Result;

use crate::domain::{labels::ClassLabels, prediction::Prediction, sample::ImageSample};

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Anything that can enumerate labelled image samples.
///
/// Implementations:
///   - ImageFolder → one sub-directory per class
pub trait SampleSource {
    /// The class list this source assigns labels from.
    fn classes(&self) -> Result<ClassLabels>;

    /// Every sample, labelled against `classes()`.
    fn load_all(&self) -> Result<Vec<ImageSample>>;
}

// ─── ImageClassifier ──────────────────────────────────────────────────────────
/// Anything that can classify an encoded image file.
pub trait ImageClassifier {
    fn classify(&self, path: &std::path::Path) -> Result<Prediction>;
}
