// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per training epoch.
//
// Columns:
//   epoch,train_loss,valid_loss,valid_acc,lr,dur,checkpoint
//
// Missing validation values (no validation set) are written as
// empty cells so the file stays rectangular.
//
// Output file: checkpoints/metrics.csv

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::ml::history::EpochRecord;

const HEADER: &str = "epoch,train_loss,valid_loss,valid_acc,lr,dur,checkpoint";

/// Appends epoch metrics to a CSV file.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger writing to `{dir}/{file}`.
    /// The header is written only when the file does not exist yet,
    /// so repeated runs keep appending to the same log.
    pub fn new(dir: impl AsRef<Path>, file: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;

        let csv_path = dir.join(file);
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch as a new row.
    pub fn log(&self, r: &EpochRecord) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(f, "{}", format_row(r))?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}",
            r.epoch,
            r.train_loss
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

fn format_row(r: &EpochRecord) -> String {
    let opt = |v: Option<f64>| v.map(|v| format!("{v:.6}")).unwrap_or_default();
    format!(
        "{},{:.6},{},{},{:e},{:.3},{}",
        r.epoch,
        r.train_loss,
        opt(r.valid_loss),
        opt(r.valid_acc),
        r.lr,
        r.dur,
        r.event_cp,
    )
}
