// ============================================================
// Layer 5 — CsvLogger
// ============================================================
// Appends every history row to `metrics.csv` in the checkpoint
// directory.

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use std::path::PathBuf;

use crate::infra::metrics::MetricsLogger;
use crate::ml::callbacks::Callback;
use crate::ml::history::History;
use crate::ml::net::TrainingState;

pub const DEFAULT_CSV: &str = "metrics.csv";

pub struct CsvLogger {
    dir: PathBuf,
    logger: Option<MetricsLogger>,
}

impl CsvLogger {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            logger: None,
        }
    }
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> Callback<B, M> for CsvLogger {
    fn name(&self) -> &str {
        "CsvLogger"
    }

    fn on_train_begin(&mut self, module: M, _state: &mut TrainingState) -> Result<M> {
        let logger = MetricsLogger::new(&self.dir, DEFAULT_CSV)?;
        tracing::info!("Logging epoch metrics to '{}'", logger.csv_path().display());
        self.logger = Some(logger);
        Ok(module)
    }

    fn on_epoch_end(
        &mut self,
        _module: &M,
        _state: &mut TrainingState,
        history: &mut History,
    ) -> Result<()> {
        if let (Some(logger), Some(row)) = (&self.logger, history.last()) {
            logger.log(row)?;
        }
        Ok(())
    }
}
