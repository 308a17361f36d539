// ============================================================
// Layer 5 — Callbacks
// ============================================================
// Hooks the training wrapper calls at fixed points of `fit`:
//
//   on_train_begin  → once, may replace the module (freezing)
//   on_epoch_begin  → before each epoch, may change the lr
//   on_epoch_end    → after each epoch, sees the new history row
//   on_train_end    → once, after the last epoch
//
// Callbacks run in registration order. PrintLog is appended
// last by the wrapper, so it sees flags set by the others
// (e.g. `event_cp` from Checkpoint).

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::ml::history::History;
use crate::ml::net::TrainingState;

pub mod checkpoint;
pub mod csv_logger;
pub mod early_stopping;
pub mod freezer;
pub mod lr_scheduler;
pub mod print_log;

pub use checkpoint::Checkpoint;
pub use csv_logger::CsvLogger;
pub use early_stopping::EarlyStopping;
pub use freezer::Freezer;
pub use lr_scheduler::{LrPolicy, LrScheduler};
pub use print_log::PrintLog;

pub trait Callback<B: AutodiffBackend, M: AutodiffModule<B>> {
    fn name(&self) -> &str;

    fn on_train_begin(&mut self, module: M, _state: &mut TrainingState) -> Result<M> {
        Ok(module)
    }

    fn on_epoch_begin(&mut self, _state: &mut TrainingState) -> Result<()> {
        Ok(())
    }

    fn on_epoch_end(
        &mut self,
        _module: &M,
        _state: &mut TrainingState,
        _history: &mut History,
    ) -> Result<()> {
        Ok(())
    }

    fn on_train_end(&mut self, _module: &M, _history: &History) -> Result<()> {
        Ok(())
    }
}
