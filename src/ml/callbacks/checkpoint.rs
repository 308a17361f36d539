// ============================================================
// Layer 5 — Checkpoint
// ============================================================
// Saves the module whenever the monitored `<metric>_best` flag of
// the newest history row is set, and marks that row with
// `event_cp = true`.
//
// With the default monitor `valid_acc_best` the params file always
// holds the weights of the most accurate epoch seen so far.

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::infra::checkpoint::CheckpointManager;
use crate::ml::callbacks::Callback;
use crate::ml::history::{History, Monitor};
use crate::ml::net::TrainingState;

pub const DEFAULT_PARAMS: &str = "best_model";
pub const DEFAULT_HISTORY: &str = "history.json";

pub struct Checkpoint {
    manager: CheckpointManager,
    /// `None` saves after every epoch
    monitor: Option<Monitor>,
    f_params: String,
    f_history: String,
}

impl Checkpoint {
    pub fn new(manager: CheckpointManager) -> Self {
        Self {
            manager,
            monitor: Some(Monitor::default()),
            f_params: DEFAULT_PARAMS.to_string(),
            f_history: DEFAULT_HISTORY.to_string(),
        }
    }

    pub fn with_monitor(mut self, monitor: Option<Monitor>) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn with_f_params(mut self, name: impl Into<String>) -> Self {
        self.f_params = name.into();
        self
    }
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> Callback<B, M> for Checkpoint {
    fn name(&self) -> &str {
        "Checkpoint"
    }

    fn on_epoch_end(
        &mut self,
        module: &M,
        _state: &mut TrainingState,
        history: &mut History,
    ) -> Result<()> {
        let Some(row) = history.last_mut() else {
            return Ok(());
        };

        let due = self.monitor.map_or(true, |m| m.is_set(row));
        if !due {
            return Ok(());
        }

        self.manager.save_params::<B, M>(module, &self.f_params)?;
        row.event_cp = true;
        tracing::info!(
            "Epoch {}: saved checkpoint '{}'",
            row.epoch,
            self.manager.params_path(&self.f_params).display()
        );

        self.manager.save_history(history, &self.f_history)?;
        Ok(())
    }

    fn on_train_end(&mut self, _module: &M, history: &History) -> Result<()> {
        if let Some(monitor) = self.monitor {
            match history.best_epoch(monitor.metric()) {
                Some(best) => tracing::info!(
                    "Best {} = {:.4} at epoch {}",
                    monitor.metric(),
                    monitor.metric().value(best).unwrap_or(f64::NAN),
                    best.epoch
                ),
                None => tracing::warn!("No epoch set '{}'; nothing was checkpointed", monitor),
            }
        }
        Ok(())
    }
}
