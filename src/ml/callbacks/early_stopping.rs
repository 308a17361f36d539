// ============================================================
// Layer 5 — Early Stopping
// ============================================================
// Stops training when the monitored metric has not improved for
// `patience` consecutive epochs.
//
// Improvement is relative to the best value so far:
//   lower is better  → current < best · (1 − threshold)
//   higher is better → current > best · (1 + threshold)

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::ml::callbacks::Callback;
use crate::ml::error::NetError;
use crate::ml::history::{History, Metric};
use crate::ml::net::TrainingState;

#[derive(Debug, Clone)]
pub struct EarlyStopping {
    metric: Metric,
    patience: usize,
    threshold: f64,
    best: Option<f64>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(metric: Metric, patience: usize) -> Self {
        Self {
            metric,
            patience,
            threshold: 1e-4,
            best: None,
            wait: 0,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    fn improved(&self, current: f64) -> bool {
        match self.best {
            None => true,
            Some(best) if self.metric.lower_is_better() => current < best * (1.0 - self.threshold),
            Some(best) => current > best * (1.0 + self.threshold),
        }
    }
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> Callback<B, M> for EarlyStopping {
    fn name(&self) -> &str {
        "EarlyStopping"
    }

    fn on_train_begin(&mut self, module: M, _state: &mut TrainingState) -> Result<M> {
        self.best = None;
        self.wait = 0;
        Ok(module)
    }

    fn on_epoch_end(
        &mut self,
        _module: &M,
        state: &mut TrainingState,
        history: &mut History,
    ) -> Result<()> {
        let Some(row) = history.last() else {
            return Ok(());
        };
        let current = self
            .metric
            .value(row)
            .ok_or(NetError::MissingValidation(self.metric.name()))?;

        if current.is_finite() && self.improved(current) {
            self.best = Some(current);
            self.wait = 0;
            return Ok(());
        }

        self.wait += 1;
        if self.wait >= self.patience {
            tracing::info!(
                "Stopping since {} has not improved in the last {} epochs",
                self.metric,
                self.wait
            );
            state.stop = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::history::EpochRecord;
    use burn::backend::{Autodiff, NdArray};
    use burn::nn::{Linear, LinearConfig};

    type TB = Autodiff<NdArray>;

    /// Returns the epoch at which a stop was requested, if any.
    fn stop_epoch(es: &mut EarlyStopping, losses: &[f64]) -> Option<usize> {
        let device = Default::default();
        let module: Linear<TB> = LinearConfig::new(2, 2).init(&device);
        let mut state = TrainingState::new(1e-3, losses.len());
        let mut history = History::default();

        for (i, loss) in losses.iter().enumerate() {
            state.epoch = i + 1;
            history.push(EpochRecord::new(i + 1, 0.1, Some(*loss), Some(0.5), 1e-3, 0.1));
            Callback::<TB, Linear<TB>>::on_epoch_end(es, &module, &mut state, &mut history)
                .unwrap();
            if state.stop {
                return Some(state.epoch);
            }
        }
        None
    }

    #[test]
    fn test_stops_after_patience_epochs_without_improvement() {
        let mut es = EarlyStopping::new(Metric::ValidLoss, 2);
        assert_eq!(stop_epoch(&mut es, &[0.9, 0.8, 0.85, 0.81, 0.7]), Some(4));
    }

    #[test]
    fn test_improvement_resets_wait() {
        let mut es = EarlyStopping::new(Metric::ValidLoss, 2);
        assert_eq!(stop_epoch(&mut es, &[0.9, 0.95, 0.8, 0.85, 0.7]), None);
    }

    #[test]
    fn test_gain_below_threshold_is_not_improvement() {
        let mut es = EarlyStopping::new(Metric::ValidLoss, 1).with_threshold(0.1);
        assert_eq!(stop_epoch(&mut es, &[1.0, 0.95]), Some(2));
    }

    #[test]
    fn test_missing_validation_metric_is_an_error() {
        let device = Default::default();
        let module: Linear<TB> = LinearConfig::new(2, 2).init(&device);
        let mut es = EarlyStopping::new(Metric::ValidAcc, 3);
        let mut state = TrainingState::new(1e-3, 1);
        let mut history = History::default();
        history.push(EpochRecord::new(1, 0.5, None, None, 1e-3, 0.1));

        let result =
            Callback::<TB, Linear<TB>>::on_epoch_end(&mut es, &module, &mut state, &mut history);
        assert!(result.is_err());
    }
}
