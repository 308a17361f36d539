// ============================================================
// Layer 5 — Training History
// ============================================================
// One row per epoch, in the order the epochs ran.
//
// Each row carries the raw scores plus a `<metric>_best` flag
// telling whether that epoch set a new best for the metric.
// Callbacks such as Checkpoint and EarlyStopping only ever read
// these flags and values; they never recompute them.
//
//   epoch  train_loss  valid_loss  valid_acc  lr      dur   cp
//   1      0.6120      0.2950      0.8889     1e-3    8.1   +
//   2      0.4805      0.3301      0.8627     1e-3    7.9

use serde::{Deserialize, Deserializer, Serialize};
use std::{fmt, str::FromStr};

use crate::ml::error::NetError;

/// A score recorded every epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    TrainLoss,
    ValidLoss,
    ValidAcc,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::TrainLoss, Metric::ValidLoss, Metric::ValidAcc];

    pub fn name(self) -> &'static str {
        match self {
            Metric::TrainLoss => "train_loss",
            Metric::ValidLoss => "valid_loss",
            Metric::ValidAcc => "valid_acc",
        }
    }

    pub fn lower_is_better(self) -> bool {
        !matches!(self, Metric::ValidAcc)
    }

    /// Strict improvement of `current` over `best`.
    pub fn is_better(self, current: f64, best: f64) -> bool {
        if self.lower_is_better() {
            current < best
        } else {
            current > best
        }
    }

    pub fn value(self, record: &EpochRecord) -> Option<f64> {
        match self {
            Metric::TrainLoss => Some(record.train_loss),
            Metric::ValidLoss => record.valid_loss,
            Metric::ValidAcc => record.valid_acc,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| NetError::UnknownMetric(s.to_string()))
    }
}

/// The `<metric>_best` flag of a history row, e.g. `valid_acc_best`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor(pub Metric);

impl Monitor {
    pub fn metric(self) -> Metric {
        self.0
    }

    pub fn is_set(self, record: &EpochRecord) -> bool {
        record.is_best(self.0)
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Monitor(Metric::ValidAcc)
    }
}

impl fmt::Display for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_best", self.0)
    }
}

impl FromStr for Monitor {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_suffix("_best")
            .and_then(|m| m.parse::<Metric>().ok())
            .map(Monitor)
            .ok_or_else(|| NetError::UnknownMonitor(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    /// A diverged epoch is written as `null` and read back as NaN
    #[serde(deserialize_with = "null_as_nan")]
    pub train_loss: f64,
    pub valid_loss: Option<f64>,
    pub valid_acc: Option<f64>,
    /// Learning rate used during the epoch
    pub lr: f64,
    /// Wall-clock seconds for training + validation
    pub dur: f64,
    #[serde(default)]
    pub train_loss_best: bool,
    #[serde(default)]
    pub valid_loss_best: bool,
    #[serde(default)]
    pub valid_acc_best: bool,
    /// Set by the Checkpoint callback when params were saved this epoch
    #[serde(default)]
    pub event_cp: bool,
}

impl EpochRecord {
    pub fn new(
        epoch: usize,
        train_loss: f64,
        valid_loss: Option<f64>,
        valid_acc: Option<f64>,
        lr: f64,
        dur: f64,
    ) -> Self {
        Self {
            epoch,
            train_loss,
            valid_loss,
            valid_acc,
            lr,
            dur,
            train_loss_best: false,
            valid_loss_best: false,
            valid_acc_best: false,
            event_cp: false,
        }
    }

    pub fn is_best(&self, metric: Metric) -> bool {
        match metric {
            Metric::TrainLoss => self.train_loss_best,
            Metric::ValidLoss => self.valid_loss_best,
            Metric::ValidAcc => self.valid_acc_best,
        }
    }

    fn set_best(&mut self, metric: Metric, best: bool) {
        match metric {
            Metric::TrainLoss => self.train_loss_best = best,
            Metric::ValidLoss => self.valid_loss_best = best,
            Metric::ValidAcc => self.valid_acc_best = best,
        }
    }
}

/// JSON has no NaN; serde_json writes non-finite floats as `null`.
fn null_as_nan<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    records: Vec<EpochRecord>,
}

impl History {
    /// Append a row, computing its `*_best` flags against earlier rows.
    ///
    /// The first finite value of a metric is always a best;
    /// NaN, infinite and missing values never are.
    pub fn push(&mut self, mut record: EpochRecord) {
        for metric in Metric::ALL {
            let best = match metric.value(&record) {
                Some(v) if v.is_finite() => match self.best_value(metric) {
                    None => true,
                    Some(best) => metric.is_better(v, best),
                },
                _ => false,
            };
            record.set_best(metric, best);
        }
        self.records.push(record);
    }

    /// The best finite value of `metric` recorded so far.
    pub fn best_value(&self, metric: Metric) -> Option<f64> {
        self.records
            .iter()
            .filter_map(|r| metric.value(r))
            .filter(|v| v.is_finite())
            .reduce(|best, v| if metric.is_better(v, best) { v } else { best })
    }

    /// The most recent row flagged as best for `metric`.
    pub fn best_epoch(&self, metric: Metric) -> Option<&EpochRecord> {
        self.records.iter().rev().find(|r| r.is_best(metric))
    }

    pub fn last(&self) -> Option<&EpochRecord> {
        self.records.last()
    }

    pub fn last_mut(&mut self) -> Option<&mut EpochRecord> {
        self.records.last_mut()
    }

    pub fn records(&self) -> &[EpochRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(epoch: usize, train: f64, valid: f64, acc: f64) -> EpochRecord {
        EpochRecord::new(epoch, train, Some(valid), Some(acc), 1e-3, 1.0)
    }

    #[test]
    fn test_first_epoch_is_best_everywhere() {
        let mut h = History::default();
        h.push(row(1, 0.7, 0.6, 0.5));
        let r = h.last().unwrap();
        assert!(r.train_loss_best && r.valid_loss_best && r.valid_acc_best);
    }

    #[test]
    fn test_best_flags_follow_direction() {
        let mut h = History::default();
        h.push(row(1, 0.7, 0.6, 0.5));
        h.push(row(2, 0.5, 0.65, 0.8));
        h.push(row(3, 0.55, 0.4, 0.8));

        let flags: Vec<(bool, bool, bool)> = h
            .records()
            .iter()
            .map(|r| (r.train_loss_best, r.valid_loss_best, r.valid_acc_best))
            .collect();

        assert_eq!(
            flags,
            vec![(true, true, true), (true, false, true), (false, true, false)]
        );
        assert_eq!(h.best_value(Metric::ValidAcc), Some(0.8));
        assert_eq!(h.best_epoch(Metric::ValidAcc).unwrap().epoch, 2);
    }

    #[test]
    fn test_nan_is_never_best() {
        let mut h = History::default();
        h.push(row(1, f64::NAN, 0.6, 0.5));
        h.push(row(2, 0.9, 0.6, 0.5));

        assert!(!h.records()[0].train_loss_best);
        assert!(h.records()[1].train_loss_best);
    }

    #[test]
    fn test_missing_validation_is_never_best() {
        let mut h = History::default();
        h.push(EpochRecord::new(1, 0.5, None, None, 1e-3, 1.0));
        let r = h.last().unwrap();
        assert!(r.train_loss_best);
        assert!(!r.valid_loss_best && !r.valid_acc_best);
        assert_eq!(h.best_value(Metric::ValidLoss), None);
    }

    #[test]
    fn test_monitor_parsing() {
        assert_eq!("valid_acc_best".parse::<Monitor>().unwrap(), Monitor(Metric::ValidAcc));
        assert_eq!("train_loss_best".parse::<Monitor>().unwrap(), Monitor(Metric::TrainLoss));
        assert!("valid_acc".parse::<Monitor>().is_err());
        assert!("valid_f1_best".parse::<Monitor>().is_err());
        assert_eq!(Monitor::default().to_string(), "valid_acc_best");
    }

    #[test]
    fn test_history_json_is_a_list_of_rows() {
        let mut h = History::default();
        h.push(row(1, 0.7, 0.6, 0.5));
        let json = serde_json::to_value(&h).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["valid_acc_best"], serde_json::json!(true));
    }

    #[test]
    fn test_diverged_row_survives_json() {
        let mut h = History::default();
        h.push(EpochRecord::new(1, f64::NAN, Some(f64::NAN), None, 1e-3, 1.0));
        h.push(row(2, 0.4, 0.5, 0.6));

        let json = serde_json::to_string(&h).unwrap();
        let loaded: History = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded.len(), 2);
        let first = &loaded.records()[0];
        assert!(first.train_loss.is_nan());
        assert_eq!(first.valid_loss, None);
        assert!(!first.train_loss_best);
        assert_eq!(loaded.records()[1].epoch, 2);
        assert!(loaded.records()[1].train_loss_best);
    }
}
