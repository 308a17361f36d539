// ============================================================
// Layer 5 — PrintLog
// ============================================================
// Prints one table row per epoch to stdout:
//
//   epoch  train_loss  valid_loss  valid_acc  cp       lr     dur
//   -----  ----------  ----------  ---------  --  --------  ------
//       1     0.6120*     0.2950*    0.8889*   +  1.00e-3  8.1043
//       2     0.4805*     0.3301     0.8627       1.00e-3  7.9460
//
// A trailing `*` marks a new best for that column.

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::ml::callbacks::Callback;
use crate::ml::history::{EpochRecord, History, Metric};
use crate::ml::net::TrainingState;

const HEADER: &str = "epoch  train_loss  valid_loss  valid_acc  cp        lr      dur";
const RULE: &str = "-----  ----------  ----------  ---------  --  --------  -------";

#[derive(Debug, Default)]
pub struct PrintLog {
    header_printed: bool,
}

impl PrintLog {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cell(record: &EpochRecord, metric: Metric, width: usize) -> String {
    let text = match metric.value(record) {
        Some(v) if record.is_best(metric) => format!("{v:.4}*"),
        Some(v) => format!("{v:.4} "),
        None => "- ".to_string(),
    };
    format!("{text:>width$}")
}

pub(crate) fn format_row(r: &EpochRecord) -> String {
    format!(
        "{:>5}  {}  {}  {}  {:>2}  {:>8.2e}  {:>7.4}",
        r.epoch,
        cell(r, Metric::TrainLoss, 10),
        cell(r, Metric::ValidLoss, 10),
        cell(r, Metric::ValidAcc, 9),
        if r.event_cp { "+" } else { "" },
        r.lr,
        r.dur,
    )
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> Callback<B, M> for PrintLog {
    fn name(&self) -> &str {
        "PrintLog"
    }

    fn on_train_begin(&mut self, module: M, _state: &mut TrainingState) -> Result<M> {
        self.header_printed = false;
        Ok(module)
    }

    fn on_epoch_end(
        &mut self,
        _module: &M,
        _state: &mut TrainingState,
        history: &mut History,
    ) -> Result<()> {
        if !self.header_printed {
            println!("{HEADER}");
            println!("{RULE}");
            self.header_printed = true;
        }
        if let Some(row) = history.last() {
            println!("{}", format_row(row));
        }
        Ok(())
    }
}
