// ============================================================
// Layer 5 — Training Errors
// ============================================================
// Typed errors raised by NeuralNetClassifier and its callbacks.
// Use cases receive them wrapped in anyhow and can downcast.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("unknown metric '{0}', expected one of: train_loss, valid_loss, valid_acc")]
    UnknownMetric(String),

    #[error("unknown monitor '{0}', expected '<metric>_best', e.g. valid_acc_best")]
    UnknownMonitor(String),

    #[error("the training dataset is empty")]
    EmptyDataset,

    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("invalid learning rate schedule: {0}")]
    InvalidSchedule(String),

    #[error("'{0}' is only recorded when a validation dataset is given")]
    MissingValidation(&'static str),
}
