// ============================================================
// Layer 5 — Learning Rate Scheduler
// ============================================================
// Sets the learning rate at the start of every epoch as a closed
// form of the base rate and the number of completed epochs `t`:
//
//   Step            lr = base · γ^⌊t / step_size⌋
//   MultiStep       lr = base · γ^(#milestones ≤ t)
//   Exponential     lr = base · γ^t
//   CosineAnnealing lr = η_min + (base − η_min)(1 + cos(π·t / T_max)) / 2
//   Constant        lr = base
//
// With Step{7, 0.1} and base 0.001, epochs 1-7 train at 1e-3,
// epochs 8-14 at 1e-4, epochs 15-21 at 1e-5 and so on.
//
// Reference: Loshchilov & Hutter (2017) SGDR

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::ml::callbacks::Callback;
use crate::ml::error::NetError;
use crate::ml::net::TrainingState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LrPolicy {
    Step { step_size: usize, gamma: f64 },
    MultiStep { milestones: Vec<usize>, gamma: f64 },
    Exponential { gamma: f64 },
    CosineAnnealing { t_max: usize, eta_min: f64 },
    Constant,
}

impl LrPolicy {
    fn validate(&self) -> Result<(), NetError> {
        let invalid = |msg: String| Err(NetError::InvalidSchedule(msg));
        match self {
            LrPolicy::Step { step_size: 0, .. } => invalid("step_size must be at least 1".into()),
            LrPolicy::Step { gamma, .. }
            | LrPolicy::MultiStep { gamma, .. }
            | LrPolicy::Exponential { gamma }
                if !(gamma.is_finite() && *gamma > 0.0) =>
            {
                invalid(format!("gamma must be positive, got {gamma}"))
            }
            LrPolicy::MultiStep { milestones, .. } if !milestones.windows(2).all(|w| w[0] < w[1]) => {
                invalid(format!("milestones must be strictly increasing, got {milestones:?}"))
            }
            LrPolicy::CosineAnnealing { t_max: 0, .. } => invalid("t_max must be at least 1".into()),
            LrPolicy::CosineAnnealing { eta_min, .. } if *eta_min < 0.0 => {
                invalid(format!("eta_min must not be negative, got {eta_min}"))
            }
            _ => Ok(()),
        }
    }

    /// Learning rate after `completed` epochs.
    pub fn lr_at(&self, base_lr: f64, completed: usize) -> f64 {
        match self {
            LrPolicy::Step { step_size, gamma } => {
                base_lr * gamma.powi((completed / step_size) as i32)
            }
            LrPolicy::MultiStep { milestones, gamma } => {
                let passed = milestones.iter().filter(|&&m| m <= completed).count();
                base_lr * gamma.powi(passed as i32)
            }
            LrPolicy::Exponential { gamma } => base_lr * gamma.powi(completed as i32),
            LrPolicy::CosineAnnealing { t_max, eta_min } => {
                let progress = completed as f64 / *t_max as f64;
                eta_min + (base_lr - eta_min) * (1.0 + (PI * progress).cos()) / 2.0
            }
            LrPolicy::Constant => base_lr,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LrScheduler {
    policy: LrPolicy,
}

impl LrScheduler {
    pub fn new(policy: LrPolicy) -> Result<Self, NetError> {
        policy.validate()?;
        Ok(Self { policy })
    }
}

impl Default for LrPolicy {
    /// Decay by 0.1 every 7 epochs.
    fn default() -> Self {
        LrPolicy::Step { step_size: 7, gamma: 0.1 }
    }
}

impl<B: AutodiffBackend, M: AutodiffModule<B>> Callback<B, M> for LrScheduler {
    fn name(&self) -> &str {
        "LrScheduler"
    }

    fn on_epoch_begin(&mut self, state: &mut TrainingState) -> Result<()> {
        let lr = self.policy.lr_at(state.base_lr, state.completed_epochs());
        if lr != state.lr {
            tracing::debug!("Epoch {}: learning rate {:e} → {:e}", state.epoch, state.lr, lr);
        }
        state.lr = lr;
        Ok(())
    }
}
