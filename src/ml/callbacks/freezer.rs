// ============================================================
// Layer 5 — Freezer
// ============================================================
// Freezes parameter groups once, when training starts.
//
// For transfer learning the whole pretrained body is frozen and
// only the new head keeps learning:
//
//   Freezer::all_except(["fc"])
//     conv1, bn1, layer1..layer4 → no_grad
//     fc                         → trainable
//
// A frozen group produces no gradients, so the optimiser step
// leaves it untouched.

use anyhow::Result;
use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};

use crate::ml::callbacks::Callback;
use crate::ml::classifier::Freezable;
use crate::ml::net::TrainingState;

type Predicate = Box<dyn Fn(&str) -> bool + Send>;

pub struct Freezer {
    predicate: Predicate,
}

impl Freezer {
    /// Freeze every group for which `predicate(name)` is true.
    pub fn new(predicate: impl Fn(&str) -> bool + Send + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    /// Freeze every group except the named ones.
    pub fn all_except<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keep: Vec<String> = names.into_iter().map(Into::into).collect();
        Self::new(move |group| !keep.iter().any(|n| n == group))
    }

    /// Apply the predicate to `module` and return it with the
    /// matching groups frozen.
    pub fn freeze<M: Freezable>(&self, module: M) -> M {
        let groups = module.param_groups();
        let total: usize = groups.iter().map(|g| g.num_params).sum();

        let (frozen, trainable): (Vec<_>, Vec<_>) =
            groups.into_iter().partition(|g| (self.predicate)(g.name));
        let frozen_params: usize = frozen.iter().map(|g| g.num_params).sum();

        tracing::info!(
            "Freezing {} of {} parameters; trainable groups: [{}]",
            frozen_params,
            total,
            trainable.iter().map(|g| g.name).collect::<Vec<_>>().join(", ")
        );

        frozen
            .iter()
            .fold(module, |module, group| module.freeze_group(group.name))
    }
}

impl<B, M> Callback<B, M> for Freezer
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Freezable,
{
    fn name(&self) -> &str {
        "Freezer"
    }

    fn on_train_begin(&mut self, module: M, _state: &mut TrainingState) -> Result<M> {
        Ok(self.freeze(module))
    }
}
