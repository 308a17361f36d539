// ============================================================
// Layer 5 — Classifier traits
// ============================================================
// The seams between the training wrapper and a concrete network.
//
//   Classifier — images in, class logits out
//   Freezable  — named parameter groups that can be excluded
//                from gradient updates

use burn::prelude::*;

/// A network mapping a batch of images to one logit per class.
pub trait Classifier<B: Backend> {
    /// images: [batch, 3, height, width] → logits: [batch, num_classes]
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;
}

/// A named block of parameters and its size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGroup {
    pub name: &'static str,
    pub num_params: usize,
}

impl ParamGroup {
    pub fn new(name: &'static str, num_params: usize) -> Self {
        Self { name, num_params }
    }
}

/// A module whose parameters are organised into named groups
/// that can be frozen one at a time.
///
/// A frozen group no longer tracks gradients, so the optimiser
/// has nothing to update for it.
pub trait Freezable: Sized {
    /// Every group, in forward order.
    fn param_groups(&self) -> Vec<ParamGroup>;

    /// Stop gradient tracking for the group called `name`.
    /// Unknown names leave the module unchanged.
    fn freeze_group(self, name: &str) -> Self;
}
