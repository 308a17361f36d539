// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that touches Burn's modules, optimisers and
// backends lives here.
//
//   classifier.rs  — Classifier / Freezable traits
//   resnet.rs      — ResNet-18 (torchvision layout)
//   pretrained.rs  — ImageNet weight import from a .pth file
//   net.rs         — NeuralNetClassifier: config + callbacks + fit
//   history.rs     — per-epoch metrics and best flags
//   callbacks/     — LrScheduler, Checkpoint, Freezer,
//                    EarlyStopping, CsvLogger, PrintLog
//   inferencer.rs  — loads a checkpoint and classifies images
//
// Reference: Burn Book §3 (Building Blocks), §5 (Training)
//            He et al. (2016) Deep Residual Learning

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod callbacks;
pub mod classifier;
pub mod error;
pub mod history;
pub mod inferencer;
pub mod net;
pub mod pretrained;
pub mod resnet;

/// Training runs on the autodiff-decorated backend, inference on
/// the plain one.
pub type WgpuTrain = burn::backend::Autodiff<burn::backend::Wgpu>;
pub type WgpuInfer = burn::backend::Wgpu;
pub type NdArrayTrain = burn::backend::Autodiff<burn::backend::NdArray>;
pub type NdArrayInfer = burn::backend::NdArray;

/// Which Burn backend a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// GPU through wgpu (Vulkan, Metal, DX12 or WebGPU)
    #[default]
    Wgpu,
    /// CPU
    NdArray,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Wgpu => f.write_str("wgpu"),
            BackendKind::NdArray => f.write_str("ndarray"),
        }
    }
}
