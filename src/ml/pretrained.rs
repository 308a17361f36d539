// ============================================================
// Layer 5 — Pretrained Weights
// ============================================================
// Imports torchvision's ImageNet ResNet-18 checkpoint into the
// Burn ResNet defined in resnet.rs.
//
//   1. download resnet18-f37072fd.pth once into the weights dir
//   2. read it with burn-import's PyTorchFileRecorder
//   3. load the record into a 1000-class ResNet
//
// torchvision stores the shortcut projection as an nn.Sequential,
// so its keys are `downsample.0.*` (conv) and `downsample.1.*`
// (batch norm). Those are remapped onto the named fields of
// `Downsample`. BatchNorm's weight/bias → gamma/beta renaming is
// handled by burn-import's PyTorch adapter.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, Recorder},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use std::path::{Path, PathBuf};

use crate::infra::downloader::download_file;
use crate::ml::resnet::{ResNet, ResNetConfig, ResNetRecord};

pub const RESNET18_URL: &str = "https://download.pytorch.org/models/resnet18-f37072fd.pth";
pub const IMAGENET_CLASSES: usize = 1000;

pub struct PretrainedWeights {
    url: String,
    dir: PathBuf,
}

impl PretrainedWeights {
    pub fn new(url: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dir: dir.into(),
        }
    }

    /// torchvision's ImageNet ResNet-18, cached in `dir`.
    pub fn resnet18(dir: impl Into<PathBuf>) -> Self {
        Self::new(RESNET18_URL, dir)
    }

    /// Local path of the weight file; the file name is taken from the URL.
    pub fn local_path(&self) -> PathBuf {
        let file = self
            .url
            .rsplit('/')
            .next()
            .filter(|f| !f.is_empty())
            .unwrap_or("weights.pth");
        self.dir.join(file)
    }

    /// Download the weight file unless it is already cached.
    pub fn fetch(&self) -> Result<PathBuf> {
        download_file(&self.url, &self.local_path())
    }

    /// Fetch (if needed) and load the ImageNet weights.
    pub fn load_resnet18<B: Backend>(&self, device: &B::Device) -> Result<ResNet<B>> {
        let path = self.fetch()?;
        load_torchvision_resnet(&path, device)
    }
}

/// Load a torchvision ResNet-18 `.pth` file into a 1000-class ResNet.
pub fn load_torchvision_resnet<B: Backend>(path: &Path, device: &B::Device) -> Result<ResNet<B>> {
    let args = LoadArgs::new(path.to_path_buf())
        .with_key_remap(r"downsample\.0\.(.+)", "downsample.conv.$1")
        .with_key_remap(r"downsample\.1\.(.+)", "downsample.bn.$1");

    let record: ResNetRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
        .load(args, device)
        .with_context(|| format!("Cannot import PyTorch weights from '{}'", path.display()))?;

    tracing::info!("Loaded pretrained weights from '{}'", path.display());

    Ok(ResNetConfig::new()
        .with_num_classes(IMAGENET_CLASSES)
        .init(device)
        .load_record(record))
}
