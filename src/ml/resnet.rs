// ============================================================
// Layer 5 — ResNet-18
// ============================================================
// He et al. (2016), "Deep Residual Learning for Image Recognition".
//
//   conv1 7×7/2 → bn1 → relu → maxpool 3×3/2
//   layer1: 2 × BasicBlock(64)
//   layer2: 2 × BasicBlock(128, stride 2)
//   layer3: 2 × BasicBlock(256, stride 2)
//   layer4: 2 × BasicBlock(512, stride 2)
//   global average pool → fc(512 → num_classes)
//
// Field names follow torchvision's resnet18 so that ImageNet
// weights map onto this struct key-for-key (the only exception is
// `downsample`, remapped at import time, see pretrained.rs).

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::ml::classifier::{Classifier, Freezable, ParamGroup};

/// Output width of the last stage, i.e. the input size of `fc`.
pub const FEATURE_DIM: usize = 512;

const BLOCKS_PER_STAGE: usize = 2;

#[derive(Config, Debug)]
pub struct ResNetConfig {
    /// Size of the final classification layer
    #[config(default = 1000)]
    pub num_classes: usize,
}

impl ResNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ResNet<B> {
        let conv1 = Conv2dConfig::new([3, 64], [7, 7])
            .with_stride([2, 2])
            .with_padding(PaddingConfig2d::Explicit(3, 3))
            .with_bias(false)
            .init(device);
        let bn1 = BatchNormConfig::new(64).init(device);
        let maxpool = MaxPool2dConfig::new([3, 3])
            .with_strides([2, 2])
            .with_padding(PaddingConfig2d::Explicit(1, 1))
            .init();

        let layer1 = build_stage(64, 64, 1, device);
        let layer2 = build_stage(64, 128, 2, device);
        let layer3 = build_stage(128, 256, 2, device);
        let layer4 = build_stage(256, FEATURE_DIM, 2, device);

        ResNet {
            conv1,
            bn1,
            relu: Relu::new(),
            maxpool,
            layer1,
            layer2,
            layer3,
            layer4,
            avgpool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
            fc: LinearConfig::new(FEATURE_DIM, self.num_classes).init(device),
        }
    }
}

fn build_stage<B: Backend>(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
    device: &B::Device,
) -> Vec<BasicBlock<B>> {
    (0..BLOCKS_PER_STAGE)
        .map(|i| {
            if i == 0 {
                BasicBlock::new(in_channels, out_channels, stride, device)
            } else {
                BasicBlock::new(out_channels, out_channels, 1, device)
            }
        })
        .collect()
}

fn conv3x3<B: Backend>(in_c: usize, out_c: usize, stride: usize, device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new([in_c, out_c], [3, 3])
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .with_bias(false)
        .init(device)
}

/// 1×1 projection applied to the shortcut when the block changes
/// resolution or width.
#[derive(Module, Debug)]
pub struct Downsample<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
}

impl<B: Backend> Downsample<B> {
    fn new(in_c: usize, out_c: usize, stride: usize, device: &B::Device) -> Self {
        Self {
            conv: Conv2dConfig::new([in_c, out_c], [1, 1])
                .with_stride([stride, stride])
                .with_bias(false)
                .init(device),
            bn: BatchNormConfig::new(out_c).init(device),
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.bn.forward(self.conv.forward(x))
    }
}

#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    pub conv1: Conv2d<B>,
    pub bn1: BatchNorm<B, 2>,
    pub relu: Relu,
    pub conv2: Conv2d<B>,
    pub bn2: BatchNorm<B, 2>,
    pub downsample: Option<Downsample<B>>,
}

impl<B: Backend> BasicBlock<B> {
    fn new(in_c: usize, out_c: usize, stride: usize, device: &B::Device) -> Self {
        let downsample = (stride != 1 || in_c != out_c)
            .then(|| Downsample::new(in_c, out_c, stride, device));
        Self {
            conv1: conv3x3(in_c, out_c, stride, device),
            bn1: BatchNormConfig::new(out_c).init(device),
            relu: Relu::new(),
            conv2: conv3x3(out_c, out_c, 1, device),
            bn2: BatchNormConfig::new(out_c).init(device),
            downsample,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let identity = match &self.downsample {
            Some(down) => down.forward(x.clone()),
            None => x.clone(),
        };

        let out = self.relu.forward(self.bn1.forward(self.conv1.forward(x)));
        let out = self.bn2.forward(self.conv2.forward(out));

        self.relu.forward(out + identity)
    }
}

#[derive(Module, Debug)]
pub struct ResNet<B: Backend> {
    pub conv1: Conv2d<B>,
    pub bn1: BatchNorm<B, 2>,
    pub relu: Relu,
    pub maxpool: MaxPool2d,
    pub layer1: Vec<BasicBlock<B>>,
    pub layer2: Vec<BasicBlock<B>>,
    pub layer3: Vec<BasicBlock<B>>,
    pub layer4: Vec<BasicBlock<B>>,
    pub avgpool: AdaptiveAvgPool2d,
    pub fc: Linear<B>,
}

impl<B: Backend> ResNet<B> {
    /// images: [batch, 3, H, W] → features: [batch, 512]
    pub fn features(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.conv1.forward(images);
        let x = self.relu.forward(self.bn1.forward(x));
        let mut x = self.maxpool.forward(x);

        for block in self
            .layer1
            .iter()
            .chain(&self.layer2)
            .chain(&self.layer3)
            .chain(&self.layer4)
        {
            x = block.forward(x);
        }

        // [batch, 512, 1, 1] → [batch, 512]
        self.avgpool.forward(x).flatten::<2>(1, 3)
    }

    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.fc.forward(self.features(images))
    }

    /// Number of outputs of the classification layer.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.dims()[1]
    }

    /// Swap the classification layer for a freshly initialised
    /// `Linear(512, num_classes)`. Every other parameter is kept.
    pub fn with_head(mut self, num_classes: usize, device: &B::Device) -> Self {
        self.fc = LinearConfig::new(FEATURE_DIM, num_classes).init(device);
        self
    }
}

impl<B: Backend> Classifier<B> for ResNet<B> {
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images)
    }
}

impl<B: Backend> Freezable for ResNet<B> {
    fn param_groups(&self) -> Vec<ParamGroup> {
        vec![
            ParamGroup::new("conv1", self.conv1.num_params()),
            ParamGroup::new("bn1", self.bn1.num_params()),
            ParamGroup::new("layer1", self.layer1.num_params()),
            ParamGroup::new("layer2", self.layer2.num_params()),
            ParamGroup::new("layer3", self.layer3.num_params()),
            ParamGroup::new("layer4", self.layer4.num_params()),
            ParamGroup::new("fc", self.fc.num_params()),
        ]
    }

    fn freeze_group(mut self, name: &str) -> Self {
        match name {
            "conv1" => self.conv1 = self.conv1.no_grad(),
            "bn1" => self.bn1 = self.bn1.no_grad(),
            "layer1" => self.layer1 = self.layer1.no_grad(),
            "layer2" => self.layer2 = self.layer2.no_grad(),
            "layer3" => self.layer3 = self.layer3.no_grad(),
            "layer4" => self.layer4 = self.layer4.no_grad(),
            "fc" => self.fc = self.fc.no_grad(),
            other => tracing::warn!("ResNet has no parameter group '{}'", other),
        }
        self
    }
}
