// ============================================================
// Layer 5 — Inferencer
// ============================================================
// Classifies image files with a trained network.
//
//   1. read train_config.json → number of classes + image sizes
//   2. build a ResNet with that many outputs
//   3. load the checkpointed params into it
//   4. image → eval pipeline (resize, centre crop, normalise)
//      → logits → softmax → Prediction

use anyhow::{anyhow, bail, Context, Result};
use burn::{prelude::*, tensor::activation::softmax};
use image::DynamicImage;
use std::path::Path;

use crate::data::transform::{ImagePipeline, PixelBuffer};
use crate::domain::{prediction::Prediction, traits::ImageClassifier};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::callbacks::checkpoint::DEFAULT_HISTORY;
use crate::ml::history::Metric;
use crate::ml::resnet::{ResNet, ResNetConfig};

pub struct Inferencer<B: Backend> {
    model: ResNet<B>,
    pipeline: ImagePipeline,
    class_names: Vec<String>,
    device: B::Device,
}

impl<B: Backend> Inferencer<B> {
    pub fn new(
        model: ResNet<B>,
        pipeline: ImagePipeline,
        class_names: Vec<String>,
        device: B::Device,
    ) -> Self {
        Self {
            model,
            pipeline,
            class_names,
            device,
        }
    }

    /// Rebuild the network saved by a training run in `ckpt.dir()`.
    pub fn from_checkpoint(ckpt: &CheckpointManager, device: B::Device) -> Result<Self> {
        let cfg = ckpt.load_config()?;
        if cfg.class_names.is_empty() {
            bail!(
                "'{}' lists no class names; re-run 'train'",
                ckpt.dir().display()
            );
        }

        let model: ResNet<B> = ResNetConfig::new()
            .with_num_classes(cfg.class_names.len())
            .init(&device);
        let model = ckpt.load_params(model, &cfg.f_params, &device)?;
        tracing::info!(
            "Loaded '{}' with {} classes: {}",
            ckpt.params_path(&cfg.f_params).display(),
            cfg.class_names.len(),
            cfg.class_names.join(", ")
        );

        match ckpt.load_history(DEFAULT_HISTORY) {
            Ok(history) => {
                if let Some(best) = history.best_epoch(Metric::ValidAcc) {
                    tracing::info!(
                        "Checkpoint from a {}-epoch run; best valid_acc {:.4} at epoch {}",
                        history.len(),
                        best.valid_acc.unwrap_or(f64::NAN),
                        best.epoch
                    );
                }
            }
            Err(e) => tracing::debug!("No training history: {e:#}"),
        }

        let pipeline = ImagePipeline::eval(cfg.resize, cfg.image_size);
        Ok(Self::new(model, pipeline, cfg.class_names, device))
    }

    /// Softmax probabilities for one preprocessed image.
    pub fn probabilities(&self, pixels: PixelBuffer) -> Result<Vec<f32>> {
        let input = Tensor::<B, 1>::from_floats(pixels.data.as_slice(), &self.device)
            .reshape([1, 3, pixels.height, pixels.width]);

        softmax(self.model.forward(input), 1)
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow!("Cannot read probabilities: {e:?}"))
    }

    pub fn classify_image(&self, img: DynamicImage, source: impl Into<String>) -> Result<Prediction> {
        let pixels = self.pipeline.run(img, &mut rand::thread_rng());
        let probs = self.probabilities(pixels)?;
        Prediction::from_probabilities(source, probs, &self.class_names)
            .ok_or_else(|| anyhow!("The model produced no class scores"))
    }
}

impl<B: Backend> ImageClassifier for Inferencer<B> {
    fn classify(&self, path: &Path) -> Result<Prediction> {
        let img = image::open(path)
            .with_context(|| format!("Cannot decode image '{}'", path.display()))?;
        self.classify_image(img, path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use burn::backend::NdArray;
    use image::{Rgb, RgbImage};

    type TestBackend = NdArray;

    fn write_image(path: &Path) {
        RgbImage::from_pixel(48, 40, Rgb([200, 120, 30])).save(path).unwrap();
    }

    #[test]
    fn test_classify_returns_distribution() {
        let tmp = tempfile::tempdir().unwrap();
        let img_path = tmp.path().join("bee.png");
        write_image(&img_path);

        let device = Default::default();
        let model: ResNet<TestBackend> = ResNetConfig::new().with_num_classes(2).init(&device);
        let names = vec!["ants".to_string(), "bees".to_string()];
        let inferencer = Inferencer::new(model, ImagePipeline::eval(36, 32), names.clone(), device);

        let pred = inferencer.classify(&img_path).unwrap();
        assert_eq!(pred.probabilities.len(), 2);
        assert!((pred.probabilities.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert!(names.contains(&pred.class_name));
    }

    #[test]
    fn test_from_checkpoint_uses_saved_classes() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let device = Default::default();

        let cfg = TrainConfig {
            class_names: vec!["a".into(), "b".into(), "c".into()],
            image_size: 32,
            resize: 36,
            ..TrainConfig::default()
        };
        ckpt.save_config(&cfg).unwrap();

        let model: ResNet<TestBackend> = ResNetConfig::new().with_num_classes(3).init(&device);
        ckpt.save_params::<TestBackend, _>(&model, &cfg.f_params).unwrap();

        let inferencer = Inferencer::<TestBackend>::from_checkpoint(&ckpt, device).unwrap();
        assert_eq!(inferencer.class_names.len(), 3);
        assert_eq!(inferencer.model.num_classes(), 3);

        let img_path = tmp.path().join("x.png");
        write_image(&img_path);
        assert_eq!(inferencer.classify(&img_path).unwrap().probabilities.len(), 3);
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        assert!(Inferencer::<TestBackend>::from_checkpoint(&ckpt, Default::default()).is_err());
    }
}
