// ============================================================
// Layer 2 — PredictUseCase
// ============================================================
// Classifies image files with the network saved by `train`.
//
//   Step 1: Read the run config from the checkpoint directory
//   Step 2: Build the inferencer on the chosen backend
//   Step 3: Expand directories into image files
//   Step 4: Classify each file

use anyhow::Result;
use std::path::PathBuf;
use walkdir::WalkDir;

use crate::data::loader::has_image_extension;
use crate::domain::{prediction::Prediction, traits::ImageClassifier};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{inferencer::Inferencer, BackendKind, NdArrayInfer, WgpuInfer};

pub struct PredictUseCase {
    classifier: Box<dyn ImageClassifier>,
}

impl PredictUseCase {
    /// Load the trained network from `checkpoint_dir`.
    /// `backend` defaults to the one the model was trained with.
    pub fn new(checkpoint_dir: impl Into<PathBuf>, backend: Option<BackendKind>) -> Result<Self> {
        // ── Step 1: Run config ────────────────────────────────────────────────
        let ckpt = CheckpointManager::new(checkpoint_dir);
        let backend = match backend {
            Some(b) => b,
            None => ckpt.load_config()?.backend,
        };
        tracing::info!("Using backend: {}", backend);

        // ── Step 2: Inferencer ────────────────────────────────────────────────
        let classifier: Box<dyn ImageClassifier> = match backend {
            BackendKind::Wgpu => Box::new(Inferencer::<WgpuInfer>::from_checkpoint(
                &ckpt,
                Default::default(),
            )?),
            BackendKind::NdArray => Box::new(Inferencer::<NdArrayInfer>::from_checkpoint(
                &ckpt,
                Default::default(),
            )?),
        };
        Ok(Self::with_classifier(classifier))
    }

    pub fn with_classifier(classifier: Box<dyn ImageClassifier>) -> Self {
        Self { classifier }
    }

    /// Classify every image in `inputs`; directories are searched recursively.
    /// Files that cannot be decoded are reported and skipped.
    pub fn predict(&self, inputs: &[PathBuf]) -> Result<Vec<Prediction>> {
        // ── Step 3: Expand inputs ─────────────────────────────────────────────
        let files = expand_inputs(inputs);
        if files.is_empty() {
            anyhow::bail!("No image files found in the given paths");
        }

        // ── Step 4: Classify ──────────────────────────────────────────────────
        let mut predictions = Vec::with_capacity(files.len());
        for path in &files {
            match self.classifier.classify(path) {
                Ok(p) => {
                    tracing::debug!("{}", p);
                    predictions.push(p);
                }
                Err(e) => tracing::warn!("Skipping '{}': {:#}", path.display(), e),
            }
        }
        Ok(predictions)
    }
}

fn expand_inputs(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| has_image_extension(p))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::TrainConfig;
    use crate::data::loader::tests::write_png;
    use crate::ml::resnet::{ResNet, ResNetConfig};
    use std::fs;
    use std::path::Path;

    /// Always answers "ants" with certainty.
    struct Fixed;

    impl ImageClassifier for Fixed {
        fn classify(&self, path: &Path) -> Result<Prediction> {
            if path.extension().is_some_and(|e| e == "txt") {
                anyhow::bail!("not an image");
            }
            Ok(Prediction::from_probabilities(
                path.display().to_string(),
                vec![1.0, 0.0],
                &["ants".to_string(), "bees".to_string()],
            )
            .unwrap())
        }
    }

    #[test]
    fn test_directories_are_expanded_and_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        write_png(&tmp.path().join("b.png"), 4, 4, [0, 0, 0]);
        write_png(&tmp.path().join("sub/a.png"), 4, 4, [0, 0, 0]);
        fs::write(tmp.path().join("notes.md"), "x").unwrap();

        let files = expand_inputs(&[tmp.path().to_path_buf()]);
        assert_eq!(
            files,
            vec![tmp.path().join("b.png"), tmp.path().join("sub/a.png")]
        );
    }

    #[test]
    fn test_failed_files_are_skipped() {
        let use_case = PredictUseCase::with_classifier(Box::new(Fixed));
        let preds = use_case
            .predict(&[PathBuf::from("x.png"), PathBuf::from("y.txt")])
            .unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].class_name, "ants");
    }

    #[test]
    fn test_empty_input_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let use_case = PredictUseCase::with_classifier(Box::new(Fixed));
        assert!(use_case.predict(&[tmp.path().to_path_buf()]).is_err());
    }

    #[test]
    fn test_loads_checkpoint_on_cpu() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let cfg = TrainConfig {
            class_names: vec!["ants".into(), "bees".into()],
            image_size: 32,
            resize: 36,
            ..TrainConfig::default()
        };
        ckpt.save_config(&cfg).unwrap();
        let model: ResNet<NdArrayInfer> =
            ResNetConfig::new().with_num_classes(2).init(&Default::default());
        ckpt.save_params::<NdArrayInfer, _>(&model, &cfg.f_params).unwrap();

        let img = tmp.path().join("imgs/one.png");
        write_png(&img, 40, 40, [10, 200, 10]);

        let use_case = PredictUseCase::new(tmp.path(), Some(BackendKind::NdArray)).unwrap();
        let preds = use_case.predict(&[img]).unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].probabilities.len(), 2);
    }
}
