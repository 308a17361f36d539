// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a transfer-learning run in order:
//
//   Step 1: Make sure the dataset is on disk      (Layer 4 - data)
//   Step 2: Scan train/ and val/ class folders    (Layer 4 - data)
//   Step 3: Build Burn datasets + transforms      (Layer 4 - data)
//   Step 4: Load the ImageNet ResNet-18           (Layer 5 - ml)
//   Step 5: Replace the classification layer      (Layer 5 - ml)
//   Step 6: Save the run config                   (Layer 6 - infra)
//   Step 7: Configure the net and its callbacks   (Layer 5 - ml)
//   Step 8: fit                                   (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)
//            Yosinski et al. (2014) How transferable are features
//            in deep neural networks?

use anyhow::{bail, Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};

use crate::data::{
    dataset::ImageFolderDataset,
    download::{DatasetDownloader, HYMENOPTERA_DIR, HYMENOPTERA_URL},
    loader::ImageFolder,
    splitter::split_train_val,
    transform::ImagePipeline,
};
use crate::domain::{labels::ClassLabels, sample::ImageSample, traits::SampleSource};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    callbacks::{
        checkpoint::DEFAULT_PARAMS, Checkpoint, CsvLogger, EarlyStopping, Freezer, LrPolicy,
        LrScheduler,
    },
    history::{Metric, Monitor},
    net::{NetConfig, NeuralNetClassifier},
    pretrained::PretrainedWeights,
    resnet::{ResNet, ResNetConfig, FEATURE_DIM},
    BackendKind, NdArrayTrain, WgpuTrain,
};

// ─── Training Configuration ──────────────────────────────────────────────────
// Everything a run needs, saved next to the checkpoints so that
// `predict` can rebuild the same network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Where the dataset archive is downloaded and extracted
    pub data_dir: String,
    pub dataset_url: String,
    /// Directory the archive unpacks into, inside `data_dir`
    pub dataset_name: String,
    pub checkpoint_dir: String,
    /// Cache for the pretrained .pth file
    pub weights_dir: String,
    pub backend: BackendKind,
    /// Start from ImageNet weights; otherwise random init
    pub pretrained: bool,
    /// Train every layer instead of only the new head
    pub finetune_all: bool,
    /// Side of the square crop fed to the network
    pub image_size: u32,
    /// Shorter side after resizing, before the centre crop (eval only)
    pub resize: u32,
    /// Held-out fraction used when the dataset has no val/ folder
    pub valid_fraction: f64,
    /// Per-epoch learning rate schedule
    #[serde(default)]
    pub lr_policy: LrPolicy,
    /// `<metric>_best` flag that triggers a checkpoint
    pub monitor: String,
    /// Stop after this many epochs without valid_loss improvement
    pub patience: Option<usize>,
    /// Relative valid_loss gain that counts as an improvement
    pub patience_threshold: f64,
    /// Params file name (without extension) inside `checkpoint_dir`
    pub f_params: String,
    /// Filled in from the training folder at the start of a run
    #[serde(default)]
    pub class_names: Vec<String>,
    pub net: NetConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            dataset_url: HYMENOPTERA_URL.to_string(),
            dataset_name: HYMENOPTERA_DIR.to_string(),
            checkpoint_dir: "checkpoints".to_string(),
            weights_dir: "weights".to_string(),
            backend: BackendKind::Wgpu,
            pretrained: true,
            finetune_all: false,
            image_size: 224,
            resize: 256,
            valid_fraction: 0.2,
            lr_policy: LrPolicy::default(),
            monitor: "valid_acc_best".to_string(),
            patience: None,
            patience_threshold: 1e-4,
            f_params: DEFAULT_PARAMS.to_string(),
            class_names: Vec::new(),
            net: NetConfig::new(),
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSummary {
    pub epochs_run: usize,
    pub best_epoch: Option<usize>,
    pub best_valid_acc: Option<f64>,
    pub params_path: PathBuf,
}

impl fmt::Display for TrainSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.best_epoch, self.best_valid_acc) {
            (Some(epoch), Some(acc)) => write!(
                f,
                "Best val acc {:.4} at epoch {} of {}; params in '{}'",
                acc,
                epoch,
                self.epochs_run,
                self.params_path.display()
            ),
            _ => write!(f, "Trained {} epochs; no validation score", self.epochs_run),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Run the whole pipeline on the configured backend.
    pub fn execute(&self) -> Result<TrainSummary> {
        tracing::info!("Using backend: {}", self.config.backend);
        match self.config.backend {
            BackendKind::Wgpu => self.run::<WgpuTrain>(Default::default()),
            BackendKind::NdArray => self.run::<NdArrayTrain>(Default::default()),
        }
    }

    fn run<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainSummary> {
        let cfg = &self.config;
        let monitor: Monitor = cfg.monitor.parse()?;
        let scheduler = LrScheduler::new(cfg.lr_policy.clone())?;

        // ── Step 1: Dataset on disk ───────────────────────────────────────────
        let dataset_dir = DatasetDownloader::new(&cfg.dataset_url, &cfg.data_dir)
            .with_extracted_dir(&cfg.dataset_name)
            .ensure()?;

        // ── Step 2: Scan class folders ────────────────────────────────────────
        // val/ is the predefined validation split; without it a random
        // fraction of train/ is held out instead.
        let (classes, train_samples, valid_samples) = self.scan(&dataset_dir)?;
        tracing::info!(
            "Classes: {} | {} train, {} validation images",
            classes.names().join(", "),
            train_samples.len(),
            valid_samples.len()
        );

        // ── Step 3: Burn datasets ─────────────────────────────────────────────
        // train: random resized crop + horizontal flip
        // valid: resize + centre crop
        let train_dataset =
            ImageFolderDataset::new(train_samples, ImagePipeline::train(cfg.image_size));
        let valid_dataset =
            ImageFolderDataset::new(valid_samples, ImagePipeline::eval(cfg.resize, cfg.image_size));

        // ── Step 4: Network ───────────────────────────────────────────────────
        let model: ResNet<B> = if cfg.pretrained {
            PretrainedWeights::resnet18(&cfg.weights_dir).load_resnet18(&device)?
        } else {
            tracing::warn!("Pretrained weights disabled; starting from random init");
            ResNetConfig::new().init(&device)
        };

        // ── Step 5: New head ──────────────────────────────────────────────────
        // fc: 512 → 1000 ImageNet classes becomes 512 → classes.len()
        let model = model.with_head(classes.len(), &device);
        tracing::info!("New classification layer: {} → {}", FEATURE_DIM, model.num_classes());

        // ── Step 6: Save config for inference ─────────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir);
        let run_cfg = TrainConfig {
            class_names: classes.names().to_vec(),
            ..cfg.clone()
        };
        ckpt.save_config(&run_cfg)?;

        // ── Step 7: Net + callbacks ───────────────────────────────────────────
        // Order matters: Checkpoint sets event_cp before CsvLogger
        // writes the row.
        let mut net = NeuralNetClassifier::new(model, cfg.net.clone(), device);
        if !cfg.finetune_all {
            net = net.with_callback(Freezer::all_except(["fc"]));
        }
        net = net
            .with_callback(scheduler)
            .with_callback(
                Checkpoint::new(ckpt.clone())
                    .with_monitor(Some(monitor))
                    .with_f_params(&cfg.f_params),
            )
            .with_callback(CsvLogger::new(ckpt.dir()));
        if let Some(patience) = cfg.patience {
            net = net.with_callback(
                EarlyStopping::new(Metric::ValidLoss, patience)
                    .with_threshold(cfg.patience_threshold),
            );
        }

        // ── Step 8: Train ─────────────────────────────────────────────────────
        let net = net
            .fit(train_dataset, Some(valid_dataset))
            .context("Training failed")?;

        let history = net.history();
        let best = history.best_epoch(Metric::ValidAcc);
        Ok(TrainSummary {
            epochs_run: history.len(),
            best_epoch: best.map(|r| r.epoch),
            best_valid_acc: best.and_then(|r| r.valid_acc),
            params_path: ckpt.params_path(&cfg.f_params),
        })
    }

    fn scan(
        &self,
        dataset_dir: &std::path::Path,
    ) -> Result<(ClassLabels, Vec<ImageSample>, Vec<ImageSample>)> {
        let train_folder = ImageFolder::new(dataset_dir.join("train"));
        let classes = train_folder.classes()?;
        let train_samples = train_folder.load_all()?;

        let val_dir = dataset_dir.join("val");
        let (train, valid) = if val_dir.is_dir() {
            let valid_samples = ImageFolder::new(&val_dir)
                .with_classes(classes.clone())
                .load_all()?;
            if valid_samples.is_empty() {
                bail!("'{}' contains no images", val_dir.display());
            }
            (train_samples, valid_samples)
        } else {
            tracing::info!(
                "No val/ folder; holding out {:.0}% of train/",
                self.config.valid_fraction * 100.0
            );
            let (train, valid) = split_train_val(
                train_samples,
                1.0 - self.config.valid_fraction,
                self.config.net.seed,
            );
            if valid.is_empty() {
                bail!(
                    "valid_fraction {} of {} images leaves no validation set",
                    self.config.valid_fraction,
                    train.len()
                );
            }
            (train, valid)
        };
        Ok((classes, train, valid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::tests::write_png;
    use std::path::Path;

    fn fixture(root: &Path, with_val: bool) {
        let base = root.join(HYMENOPTERA_DIR);
        for (class, colour) in [("ants", [20, 20, 20]), ("bees", [240, 200, 0])] {
            for i in 0..3 {
                write_png(&base.join(format!("train/{class}/{i}.png")), 40, 36, colour);
            }
            if with_val {
                write_png(&base.join(format!("val/{class}/v.png")), 40, 36, colour);
            }
        }
    }

    fn small_config(root: &Path) -> TrainConfig {
        TrainConfig {
            data_dir: root.display().to_string(),
            dataset_url: "http://invalid.localhost/data.zip".to_string(),
            checkpoint_dir: root.join("ckpt").display().to_string(),
            backend: BackendKind::NdArray,
            pretrained: false,
            image_size: 32,
            resize: 36,
            net: NetConfig::new()
                .with_batch_size(2)
                .with_max_epochs(2)
                .with_num_workers(1)
                .with_verbose(false),
            ..TrainConfig::default()
        }
    }

    #[test]
    fn test_defaults_match_transfer_setup() {
        let cfg = TrainConfig::default();
        assert_eq!(cfg.lr_policy, LrPolicy::Step { step_size: 7, gamma: 0.1 });
        assert_eq!(cfg.monitor, "valid_acc_best");
        assert_eq!(cfg.image_size, 224);
        assert!(cfg.pretrained && !cfg.finetune_all);
    }

    #[test]
    fn test_config_json_roundtrip_keeps_net() {
        let cfg = TrainConfig {
            class_names: vec!["ants".into(), "bees".into()],
            ..TrainConfig::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.class_names, cfg.class_names);
        assert_eq!(back.net.max_epochs, 25);
        assert_eq!(back.backend, BackendKind::Wgpu);
    }

    #[test]
    fn test_unknown_monitor_fails_before_training() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            monitor: "valid_f1_best".to_string(),
            ..small_config(tmp.path())
        };
        assert!(TrainUseCase::new(cfg).execute().is_err());
    }

    #[test]
    fn test_invalid_lr_policy_fails_before_training() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = TrainConfig {
            lr_policy: LrPolicy::Step { step_size: 0, gamma: 0.1 },
            ..small_config(tmp.path())
        };
        let err = TrainUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("step_size"));
    }

    #[test]
    fn test_scan_falls_back_to_split_without_val() {
        let tmp = tempfile::tempdir().unwrap();
        fixture(tmp.path(), false);
        let cfg = TrainConfig {
            valid_fraction: 0.5,
            ..small_config(tmp.path())
        };

        let (classes, train, valid) = TrainUseCase::new(cfg)
            .scan(&tmp.path().join(HYMENOPTERA_DIR))
            .unwrap();
        assert_eq!(classes.names(), &["ants".to_string(), "bees".to_string()]);
        assert_eq!(train.len() + valid.len(), 6);
        assert_eq!(valid.len(), 3);
    }

    #[test]
    fn test_empty_val_folder_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        fixture(tmp.path(), false);
        let base = tmp.path().join(HYMENOPTERA_DIR);
        for class in ["ants", "bees"] {
            std::fs::create_dir_all(base.join("val").join(class)).unwrap();
        }

        let err = TrainUseCase::new(small_config(tmp.path()))
            .scan(&base)
            .unwrap_err();
        assert!(err.to_string().contains("no images"));
    }

    #[test]
    fn test_zero_valid_fraction_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        fixture(tmp.path(), false);
        let cfg = TrainConfig {
            valid_fraction: 0.0,
            ..small_config(tmp.path())
        };

        let err = TrainUseCase::new(cfg)
            .scan(&tmp.path().join(HYMENOPTERA_DIR))
            .unwrap_err();
        assert!(err.to_string().contains("no validation set"));
    }

    #[test]
    fn test_end_to_end_run_writes_checkpoint_files() {
        let tmp = tempfile::tempdir().unwrap();
        fixture(tmp.path(), true);
        let cfg = small_config(tmp.path());
        let ckpt_dir = PathBuf::from(&cfg.checkpoint_dir);

        let summary = TrainUseCase::new(cfg).execute().unwrap();

        assert_eq!(summary.epochs_run, 2);
        assert!(summary.best_epoch.is_some());
        assert!(ckpt_dir.join("best_model.mpk.gz").exists());
        assert!(ckpt_dir.join("history.json").exists());
        assert!(ckpt_dir.join("metrics.csv").exists());

        let saved = CheckpointManager::new(&ckpt_dir).load_config().unwrap();
        assert_eq!(saved.class_names, vec!["ants", "bees"]);
    }
}
