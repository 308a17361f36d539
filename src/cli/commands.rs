// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the three subcommands and their flags:
//
//   download — fetch the dataset (and optionally the weights)
//   train    — transfer-learn ResNet-18 on the dataset
//   predict  — classify images with the trained checkpoint
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::data::download::{HYMENOPTERA_DIR, HYMENOPTERA_URL};
use crate::ml::{callbacks::LrPolicy, net::NetConfig, BackendKind};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download and extract the image dataset
    Download(DownloadArgs),

    /// Fine-tune a pretrained ResNet-18 on the dataset
    Train(TrainArgs),

    /// Classify image files with a trained checkpoint
    Predict(PredictArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendArg {
    Wgpu,
    Ndarray,
}

impl From<BackendArg> for BackendKind {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Wgpu => BackendKind::Wgpu,
            BackendArg::Ndarray => BackendKind::NdArray,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LrPolicyArg {
    Step,
    MultiStep,
    Exponential,
    Cosine,
    Constant,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Directory the archive is extracted into
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    #[arg(long, default_value = HYMENOPTERA_URL)]
    pub url: String,

    /// Name of the directory inside the archive
    #[arg(long, default_value = HYMENOPTERA_DIR)]
    pub dataset_name: String,

    /// Also download the ImageNet ResNet-18 weights
    #[arg(long)]
    pub weights: bool,

    #[arg(long, default_value = "weights")]
    pub weights_dir: String,
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    #[arg(long, default_value = HYMENOPTERA_URL)]
    pub dataset_url: String,

    #[arg(long, default_value = HYMENOPTERA_DIR)]
    pub dataset_name: String,

    /// Directory for params, history, metrics and the run config
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Cache directory for the pretrained weights
    #[arg(long, default_value = "weights")]
    pub weights_dir: String,

    #[arg(long, value_enum, default_value_t = BackendArg::Wgpu)]
    pub backend: BackendArg,

    /// Start from random weights instead of ImageNet
    #[arg(long)]
    pub no_pretrained: bool,

    /// Train every layer, not only the new classification layer
    #[arg(long)]
    pub finetune_all: bool,

    #[arg(long, default_value_t = 224)]
    pub image_size: u32,

    /// Shorter side before the centre crop used for validation
    #[arg(long, default_value_t = 256)]
    pub resize: u32,

    /// Held-out fraction when the dataset has no val/ folder
    #[arg(long, default_value_t = 0.2)]
    pub valid_fraction: f64,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 25)]
    pub epochs: usize,

    #[arg(long, default_value_t = 0.9)]
    pub momentum: f64,

    #[arg(long)]
    pub weight_decay: Option<f64>,

    #[arg(long, value_enum, default_value_t = LrPolicyArg::Step)]
    pub lr_policy: LrPolicyArg,

    /// Decay the learning rate every N epochs (step)
    #[arg(long, default_value_t = 7)]
    pub step_size: usize,

    /// Multiplicative learning rate decay (step, multi-step, exponential)
    #[arg(long, default_value_t = 0.1)]
    pub gamma: f64,

    /// Epochs after which the rate decays, e.g. 10,20 (multi-step)
    #[arg(long, value_delimiter = ',')]
    pub milestones: Vec<usize>,

    /// Final learning rate of the cosine schedule, reached at the last epoch
    #[arg(long, default_value_t = 0.0)]
    pub eta_min: f64,

    /// Checkpoint when this flag is set, e.g. valid_acc_best, valid_loss_best
    #[arg(long, default_value = "valid_acc_best")]
    pub monitor: String,

    /// Stop after N epochs without validation loss improvement
    #[arg(long)]
    pub patience: Option<usize>,

    /// Relative validation loss gain that resets the patience counter
    #[arg(long, default_value_t = 1e-4)]
    pub patience_threshold: f64,

    /// Keep the validation order fixed
    #[arg(long)]
    pub no_shuffle_valid: bool,

    #[arg(long, default_value_t = 4)]
    pub num_workers: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Do not print the per-epoch table
    #[arg(long, short)]
    pub quiet: bool,
}

impl TrainArgs {
    fn lr_policy(&self) -> LrPolicy {
        match self.lr_policy {
            LrPolicyArg::Step => LrPolicy::Step {
                step_size: self.step_size,
                gamma: self.gamma,
            },
            LrPolicyArg::MultiStep => LrPolicy::MultiStep {
                milestones: self.milestones.clone(),
                gamma: self.gamma,
            },
            LrPolicyArg::Exponential => LrPolicy::Exponential { gamma: self.gamma },
            LrPolicyArg::Cosine => LrPolicy::CosineAnnealing {
                t_max: self.epochs,
                eta_min: self.eta_min,
            },
            LrPolicyArg::Constant => LrPolicy::Constant,
        }
    }
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let lr_policy = a.lr_policy();
        let net = NetConfig::new()
            .with_lr(a.lr)
            .with_batch_size(a.batch_size)
            .with_max_epochs(a.epochs)
            .with_momentum(a.momentum)
            .with_weight_decay(a.weight_decay)
            .with_shuffle_valid(!a.no_shuffle_valid)
            .with_num_workers(a.num_workers)
            .with_seed(a.seed)
            .with_verbose(!a.quiet);

        TrainConfig {
            data_dir: a.data_dir,
            dataset_url: a.dataset_url,
            dataset_name: a.dataset_name,
            checkpoint_dir: a.checkpoint_dir,
            weights_dir: a.weights_dir,
            backend: a.backend.into(),
            pretrained: !a.no_pretrained,
            finetune_all: a.finetune_all,
            image_size: a.image_size,
            resize: a.resize,
            valid_fraction: a.valid_fraction,
            lr_policy,
            monitor: a.monitor,
            patience: a.patience,
            patience_threshold: a.patience_threshold,
            net,
            ..TrainConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Image files or directories of images
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Defaults to the backend used for training
    #[arg(long, value_enum)]
    pub backend: Option<BackendArg>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn parse(args: &[&str]) -> Commands {
        Cli::try_parse_from(args).unwrap().command
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let Commands::Train(args) = parse(&["resnet-transfer", "train"]) else {
            panic!("expected train");
        };
        let cfg: TrainConfig = args.into();
        let default = TrainConfig::default();

        assert_eq!(cfg.lr_policy, default.lr_policy);
        assert_eq!(cfg.monitor, default.monitor);
        assert_eq!(cfg.net.lr, default.net.lr);
        assert_eq!(cfg.net.batch_size, default.net.batch_size);
        assert_eq!(cfg.net.max_epochs, default.net.max_epochs);
        assert_eq!(cfg.backend, BackendKind::Wgpu);
        assert!(cfg.pretrained && cfg.net.verbose && cfg.net.shuffle_valid);
    }

    #[test]
    fn test_train_flags() {
        let Commands::Train(args) = parse(&[
            "resnet-transfer",
            "train",
            "--backend",
            "ndarray",
            "--no-pretrained",
            "--epochs",
            "3",
            "--patience",
            "2",
            "-q",
        ]) else {
            panic!("expected train");
        };
        let cfg: TrainConfig = args.into();

        assert_eq!(cfg.backend, BackendKind::NdArray);
        assert!(!cfg.pretrained);
        assert_eq!(cfg.net.max_epochs, 3);
        assert_eq!(cfg.patience, Some(2));
        assert!(!cfg.net.verbose);
    }

    #[test]
    fn test_lr_policy_flags() {
        let Commands::Train(args) = parse(&[
            "resnet-transfer",
            "train",
            "--lr-policy",
            "multi-step",
            "--milestones",
            "5,10",
            "--gamma",
            "0.5",
        ]) else {
            panic!("expected train");
        };
        let cfg: TrainConfig = args.into();
        assert_eq!(
            cfg.lr_policy,
            LrPolicy::MultiStep { milestones: vec![5, 10], gamma: 0.5 }
        );

        let Commands::Train(args) =
            parse(&["resnet-transfer", "train", "--lr-policy", "cosine", "--epochs", "12"])
        else {
            panic!("expected train");
        };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.lr_policy, LrPolicy::CosineAnnealing { t_max: 12, eta_min: 0.0 });
    }

    #[test]
    fn test_predict_requires_inputs() {
        assert!(Cli::try_parse_from(["resnet-transfer", "predict"]).is_err());

        let Commands::Predict(args) = parse(&["resnet-transfer", "predict", "a.jpg", "dir"]) else {
            panic!("expected predict");
        };
        assert_eq!(args.inputs.len(), 2);
        assert_eq!(args.backend, None);
    }
}
