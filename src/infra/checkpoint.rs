// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model parameters using Burn's CompactRecorder,
// plus the JSON side files a run needs to be reproduced.
//
// What lives in a checkpoint directory:
//   checkpoints/
//     best_model.mpk.gz    ← params of the best epoch so far
//     history.json         ← per-epoch history of the run
//     train_config.json    ← run configuration + class names
//     metrics.csv          ← written by the CsvLogger callback
//
// The config is saved separately because inference has to rebuild
// the exact architecture (number of classes) before the recorded
// weights can be loaded into it.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::history::History;

const CONFIG_FILE: &str = "train_config.json";

/// Manages saving and loading of checkpoints in one directory.
#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a params file, without the extension the recorder appends.
    pub fn params_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Save a module's parameters as `{dir}/{name}.mpk.gz`.
    pub fn save_params<B: Backend, M: Module<B>>(&self, module: &M, name: &str) -> Result<()> {
        let path = self.params_path(name);

        CompactRecorder::new()
            .record(module.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save params to '{}'", path.display()))?;

        tracing::debug!("Saved params '{}'", path.display());
        Ok(())
    }

    /// Load parameters saved by `save_params` into `module`.
    ///
    /// `module` must have the same architecture as the one that was saved,
    /// otherwise the recorder refuses the file.
    pub fn load_params<B: Backend, M: Module<B>>(
        &self,
        module: M,
        name: &str,
        device: &B::Device,
    ) -> Result<M> {
        let path = self.params_path(name);

        let record = CompactRecorder::new().load(path.clone(), device).with_context(|| {
            format!(
                "Cannot load params '{}'. Have you trained the model first?",
                path.display()
            )
        })?;

        Ok(module.load_record(record))
    }

    /// Save the run configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the run configuration from JSON.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);

        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. \
                 Make sure you have run 'train' before 'predict'.",
                path.display()
            )
        })?;

        serde_json::from_str(&json)
            .with_context(|| format!("'{}' is not a valid training config", path.display()))
    }

    /// Write the history as pretty JSON to `{dir}/{file}`.
    pub fn save_history(&self, history: &History, file: &str) -> Result<()> {
        let path = self.dir.join(file);
        fs::write(&path, serde_json::to_string_pretty(history)?)
            .with_context(|| format!("Cannot write history to '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_history(&self, file: &str) -> Result<History> {
        let path = self.dir.join(file);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read history from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::history::EpochRecord;
    use burn::backend::NdArray;
    use burn::nn::{Linear, LinearConfig};

    type TestBackend = NdArray;

    #[test]
    fn test_params_roundtrip_preserves_weights() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let device = Default::default();

        let saved: Linear<TestBackend> = LinearConfig::new(4, 2).init(&device);
        ckpt.save_params(&saved, "best_model").unwrap();

        let fresh: Linear<TestBackend> = LinearConfig::new(4, 2).init(&device);
        let loaded = ckpt.load_params(fresh, "best_model", &device).unwrap();

        let expected = saved.weight.val().into_data().to_vec::<f32>().unwrap();
        let actual = loaded.weight.val().into_data().to_vec::<f32>().unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_missing_params_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let device = Default::default();
        let module: Linear<TestBackend> = LinearConfig::new(4, 2).init(&device);

        let err = ckpt.load_params(module, "nope", &device).unwrap_err();
        assert!(err.to_string().contains("Have you trained"));
    }

    #[test]
    fn test_config_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let mut cfg = TrainConfig::default();
        cfg.class_names = vec!["ants".into(), "bees".into()];

        ckpt.save_config(&cfg).unwrap();
        let loaded = ckpt.load_config().unwrap();
        assert_eq!(loaded.class_names, cfg.class_names);
        assert_eq!(loaded.net.max_epochs, cfg.net.max_epochs);
    }

    #[test]
    fn test_history_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let mut history = History::default();
        history.push(EpochRecord::new(1, 0.7, Some(0.6), Some(0.5), 1e-3, 2.0));

        ckpt.save_history(&history, "history.json").unwrap();
        let loaded = ckpt.load_history("history.json").unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.last().unwrap().valid_acc, Some(0.5));
    }

    #[test]
    fn test_history_with_diverged_epoch_loads() {
        let tmp = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::new(tmp.path());
        let mut history = History::default();
        history.push(EpochRecord::new(1, f64::NAN, None, None, 1e-3, 2.0));

        ckpt.save_history(&history, "history.json").unwrap();
        let loaded = ckpt.load_history("history.json").unwrap();
        assert!(loaded.last().unwrap().train_loss.is_nan());
    }
}
