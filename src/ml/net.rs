// ============================================================
// Layer 5 — NeuralNetClassifier
// ============================================================
// A declarative wrapper around a Burn classifier: the network, the
// hyper-parameters and a list of callbacks go in, `fit` runs the
// whole training loop.
//
//   NeuralNetClassifier::new(model, NetConfig::new(), device)
//       .with_callback(Freezer::all_except(["fc"]))
//       .with_callback(LrScheduler::new(LrPolicy::default())?)
//       .with_callback(Checkpoint::new(manager))
//       .fit(train, Some(valid))?
//
// Each epoch:
//   1. on_epoch_begin callbacks (lr schedule)
//   2. training pass, SGD with momentum on the autodiff backend
//   3. validation pass on the inner backend (no autodiff overhead)
//   4. a new History row, then on_epoch_end callbacks
//
// Losses are averaged over samples, i.e. each batch loss is
// weighted by its batch size, so a short last batch does not skew
// the epoch loss.
//
// Reference: Burn Book §5 (Training), PyTorch torch.optim.SGD

use anyhow::{anyhow, Result};
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{
        decay::WeightDecayConfig, momentum::MomentumConfig, GradientsParams, Optimizer, SgdConfig,
    },
    prelude::*,
    tensor::{activation::softmax, backend::AutodiffBackend},
};
use std::{sync::Arc, time::Instant};

use crate::data::{
    batcher::{ImageBatch, ImageBatcher},
    dataset::ImageItem,
};
use crate::ml::callbacks::{Callback, PrintLog};
use crate::ml::classifier::Classifier;
use crate::ml::error::NetError;
use crate::ml::history::{EpochRecord, History};

// ─── Net Configuration ───────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct NetConfig {
    /// Base learning rate; schedulers scale it per epoch
    #[config(default = 1e-3)]
    pub lr: f64,
    #[config(default = 4)]
    pub batch_size: usize,
    #[config(default = 25)]
    pub max_epochs: usize,
    /// SGD momentum (dampening 0, as in torch.optim.SGD)
    #[config(default = 0.9)]
    pub momentum: f64,
    /// L2 penalty; `None` disables weight decay
    pub weight_decay: Option<f64>,
    #[config(default = true)]
    pub shuffle_train: bool,
    #[config(default = true)]
    pub shuffle_valid: bool,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    /// Print a table row after every epoch
    #[config(default = true)]
    pub verbose: bool,
}

/// Mutable loop state shared with callbacks.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    /// Current epoch, starting at 1 (0 before the first epoch)
    pub epoch: usize,
    pub max_epochs: usize,
    pub base_lr: f64,
    /// Learning rate for the current epoch
    pub lr: f64,
    /// Set by a callback to end training after the current epoch
    pub stop: bool,
}

impl TrainingState {
    pub fn new(base_lr: f64, max_epochs: usize) -> Self {
        Self {
            epoch: 0,
            max_epochs,
            base_lr,
            lr: base_lr,
            stop: false,
        }
    }

    pub fn completed_epochs(&self) -> usize {
        self.epoch.saturating_sub(1)
    }
}

// ─── NeuralNetClassifier ─────────────────────────────────────────────────────
pub struct NeuralNetClassifier<B: AutodiffBackend, M: AutodiffModule<B>> {
    module: M,
    config: NetConfig,
    device: B::Device,
    callbacks: Vec<Box<dyn Callback<B, M>>>,
    history: History,
}

impl<B, M> NeuralNetClassifier<B, M>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + Classifier<B> + 'static,
    M::InnerModule: Classifier<B::InnerBackend>,
{
    pub fn new(module: M, config: NetConfig, device: B::Device) -> Self {
        Self {
            module,
            config,
            device,
            callbacks: Vec::new(),
            history: History::default(),
        }
    }

    /// Register a callback. Callbacks run in registration order.
    pub fn with_callback(mut self, callback: impl Callback<B, M> + 'static) -> Self {
        self.callbacks.push(Box::new(callback));
        self
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Train for `max_epochs` epochs, or until a callback asks to stop.
    ///
    /// Without a validation dataset only `train_loss` is recorded and
    /// callbacks monitoring validation metrics will fail.
    pub fn fit<D>(self, train: D, valid: Option<D>) -> Result<Self>
    where
        D: Dataset<ImageItem> + 'static,
    {
        if train.is_empty() {
            return Err(NetError::EmptyDataset.into());
        }
        if self.config.batch_size == 0 {
            return Err(NetError::ZeroBatchSize.into());
        }

        let Self {
            mut module,
            config,
            device,
            mut callbacks,
            ..
        } = self;

        if config.verbose {
            callbacks.push(Box::new(PrintLog::new()));
        }
        tracing::debug!(
            "Callbacks: {}",
            callbacks.iter().map(|cb| cb.name()).collect::<Vec<_>>().join(", ")
        );

        tracing::info!(
            "Training on {} samples, validating on {} samples, for up to {} epochs",
            train.len(),
            valid.as_ref().map_or(0, |v| v.len()),
            config.max_epochs
        );

        let mut state = TrainingState::new(config.lr, config.max_epochs);
        let mut history = History::default();

        for cb in callbacks.iter_mut() {
            module = cb.on_train_begin(module, &mut state)?;
        }

        // ── SGD with momentum ─────────────────────────────────────────────────
        // v = μ·v + g
        // θ = θ − lr·v
        let mut optim = SgdConfig::new()
            .with_momentum(Some(
                MomentumConfig::new()
                    .with_momentum(config.momentum)
                    .with_dampening(0.0),
            ))
            .with_weight_decay(config.weight_decay.map(|p| WeightDecayConfig::new(p as f32)))
            .init::<B, M>();

        let criterion: CrossEntropyLoss<B> = CrossEntropyLossConfig::new().init(&device);
        let valid_criterion: CrossEntropyLoss<B::InnerBackend> =
            CrossEntropyLossConfig::new().init(&device);

        let train_loader = build_loader::<B, D>(
            &device,
            &config,
            config.shuffle_train,
            config.num_workers,
            train,
        );
        let valid_loader = valid.map(|v| {
            build_loader::<B::InnerBackend, D>(
                &device,
                &config,
                config.shuffle_valid,
                config.num_workers,
                v,
            )
        });

        // ── Epoch loop ────────────────────────────────────────────────────────
        for epoch in 1..=config.max_epochs {
            state.epoch = epoch;
            for cb in callbacks.iter_mut() {
                cb.on_epoch_begin(&mut state)?;
            }
            let started = Instant::now();

            // ── Training pass ─────────────────────────────────────────────────
            let mut loss_sum = 0.0f64;
            let mut seen = 0usize;

            for batch in train_loader.iter() {
                let n = batch.len();
                let logits = module.logits(batch.images);
                let loss = criterion.forward(logits, batch.targets);

                loss_sum += loss.clone().into_scalar().elem::<f64>() * n as f64;
                seen += n;

                let grads = GradientsParams::from_grads(loss.backward(), &module);
                module = optim.step(state.lr, module, grads);
            }
            let train_loss = if seen > 0 { loss_sum / seen as f64 } else { f64::NAN };

            // ── Validation pass ───────────────────────────────────────────────
            let (valid_loss, valid_acc) = match &valid_loader {
                Some(loader) => evaluate(&module.valid(), loader, &valid_criterion)
                    .map_or((None, None), |(l, a)| (Some(l), Some(a))),
                None => (None, None),
            };

            history.push(EpochRecord::new(
                epoch,
                train_loss,
                valid_loss,
                valid_acc,
                state.lr,
                started.elapsed().as_secs_f64(),
            ));

            for cb in callbacks.iter_mut() {
                cb.on_epoch_end(&module, &mut state, &mut history)?;
            }

            if state.stop {
                tracing::info!("Training stopped by a callback after epoch {}", epoch);
                break;
            }
        }

        for cb in callbacks.iter_mut() {
            cb.on_train_end(&module, &history)?;
        }

        if config.verbose {
            callbacks.pop();
        }

        Ok(Self {
            module,
            config,
            device,
            callbacks,
            history,
        })
    }

    /// Class probabilities, one row per sample, in dataset order.
    ///
    /// Uses a single loader worker: with several workers batches
    /// arrive in completion order, not dataset order.
    pub fn predict_proba<D>(&self, dataset: D) -> Result<Vec<Vec<f32>>>
    where
        D: Dataset<ImageItem> + 'static,
    {
        let model = self.module.valid();
        let loader =
            build_loader::<B::InnerBackend, D>(&self.device, &self.config, false, 1, dataset);

        let mut rows = Vec::new();
        for batch in loader.iter() {
            let probs = softmax(model.logits(batch.images), 1);
            let [_, num_classes] = probs.dims();
            let flat = probs
                .into_data()
                .convert::<f32>()
                .to_vec::<f32>()
                .map_err(|e| anyhow!("Cannot read probabilities: {e:?}"))?;
            rows.extend(flat.chunks(num_classes).map(<[f32]>::to_vec));
        }
        Ok(rows)
    }

    /// Most probable class index per sample.
    pub fn predict<D>(&self, dataset: D) -> Result<Vec<usize>>
    where
        D: Dataset<ImageItem> + 'static,
    {
        Ok(self
            .predict_proba(dataset)?
            .iter()
            .map(|row| argmax(row))
            .collect())
    }

    /// Accuracy on a labelled dataset.
    pub fn score<D>(&self, dataset: D) -> Result<f64>
    where
        D: Dataset<ImageItem> + 'static,
    {
        if dataset.is_empty() {
            return Err(NetError::EmptyDataset.into());
        }
        let loader = build_loader::<B::InnerBackend, D>(
            &self.device,
            &self.config,
            false,
            self.config.num_workers,
            dataset,
        );
        let criterion = CrossEntropyLossConfig::new().init(&self.device);

        evaluate(&self.module.valid(), &loader, &criterion)
            .map(|(_, acc)| acc)
            .ok_or_else(|| NetError::EmptyDataset.into())
    }
}

fn build_loader<Bk: Backend, D: Dataset<ImageItem> + 'static>(
    device: &Bk::Device,
    config: &NetConfig,
    shuffle: bool,
    num_workers: usize,
    dataset: D,
) -> Arc<dyn DataLoader<ImageBatch<Bk>>> {
    let mut builder = DataLoaderBuilder::new(ImageBatcher::<Bk>::new(device.clone()))
        .batch_size(config.batch_size)
        .num_workers(num_workers.max(1));
    if shuffle {
        builder = builder.shuffle(config.seed);
    }
    builder.build(dataset)
}

/// Sample-weighted mean loss and accuracy; `None` for an empty loader.
fn evaluate<Bk: Backend, C: Classifier<Bk>>(
    model: &C,
    loader: &Arc<dyn DataLoader<ImageBatch<Bk>>>,
    criterion: &CrossEntropyLoss<Bk>,
) -> Option<(f64, f64)> {
    let mut loss_sum = 0.0f64;
    let mut correct = 0usize;
    let mut seen = 0usize;

    for batch in loader.iter() {
        let n = batch.len();
        let logits = model.logits(batch.images);
        let loss = criterion.forward(logits.clone(), batch.targets.clone());
        loss_sum += loss.into_scalar().elem::<f64>() * n as f64;

        // argmax(1) returns shape [batch, 1], flatten to [batch]
        let hits: i64 = logits
            .argmax(1)
            .flatten::<1>(0, 1)
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<i64>();

        correct += hits as usize;
        seen += n;
    }

    (seen > 0).then(|| (loss_sum / seen as f64, correct as f64 / seen as f64))
}

fn argmax(row: &[f32]) -> usize {
    row.iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}
