// ============================================================
// Layer 5 — Training Loop
// ============================================================
// train_epoch   — one pass over the training loader
// train_epochs  — train + validate per epoch with early stopping
// run_training  — builds model, optimiser and loaders, then
//                 calls train_epochs
//
// Key Burn points:
//   - Training runs on an AutodiffBackend for gradients
//   - model.valid() returns the model on B::InnerBackend
//   - Validation batcher must also use B::InnerBackend
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::Result;
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::AutodiffModule,
    nn::loss::{CrossEntropyLoss, CrossEntropyLossConfig},
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::application::train_use_case::TrainConfig;
use crate::data::{batcher::{ClipBatch, ClipBatcher}, dataset::ModifiedDataset};
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::{EpochMetrics, MetricsLogger};
use crate::ml::evaluator::{count_correct, evaluate};
use crate::ml::model::AudioClassifier;

/// Batches between two progress lines inside an epoch
const LOG_INTERVAL: usize = 100;

// ─── Learning curves ──────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub train_losses:     Vec<f64>,
    pub train_accuracies: Vec<f64>,
    pub val_losses:       Vec<f64>,
    pub val_accuracies:   Vec<f64>,
    pub best_val_loss:    f64,
    /// 1-based epoch of the best validation loss, 0 before any improvement
    pub best_epoch:       usize,
    pub stopped_early:    bool,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self { best_val_loss: f64::INFINITY, ..Default::default() }
    }

    pub fn epochs_run(&self) -> usize {
        self.train_losses.len()
    }
}

// ─── Early stopping ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Improved,
    NoImprovement,
    Stop,
}

/// Stops training once validation loss has not dropped by more than
/// `min_improvement` for `patience` consecutive epochs.
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    patience:        usize,
    min_improvement: f64,
    best:            f64,
    counter:         usize,
}

impl Default for EarlyStopping {
    fn default() -> Self {
        Self::new(5, 0.001)
    }
}

impl EarlyStopping {
    pub fn new(patience: usize, min_improvement: f64) -> Self {
        Self { patience, min_improvement, best: f64::INFINITY, counter: 0 }
    }

    pub fn observe(&mut self, val_loss: f64) -> Verdict {
        if self.best - val_loss > self.min_improvement {
            self.best    = val_loss;
            self.counter = 0;
            return Verdict::Improved;
        }
        self.counter += 1;
        if self.counter >= self.patience {
            Verdict::Stop
        } else {
            Verdict::NoImprovement
        }
    }

    pub fn best(&self) -> f64 {
        self.best
    }

    pub fn patience(&self) -> usize {
        self.patience
    }
}

// ─── One epoch ────────────────────────────────────────────────────────────────
/// Average loss and accuracy (%) of one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub average_loss: f64,
    pub accuracy:     f64,
}

/// Train for one epoch. Returns the updated model and the epoch's
/// average batch loss and accuracy, which are also appended to `history`.
pub fn train_epoch<B, O>(
    mut model: AudioClassifier<B>,
    loader:    &dyn DataLoader<ClipBatch<B>>,
    optim:     &mut O,
    criterion: &CrossEntropyLoss<B>,
    lr:        f64,
    epoch:     usize,
    history:   &mut TrainingHistory,
) -> (AudioClassifier<B>, EpochStats)
where
    B: AutodiffBackend,
    O: Optimizer<AudioClassifier<B>, B>,
{
    let total_items = loader.num_items();
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;
    let mut correct  = 0usize;
    let mut seen     = 0usize;

    for (i, batch) in loader.iter().enumerate() {
        let batch_len = batch.labels.dims()[0];
        let logits    = model.forward(batch.mels);
        let loss      = criterion.forward(logits.clone(), batch.labels.clone());

        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
        loss_sum += loss_val;
        batches  += 1;
        correct  += count_correct(logits.detach(), batch.labels);

        // Backward pass + optimiser update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        model = optim.step(lr, model, grads);

        if i % LOG_INTERVAL == 0 {
            tracing::info!(
                "Train Epoch: {} [{}/{} ({:.0}%)]\tLoss: {:.6}",
                epoch,
                seen,
                total_items,
                100.0 * seen as f64 / total_items.max(1) as f64,
                loss_val,
            );
        }
        seen += batch_len;
    }

    let stats = EpochStats {
        average_loss: if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
        accuracy:     if total_items > 0 { correct as f64 / total_items as f64 * 100.0 } else { 0.0 },
    };
    history.train_losses.push(stats.average_loss);
    history.train_accuracies.push(stats.accuracy);

    tracing::info!(
        "epoch n.{} : Average Loss = {:.6}, Accuracy = {:.2}%",
        epoch, stats.average_loss, stats.accuracy
    );
    (model, stats)
}

// ─── Many epochs ──────────────────────────────────────────────────────────────
/// Settings for `train_epochs`.
#[derive(Debug, Clone)]
pub struct EpochPlan {
    pub n_epochs:       usize,
    pub learning_rate:  f64,
    pub early_stopping: EarlyStopping,
}

/// Where `train_epochs` reports to. Both sinks are optional so the loop
/// can run in tests without touching the disk.
#[derive(Default)]
pub struct TrainSinks<'a> {
    pub checkpoints: Option<&'a CheckpointManager>,
    pub metrics:     Option<&'a MetricsLogger>,
}

/// Train and validate for up to `plan.n_epochs` epochs.
///
/// The model with the best validation loss is kept (and saved through
/// the checkpoint sink). Training stops early once the loss has not
/// improved for `patience` epochs. Returns the best model and the
/// learning curves.
#[allow(clippy::too_many_arguments)]
pub fn train_epochs<B, O>(
    mut model:       AudioClassifier<B>,
    train_loader:    &dyn DataLoader<ClipBatch<B>>,
    val_loader:      &dyn DataLoader<ClipBatch<B::InnerBackend>>,
    optim:           &mut O,
    train_criterion: &CrossEntropyLoss<B>,
    val_criterion:   &CrossEntropyLoss<B::InnerBackend>,
    plan:            EpochPlan,
    sinks:           TrainSinks<'_>,
) -> Result<(AudioClassifier<B>, TrainingHistory)>
where
    B: AutodiffBackend,
    O: Optimizer<AudioClassifier<B>, B>,
{
    let mut history  = TrainingHistory::new();
    let mut stopper  = plan.early_stopping;
    let mut best: Option<AudioClassifier<B>> = None;

    for epoch in 1..=plan.n_epochs {
        let (trained, train_stats) = train_epoch(
            model, train_loader, optim, train_criterion,
            plan.learning_rate, epoch, &mut history,
        );
        model = trained;

        // model.valid() → AudioClassifier<B::InnerBackend>, dropout disabled
        let val = evaluate(&model.valid(), val_loader, val_criterion);
        history.val_losses.push(val.average_loss);
        history.val_accuracies.push(val.accuracy);

        tracing::info!(
            "epoch n.{} : Val Average Loss = {:.6}, Val Accuracy = {:.2}%",
            epoch, val.average_loss, val.accuracy
        );

        if let Some(metrics) = sinks.metrics {
            metrics.log(&EpochMetrics::new(
                epoch,
                train_stats.average_loss,
                train_stats.accuracy,
                val.average_loss,
                val.accuracy,
            ))?;
        }

        match stopper.observe(val.average_loss) {
            Verdict::Improved => {
                history.best_val_loss = val.average_loss;
                history.best_epoch    = epoch;
                if let Some(ckpt) = sinks.checkpoints {
                    ckpt.save_model(&model, epoch)?;
                }
                best = Some(model.clone());
            }
            Verdict::NoImprovement => {}
            Verdict::Stop => {
                tracing::info!(
                    "Early stopping! No improvement for {} epochs.",
                    stopper.patience()
                );
                history.stopped_early = true;
                break;
            }
        }
    }

    tracing::info!("Training finished.");
    Ok((best.unwrap_or(model), history))
}

// ─── Entry point ──────────────────────────────────────────────────────────────
/// Build model, Adam optimiser, weighted/unweighted criteria and loaders,
/// then run `train_epochs` on `device`.
pub fn run_training<B: AutodiffBackend>(
    cfg:           &TrainConfig,
    train_dataset: ModifiedDataset,
    val_dataset:   ModifiedDataset,
    class_weights: Option<Vec<f32>>,
    sinks:         TrainSinks<'_>,
    device:        B::Device,
) -> Result<(AudioClassifier<B>, TrainingHistory)> {
    let model_cfg = cfg.model_config(train_dataset.labels().len());
    let model: AudioClassifier<B> = model_cfg.init(&device);
    tracing::info!(
        "Model ready: {} conv blocks {:?}, {} classes",
        model_cfg.channels.len(), model_cfg.channels, model_cfg.num_classes
    );

    let mut optim = AdamConfig::new().with_epsilon(1e-8).init();

    // Weighted loss for training only; validation reports the plain loss
    let train_criterion = CrossEntropyLossConfig::new()
        .with_weights(class_weights)
        .init(&device);
    let val_criterion = CrossEntropyLossConfig::new().init(&device);

    let train_loader = DataLoaderBuilder::new(ClipBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(cfg.num_workers)
        .build(train_dataset);

    let val_loader = DataLoaderBuilder::new(ClipBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(cfg.num_workers)
        .build(val_dataset);

    let plan = EpochPlan {
        n_epochs:       cfg.epochs,
        learning_rate:  cfg.lr,
        early_stopping: EarlyStopping::new(cfg.patience, cfg.min_improvement),
    };

    train_epochs(
        model,
        train_loader.as_ref(),
        val_loader.as_ref(),
        &mut optim,
        &train_criterion,
        &val_criterion,
        plan,
        sinks,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, Autodiff, NdArray};

    use crate::data::dataset::ClipItem;
    use crate::data::preprocessor::AudioTransform;
    use crate::domain::clip::LabelSet;
    use crate::ml::model::AudioClassifierConfig;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_early_stopping_counts_stale_epochs() {
        let mut es = EarlyStopping::new(2, 0.01);
        assert_eq!(es.observe(1.0), Verdict::Improved);
        assert_eq!(es.observe(0.995), Verdict::NoImprovement); // below min_improvement
        assert_eq!(es.observe(0.5), Verdict::Improved);        // counter resets
        assert_eq!(es.observe(0.6), Verdict::NoImprovement);
        assert_eq!(es.observe(0.7), Verdict::Stop);
        assert_eq!(es.best(), 0.5);
    }

    #[test]
    fn test_nan_loss_never_improves() {
        let mut es = EarlyStopping::new(1, 0.0);
        assert_eq!(es.observe(f64::NAN), Verdict::Stop);
    }

    /// Two trivially separable classes: all-low vs all-high spectrograms.
    fn toy_dataset(n: usize) -> ModifiedDataset {
        let items = (0..n)
            .map(|i| {
                let label = i % 2;
                ClipItem {
                    waveform:    vec![0.0; 4],
                    sample_rate: 8000,
                    label,
                    mels:        vec![if label == 0 { -1.0 } else { 1.0 }; 8 * 8],
                    mel_shape:   [8, 8],
                    og_label:    format!("c{label}"),
                }
            })
            .collect();
        ModifiedDataset::from_items(items, LabelSet::new(["c0", "c1"]), AudioTransform::default())
    }

    #[test]
    fn test_train_epochs_records_curves() {
        let device = NdArrayDevice::Cpu;
        let model: AudioClassifier<TestBackend> = AudioClassifierConfig::new(2)
            .with_channels(vec![4, 8])
            .with_dropout(0.0)
            .init(&device);
        let mut optim = AdamConfig::new().init();

        let train_loader = DataLoaderBuilder::new(ClipBatcher::<TestBackend>::new(device.clone()))
            .batch_size(4)
            .shuffle(1)
            .build(toy_dataset(16));
        let val_loader = DataLoaderBuilder::new(ClipBatcher::<NdArray>::new(device.clone()))
            .batch_size(4)
            .build(toy_dataset(8));

        let train_ce = CrossEntropyLossConfig::new().with_weights(Some(vec![1.0, 1.0])).init(&device);
        let val_ce   = CrossEntropyLossConfig::new().init(&device);

        let plan = EpochPlan {
            n_epochs:       3,
            learning_rate:  1e-2,
            early_stopping: EarlyStopping::new(5, 0.0),
        };

        let (_, history) = train_epochs(
            model,
            train_loader.as_ref(),
            val_loader.as_ref(),
            &mut optim,
            &train_ce,
            &val_ce,
            plan,
            TrainSinks::default(),
        )
        .unwrap();

        assert_eq!(history.epochs_run(), 3);
        assert_eq!(history.val_losses.len(), 3);
        assert!(history.train_losses.iter().all(|l| l.is_finite()));
        assert!(history.train_accuracies.iter().all(|a| (0.0..=100.0).contains(a)));
        assert!(history.best_epoch >= 1);
        assert!(!history.stopped_early);
    }

    #[test]
    fn test_train_epochs_keeps_best_epoch_not_last() {
        let device = NdArrayDevice::Cpu;
        let cfg    = AudioClassifierConfig::new(2).with_channels(vec![4, 8]).with_dropout(0.0);
        let model: AudioClassifier<TestBackend> = cfg.init(&device);
        let mut optim = AdamConfig::new().init();

        let train_loader = DataLoaderBuilder::new(ClipBatcher::<TestBackend>::new(device.clone()))
            .batch_size(4)
            .shuffle(7)
            .build(toy_dataset(16));
        let val_loader = DataLoaderBuilder::new(ClipBatcher::<NdArray>::new(device.clone()))
            .batch_size(4)
            .build(toy_dataset(8));

        let ce     = CrossEntropyLossConfig::new().init(&device);
        let val_ce = CrossEntropyLossConfig::new().init(&device);

        let dir  = std::env::temp_dir().join(format!("mel_classifier_trainer_best_{}", std::process::id()));
        let ckpt = CheckpointManager::new(&dir).unwrap();

        // Only the first epoch can beat +inf by more than 1e9.
        let plan = EpochPlan {
            n_epochs:       3,
            learning_rate:  1e-2,
            early_stopping: EarlyStopping::new(10, 1e9),
        };

        let (best, history) = train_epochs(
            model, train_loader.as_ref(), val_loader.as_ref(),
            &mut optim, &ce, &val_ce, plan,
            TrainSinks { checkpoints: Some(&ckpt), metrics: None },
        )
        .unwrap();

        assert_eq!(history.epochs_run(), 3);
        assert_eq!(history.best_epoch, 1);
        assert_eq!(ckpt.best_epoch().unwrap(), 1);

        let first = history.val_losses[0];
        let last  = history.val_losses[2];
        assert!((first - last).abs() > 1e-6, "training did not move the loss");

        let returned = evaluate(&best.valid(), val_loader.as_ref(), &val_ce).average_loss;
        assert!((returned - first).abs() < 1e-6, "returned {returned}, epoch 1 {first}, last {last}");

        let saved = ckpt.load_model(cfg.init::<NdArray>(&device), &device).unwrap();
        let saved_loss = evaluate(&saved, val_loader.as_ref(), &val_ce).average_loss;
        assert!((saved_loss - first).abs() < 1e-2);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_train_epochs_stops_early_with_zero_patience_budget() {
        let device = NdArrayDevice::Cpu;
        let model: AudioClassifier<TestBackend> = AudioClassifierConfig::new(2)
            .with_channels(vec![4])
            .init(&device);
        let mut optim = AdamConfig::new().init();

        let train_loader = DataLoaderBuilder::new(ClipBatcher::<TestBackend>::new(device.clone()))
            .batch_size(8)
            .build(toy_dataset(8));
        let val_loader = DataLoaderBuilder::new(ClipBatcher::<NdArray>::new(device.clone()))
            .batch_size(8)
            .build(toy_dataset(4));

        let ce     = CrossEntropyLossConfig::new().init(&device);
        let val_ce = CrossEntropyLossConfig::new().init(&device);

        // An impossible improvement threshold: epoch 1 can't beat +inf by
        // more than +inf, so every epoch counts as stale.
        let plan = EpochPlan {
            n_epochs:       10,
            learning_rate:  1e-3,
            early_stopping: EarlyStopping::new(2, f64::INFINITY),
        };

        let (_, history) = train_epochs(
            model, train_loader.as_ref(), val_loader.as_ref(),
            &mut optim, &ce, &val_ce, plan, TrainSinks::default(),
        )
        .unwrap();

        assert!(history.stopped_early);
        assert_eq!(history.epochs_run(), 2);
        assert_eq!(history.best_epoch, 0);
    }
}
