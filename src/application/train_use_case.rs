// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Scan the class folders          (Layer 4 - data)
//   Step 2: Resolve the label list          (Layer 3 - domain)
//   Step 3: Transform every clip            (Layer 4 - data)
//   Step 4: Split train/validation/test     (Layer 4 - data)
//   Step 5: Class weights (optional)        (Layer 4 - data)
//   Step 6: Save config                     (Layer 6 - infra)
//   Step 7: Run training loop               (Layer 5 - ml)
//   Step 8: Save learning curves            (Layer 6 - infra)
//   Step 9: Evaluate the held-out test set  (Layer 5 - ml)
//
// Reference: Burn Book §5 (Training)

use anyhow::{ensure, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, Autodiff, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{
    batcher::ClipBatcher,
    dataset::{modify_data, ModifiedDataset},
    distribution::{class_distrib, class_distrib_approx},
    loader::WavFolderSource,
    preprocessor::AudioTransform,
    splitter::split_train_val_test,
};
use crate::domain::{clip::LabelSet, traits::ClipSource};
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger, plots};
use crate::ml::{
    evaluator::{test_model, EvalReport},
    model::AudioClassifierConfig,
    trainer::{run_training, TrainSinks, TrainingHistory},
};

pub type GpuTrainBackend = Autodiff<Wgpu>;
pub type CpuTrainBackend = Autodiff<NdArray>;

// ─── Class weighting ─────────────────────────────────────────────────────────
/// How the training loss weights each class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeighting {
    /// Plain cross-entropy
    #[default]
    None,
    /// Weights from the exact distribution of the training split
    Exact,
    /// Weights estimated from `samples` randomly chosen training clips
    Approx { samples: usize },
}

// ─── Training Configuration ──────────────────────────────────────────────────
// Every knob of a training run. Saved next to the checkpoint so
// `test` and `predict` can rebuild the exact transform, label order,
// model and split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:        String,
    pub checkpoint_dir:  String,
    /// Class names in label order; None means "the folder names, sorted"
    pub labels:          Option<Vec<String>>,
    pub transform:       AudioTransform,
    pub batch_size:      usize,
    pub epochs:          usize,
    pub lr:              f64,
    pub patience:        usize,
    pub min_improvement: f64,
    pub val_fraction:    f64,
    pub test_fraction:   f64,
    pub seed:            u64,
    pub num_workers:     usize,
    pub class_weights:   ClassWeighting,
    pub channels:        Vec<usize>,
    pub dropout:         f64,
    pub cpu:             bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:        "data/audio".to_string(),
            checkpoint_dir:  "checkpoints".to_string(),
            labels:          None,
            transform:       AudioTransform::default(),
            batch_size:      32,
            epochs:          30,
            lr:              1e-3,
            patience:        5,
            min_improvement: 0.001,
            val_fraction:    0.15,
            test_fraction:   0.15,
            seed:            42,
            num_workers:     2,
            class_weights:   ClassWeighting::None,
            channels:        vec![16, 32, 64, 128],
            dropout:         0.2,
            cpu:             false,
        }
    }
}

impl TrainConfig {
    /// Model hyper-parameters for `num_classes` outputs.
    pub fn model_config(&self, num_classes: usize) -> AudioClassifierConfig {
        AudioClassifierConfig::new(num_classes)
            .with_channels(self.channels.clone())
            .with_dropout(self.dropout)
    }

    /// Reject settings that would only fail deep inside burn or a reshape.
    pub fn validate(&self) -> Result<()> {
        let t = &self.transform;
        ensure!(self.batch_size > 0, "batch_size must be at least 1");
        ensure!(self.epochs > 0, "epochs must be at least 1");
        ensure!(self.lr > 0.0, "lr must be positive, got {}", self.lr);
        ensure!(t.target_sample_rate > 0, "sample_rate must be positive");
        ensure!(t.num_samples > 0, "num_samples must be at least 1");
        ensure!(t.mel.n_fft > 0 && t.mel.hop_length > 0, "n_fft and hop_length must be at least 1");
        ensure!(t.mel.n_mels > 0, "n_mels must be at least 1");
        ensure!(
            !self.channels.is_empty() && self.channels.iter().all(|&c| c > 0),
            "channels must be a non-empty list of positive sizes, got {:?}",
            self.channels
        );
        ensure!((0.0..1.0).contains(&self.dropout), "dropout must be in [0, 1), got {}", self.dropout);
        ensure!(
            self.val_fraction >= 0.0 && self.test_fraction >= 0.0 && self.val_fraction + self.test_fraction < 1.0,
            "val_fraction + test_fraction must leave room for training (got {} + {})",
            self.val_fraction,
            self.test_fraction
        );
        Ok(())
    }

    /// The fixed label list, or the classes discovered in `source`.
    pub fn resolve_labels(&self, source: &WavFolderSource) -> LabelSet {
        match &self.labels {
            Some(names) => LabelSet::new(names.iter().cloned()),
            None        => source.discovered_labels(),
        }
    }
}

/// Transformed clips of a training folder, split three ways.
pub struct PreparedSplits {
    pub labels: LabelSet,
    pub train:  ModifiedDataset,
    pub val:    ModifiedDataset,
    pub test:   ModifiedDataset,
}

/// Scan `cfg.data_dir`, transform every clip and split with `cfg.seed`.
/// Deterministic for a given folder and config, so the test split can
/// be rebuilt after training.
pub fn prepare_splits(cfg: &TrainConfig) -> Result<PreparedSplits> {
    tracing::info!("Scanning audio clips in '{}'", cfg.data_dir);
    let source = WavFolderSource::scan(&cfg.data_dir)?;
    let labels = cfg.resolve_labels(&source);
    ensure!(!labels.is_empty(), "No classes found in '{}'", cfg.data_dir);
    tracing::info!("Found {} clips in {} classes: {:?}", source.len(), labels.len(), labels.names());

    let dataset   = modify_data(&source, cfg.transform.clone(), labels.clone())?;
    let transform = dataset.transform().clone();
    let (train, val, test) = split_train_val_test(
        dataset.into_items(),
        cfg.val_fraction,
        cfg.test_fraction,
        cfg.seed,
    );
    tracing::info!("Split: {} train, {} validation, {} test", train.len(), val.len(), test.len());

    Ok(PreparedSplits {
        train:  ModifiedDataset::from_items(train, labels.clone(), transform.clone()),
        val:    ModifiedDataset::from_items(val, labels.clone(), transform.clone()),
        test:   ModifiedDataset::from_items(test, labels.clone(), transform),
        labels,
    })
}

/// Dense class-weight vector for the training split, if requested.
pub fn class_weights(
    mode:    ClassWeighting,
    train:   &ModifiedDataset,
    seed:    u64,
) -> Result<Option<Vec<f32>>> {
    let n_classes = train.labels().len();
    let distribution = match mode {
        ClassWeighting::None => return Ok(None),
        ClassWeighting::Exact => class_distrib(train, "train")?,
        ClassWeighting::Approx { samples } => {
            let mut rng = StdRng::seed_from_u64(seed);
            class_distrib_approx(train, samples, "train", &mut rng)?
        }
    };
    let weights = distribution.weight_vector(n_classes);
    tracing::info!("Class weights: {:?}", weights);
    Ok(Some(weights))
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub history: TrainingHistory,
    pub test:    Option<EvalReport>,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline on the configured backend.
    pub fn execute(&self) -> Result<TrainSummary> {
        if self.config.cpu {
            tracing::info!("Training on CPU (NdArray)");
            self.execute_on::<CpuTrainBackend>(NdArrayDevice::Cpu)
        } else {
            tracing::info!("Training on GPU (Wgpu)");
            self.execute_on::<GpuTrainBackend>(WgpuDevice::default())
        }
    }

    /// Execute the pipeline on any autodiff backend.
    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainSummary> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Steps 1-4: scan, label, transform, split ─────────────────────────
        let splits = prepare_splits(cfg)?;
        ensure!(
            !splits.train.items().is_empty() && !splits.val.items().is_empty(),
            "Need at least one training and one validation clip (got {} / {})",
            splits.train.items().len(),
            splits.val.items().len()
        );

        // ── Step 5: class weights from the training split only ───────────────
        let weights = class_weights(cfg.class_weights, &splits.train, cfg.seed)?;

        // ── Step 6: persist the resolved config for test / predict ───────────
        let ckpt = CheckpointManager::new(&cfg.checkpoint_dir)?;
        let saved = TrainConfig {
            labels: Some(splits.labels.names().to_vec()),
            ..cfg.clone()
        };
        ckpt.save_config(&saved)?;
        let metrics = MetricsLogger::new(&cfg.checkpoint_dir)?;

        // ── Step 7: training loop (Layer 5) ──────────────────────────────────
        let sinks = TrainSinks { checkpoints: Some(&ckpt), metrics: Some(&metrics) };
        let (model, history) = run_training::<B>(
            &saved,
            splits.train,
            splits.val,
            weights,
            sinks,
            device.clone(),
        )?;

        // ── Step 8: learning curves ──────────────────────────────────────────
        ckpt.save_history(&history)?;
        let curves = ckpt.dir().join("learning_curves.png");
        if let Err(e) = plots::save_png(&curves, (1200, 500), |area| plots::plot_learning_curves(area, &history)) {
            tracing::warn!("Could not draw learning curves: {e:#}");
        }

        // ── Step 9: held-out test set ────────────────────────────────────────
        let test = if splits.test.items().is_empty() {
            tracing::info!("Test split is empty, skipping test evaluation");
            None
        } else {
            let loader = DataLoaderBuilder::new(ClipBatcher::<B::InnerBackend>::new(device.clone()))
                .batch_size(cfg.batch_size)
                .num_workers(cfg.num_workers)
                .build(splits.test);
            let criterion = CrossEntropyLossConfig::new().init(&device);
            Some(test_model(&model.valid(), loader.as_ref(), &criterion))
        };

        Ok(TrainSummary { history, test })
    }
}
