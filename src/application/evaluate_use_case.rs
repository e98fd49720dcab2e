// ============================================================
// Layer 2 — TestUseCase / PredictUseCase
// ============================================================
// Both workflows start the same way:
//
//   1. Read train_config.json from the checkpoint directory
//   2. Rebuild the model with the saved hyper-parameters
//   3. Load the best weights into it
//
// `test` then runs the whole model over a folder of clips
// (by default the held-out test split of the training folder),
// `predict` runs it over a single WAV file.

use anyhow::{Context, Result};
use burn::{
    backend::{ndarray::NdArrayDevice, wgpu::WgpuDevice, NdArray, Wgpu},
    data::dataloader::DataLoaderBuilder,
    nn::loss::CrossEntropyLossConfig,
    prelude::*,
};
use std::path::{Path, PathBuf};

use crate::application::train_use_case::{prepare_splits, TrainConfig};
use crate::data::{
    batcher::ClipBatcher,
    dataset::{modify_data, process_clip, ModifiedDataset},
    loader::{read_wav, WavFolderSource},
};
use crate::domain::clip::{AudioClip, LabelSet};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    evaluator::{class_probabilities, predict, test_model, top_class, EvalReport},
    model::AudioClassifier,
};

// ─── Shared loading ──────────────────────────────────────────────────────────
/// A trained model together with everything needed to feed it.
pub struct TrainedModel<B: Backend> {
    pub model:  AudioClassifier<B>,
    pub labels: LabelSet,
    pub config: TrainConfig,
}

impl<B: Backend> TrainedModel<B> {
    /// Rebuild the architecture from `train_config.json` and load the best weights.
    pub fn load(checkpoint_dir: &Path, device: &B::Device) -> Result<Self> {
        let ckpt   = CheckpointManager::open(checkpoint_dir)?;
        let config = ckpt.load_config()?;
        let names  = config
            .labels
            .clone()
            .context("train_config.json has no label list")?;
        let labels = LabelSet::new(names);

        let model = config.model_config(labels.len()).init::<B>(device);
        let model = ckpt.load_model(model, device)?;
        Ok(Self { model, labels, config })
    }
}

// ─── TestUseCase ──────────────────────────────────────────────────────────────
pub struct TestUseCase {
    checkpoint_dir: PathBuf,
    /// Folder to evaluate; None means the training folder's test split
    data_dir:       Option<PathBuf>,
    cpu:            bool,
}

impl TestUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>, data_dir: Option<PathBuf>, cpu: bool) -> Self {
        Self { checkpoint_dir: checkpoint_dir.into(), data_dir, cpu }
    }

    pub fn execute(&self) -> Result<EvalReport> {
        if self.cpu {
            self.execute_on::<NdArray>(NdArrayDevice::Cpu)
        } else {
            self.execute_on::<Wgpu>(WgpuDevice::default())
        }
    }

    pub fn execute_on<B: Backend>(&self, device: B::Device) -> Result<EvalReport> {
        let trained = TrainedModel::<B>::load(&self.checkpoint_dir, &device)?;
        let cfg     = &trained.config;

        let dataset: ModifiedDataset = match &self.data_dir {
            Some(dir) => {
                tracing::info!("Evaluating every clip in '{}'", dir.display());
                let source = WavFolderSource::scan(dir)?;
                modify_data(&source, cfg.transform.clone(), trained.labels.clone())?
            }
            None => {
                tracing::info!("Evaluating the held-out test split of '{}'", cfg.data_dir);
                prepare_splits(cfg)?.test
            }
        };
        anyhow::ensure!(!dataset.items().is_empty(), "No clips to evaluate");

        let loader = DataLoaderBuilder::new(ClipBatcher::<B>::new(device.clone()))
            .batch_size(cfg.batch_size)
            .num_workers(cfg.num_workers)
            .build(dataset);
        let criterion = CrossEntropyLossConfig::new().init(&device);

        Ok(test_model(&trained.model, loader.as_ref(), &criterion))
    }
}

// ─── PredictUseCase ───────────────────────────────────────────────────────────
/// Outcome of classifying one file.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub predicted: String,
    /// The class folder the file lives in, when it is one of the known labels
    pub expected:  Option<String>,
}

impl Prediction {
    pub fn is_correct(&self) -> Option<bool> {
        self.expected.as_ref().map(|e| *e == self.predicted)
    }
}

pub struct PredictUseCase {
    checkpoint_dir: PathBuf,
    cpu:            bool,
}

impl PredictUseCase {
    pub fn new(checkpoint_dir: impl Into<PathBuf>, cpu: bool) -> Self {
        Self { checkpoint_dir: checkpoint_dir.into(), cpu }
    }

    pub fn classify(&self, wav: &Path) -> Result<Prediction> {
        if self.cpu {
            self.classify_on::<NdArray>(wav, NdArrayDevice::Cpu)
        } else {
            self.classify_on::<Wgpu>(wav, WgpuDevice::default())
        }
    }

    pub fn classify_on<B: Backend>(&self, wav: &Path, device: B::Device) -> Result<Prediction> {
        let trained = TrainedModel::<B>::load(&self.checkpoint_dir, &device)?;
        classify_file(&trained, wav, &device)
    }
}

/// Classify `wav` with an already loaded model. The parent folder name
/// is taken as the expected label when the model knows it.
pub fn classify_file<B: Backend>(trained: &TrainedModel<B>, wav: &Path, device: &B::Device) -> Result<Prediction> {
    let (waveform, sample_rate) = read_wav(wav)?;
    let folder = wav
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let transform = &trained.config.transform;
    let mel       = transform.mel_spectrogram();
    let clip      = AudioClip::new(wav.display().to_string(), waveform, sample_rate, folder.clone());

    match trained.labels.index_of(&folder) {
        Some(label) => {
            let item = process_clip(clip, label, transform, &mel);
            let (predicted, expected) = predict(&trained.model, &item, &trained.labels, device)?;
            Ok(Prediction { predicted, expected: Some(expected) })
        }
        None => {
            // label is ignored by the forward pass
            let item  = process_clip(clip, 0, transform, &mel);
            let probs = class_probabilities(&trained.model, &item, device)?;
            let (best, confidence) = top_class(&probs);
            let predicted = trained
                .labels
                .name_of(best)
                .with_context(|| format!("Model predicted unknown class {best}"))?
                .to_string();
            tracing::debug!("Predicted '{}' ({:.3}) for '{}'", predicted, confidence, wav.display());
            Ok(Prediction { predicted, expected: None })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::write_wav_mono;
    use crate::data::preprocessor::AudioTransform;
    use crate::data::spectrogram::MelConfig;
    use crate::ml::model::AudioClassifierConfig;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mel_classifier_eval_{name}_{}", std::process::id()))
    }

    /// Save an untrained two-class model the way training would.
    fn fake_checkpoint(dir: &Path) -> TrainConfig {
        let device = NdArrayDevice::Cpu;
        let cfg = TrainConfig {
            labels:    Some(vec!["dog".to_string(), "rain".to_string()]),
            transform: AudioTransform::new(8000, 2000, MelConfig { n_fft: 256, hop_length: 128, n_mels: 8, ..MelConfig::default() }),
            channels:  vec![4],
            ..TrainConfig::default()
        };
        let ckpt = CheckpointManager::new(dir).unwrap();
        ckpt.save_config(&cfg).unwrap();
        let model: AudioClassifier<NdArray> = cfg.model_config(2).init(&device);
        ckpt.save_model(&model, 1).unwrap();
        cfg
    }

    #[test]
    fn test_prediction_correctness() {
        let p = Prediction { predicted: "dog".into(), expected: Some("dog".into()) };
        assert_eq!(p.is_correct(), Some(true));
        let p = Prediction { predicted: "dog".into(), expected: None };
        assert_eq!(p.is_correct(), None);
    }

    #[test]
    fn test_classify_uses_folder_as_expected_label() {
        let root = temp_dir("predict");
        fake_checkpoint(&root.join("ckpt"));
        std::fs::create_dir_all(root.join("rain")).unwrap();
        std::fs::create_dir_all(root.join("misc")).unwrap();
        let known   = root.join("rain").join("a.wav");
        let unknown = root.join("misc").join("b.wav");
        write_wav_mono(&known, &[0.1; 3000], 16000).unwrap();
        write_wav_mono(&unknown, &[0.1; 1000], 8000).unwrap();

        let uc = PredictUseCase::new(root.join("ckpt"), true);
        let p  = uc.classify_on::<NdArray>(&known, NdArrayDevice::Cpu).unwrap();
        assert_eq!(p.expected.as_deref(), Some("rain"));
        assert!(["dog", "rain"].contains(&p.predicted.as_str()));

        let p = uc.classify_on::<NdArray>(&unknown, NdArrayDevice::Cpu).unwrap();
        assert!(p.expected.is_none());
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_evaluate_explicit_folder() {
        let root = temp_dir("test");
        fake_checkpoint(&root.join("ckpt"));
        for class in ["dog", "rain"] {
            let dir = root.join("audio").join(class);
            std::fs::create_dir_all(&dir).unwrap();
            write_wav_mono(&dir.join("x.wav"), &[0.2; 2000], 8000).unwrap();
        }

        let report = TestUseCase::new(root.join("ckpt"), Some(root.join("audio")), true)
            .execute_on::<NdArray>(NdArrayDevice::Cpu)
            .unwrap();
        assert_eq!(report.total, 2);
        std::fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_missing_checkpoint_is_reported() {
        let uc = PredictUseCase::new(temp_dir("nothing_here"), true);
        assert!(uc.classify_on::<NdArray>(Path::new("x.wav"), NdArrayDevice::Cpu).is_err());
    }
}
