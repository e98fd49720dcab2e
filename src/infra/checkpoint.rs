// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// Only the best model (lowest validation loss) is kept:
//
//   checkpoints/
//     best_model.mpk.gz     ← weights of the best epoch
//     best_epoch.json       ← which epoch that was
//     train_config.json     ← transform + model hyperparameters
//     history.json          ← learning curves of the last run
//
// The config is saved separately because the model and the
// audio transform must be rebuilt exactly before the weights
// can be loaded back into them.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use std::{fs, path::{Path, PathBuf}};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::AudioClassifier;
use crate::ml::trainer::TrainingHistory;

const MODEL_FILE:   &str = "best_model";
const EPOCH_FILE:   &str = "best_epoch.json";
const CONFIG_FILE:  &str = "train_config.json";
const HISTORY_FILE: &str = "history.json";

/// Manages saving and loading of checkpoints in one directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create the manager, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    /// Open an existing checkpoint directory without creating it.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        anyhow::ensure!(
            dir.is_dir(),
            "Checkpoint directory '{}' does not exist. Have you run 'train' first?",
            dir.display()
        );
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Overwrite the best-model checkpoint with `model` from `epoch`.
    pub fn save_model<B: Backend>(&self, model: &AudioClassifier<B>, epoch: usize) -> Result<()> {
        let path = self.dir.join(MODEL_FILE);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        fs::write(self.dir.join(EPOCH_FILE), serde_json::to_string(&epoch)?)
            .with_context(|| format!("Failed to write {EPOCH_FILE}"))?;

        tracing::debug!("Saved best model from epoch {}", epoch);
        Ok(())
    }

    /// Load the best-model weights into `model` (which must have the
    /// same architecture).
    pub fn load_model<B: Backend>(
        &self,
        model:  AudioClassifier<B>,
        device: &B::Device,
    ) -> Result<AudioClassifier<B>> {
        let epoch = self.best_epoch()?;
        let path  = self.dir.join(MODEL_FILE);
        tracing::info!("Loading best model (epoch {})", epoch);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Have you trained the model first?", path.display())
            })?;

        Ok(model.load_record(record))
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot read config from '{}'. Make sure you have run 'train' first.",
                path.display()
            )
        })?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config in '{}'", path.display()))
    }

    pub fn save_history(&self, history: &TrainingHistory) -> Result<()> {
        let path = self.dir.join(HISTORY_FILE);
        fs::write(&path, serde_json::to_string_pretty(history)?)
            .with_context(|| format!("Cannot write history to '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_history(&self) -> Result<TrainingHistory> {
        let path = self.dir.join(HISTORY_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read history from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Epoch of the saved best model.
    pub fn best_epoch(&self) -> Result<usize> {
        let s = fs::read_to_string(self.dir.join(EPOCH_FILE))
            .with_context(|| format!("Cannot find '{EPOCH_FILE}'. Have you run 'train' first?"))?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{ndarray::NdArrayDevice, NdArray};
    use crate::ml::model::AudioClassifierConfig;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mel_classifier_ckpt_{name}_{}", std::process::id()))
    }

    #[test]
    fn test_model_round_trip_preserves_outputs() {
        let dir    = temp_dir("model");
        let ckpt   = CheckpointManager::new(&dir).unwrap();
        let device = NdArrayDevice::Cpu;
        let cfg    = AudioClassifierConfig::new(3).with_channels(vec![4, 4]);

        let model: AudioClassifier<NdArray> = cfg.init(&device);
        ckpt.save_model(&model, 4).unwrap();
        assert_eq!(ckpt.best_epoch().unwrap(), 4);

        let fresh: AudioClassifier<NdArray> = cfg.init(&device);
        let loaded = ckpt.load_model(fresh, &device).unwrap();

        let input = Tensor::<NdArray, 4>::ones([1, 1, 8, 8], &device);
        let a: Vec<f32> = model.forward(input.clone()).into_data().to_vec().unwrap();
        let b: Vec<f32> = loaded.forward(input).into_data().to_vec().unwrap();
        // CompactRecorder stores half precision weights
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-3, "{x} vs {y}");
        }
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = temp_dir("config");
        let ckpt = CheckpointManager::new(&dir).unwrap();
        let cfg  = TrainConfig { epochs: 3, seed: 99, ..TrainConfig::default() };
        ckpt.save_config(&cfg).unwrap();

        let back = ckpt.load_config().unwrap();
        assert_eq!(back.epochs, 3);
        assert_eq!(back.seed, 99);
        assert_eq!(back.labels, cfg.labels);
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_open_missing_dir_fails() {
        assert!(CheckpointManager::open(temp_dir("never_created")).is_err());
    }
}
