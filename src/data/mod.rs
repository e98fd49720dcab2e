// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between WAV files on disk and tensor batches:
//
//   <dir>/<class>/*.wav
//       │
//       ▼
//   WavFolderSource   → indexes (path, label), decodes on demand
//       │
//       ▼
//   AudioTransform    → mix down, resample, cut/pad
//       │
//       ▼
//   MelSpectrogram    → STFT + mel filterbank
//       │
//       ▼
//   ModifiedDataset   → implements Burn's Dataset trait
//       │
//       ▼
//   ClipBatcher       → [batch, 1, n_mels, frames] tensors
//       │
//       ▼
//   DataLoader        → feeds batches to the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Scans class folders and decodes WAV files with hound
pub mod loader;

/// Mix-down, resampling and fixed-length cut/pad
pub mod preprocessor;

/// STFT, mel filterbank and decibel conversion
pub mod spectrogram;

/// modify_data and the Burn Dataset over processed clips
pub mod dataset;

/// Burn Batcher producing spectrogram batches
pub mod batcher;

/// Seeded train/validation/test splits
pub mod splitter;

/// Exact and sampled class distributions and class weights
pub mod distribution;
