// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the five subcommands and their flags:
//
//   train    — fit the classifier on a folder of class folders
//   test     — evaluate the best checkpoint
//   predict  — classify one WAV file
//   distrib  — class distribution of a folder
//   plot     — diagnostic charts for one WAV file
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::train_use_case::{ClassWeighting, TrainConfig};
use crate::data::{preprocessor::AudioTransform, spectrogram::MelConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the classifier on <data-dir>/<class>/*.wav
    Train(TrainArgs),

    /// Evaluate the best checkpoint on the test split or a folder
    Test(TestArgs),

    /// Classify a single WAV file
    Predict(PredictArgs),

    /// Print (and chart) the class distribution of a folder
    Distrib(DistribArgs),

    /// Draw waveform, spectrogram and mel spectrogram of a WAV file
    Plot(PlotArgs),
}

/// `--class-weights` choices
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightArg {
    None,
    Exact,
    Approx,
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Folder with one sub-folder of .wav files per class
    #[arg(long, default_value = "data/audio")]
    pub data_dir: String,

    /// Where the best model, config, metrics and curves are written
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Class names in label order (comma separated); default: folder names
    #[arg(long, value_delimiter = ',')]
    pub labels: Option<Vec<String>>,

    /// Every clip is resampled to this rate
    #[arg(long, default_value_t = 22050)]
    pub sample_rate: u32,

    /// Every clip is cut or zero-padded to this many samples
    #[arg(long, default_value_t = 22050)]
    pub num_samples: usize,

    #[arg(long, default_value_t = 1024)]
    pub n_fft: usize,

    #[arg(long, default_value_t = 512)]
    pub hop_length: usize,

    #[arg(long, default_value_t = 64)]
    pub n_mels: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Upper bound; early stopping may end the run sooner
    #[arg(long, default_value_t = 30)]
    pub epochs: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub lr: f64,

    /// Epochs without improvement before stopping
    #[arg(long, default_value_t = 5)]
    pub patience: usize,

    /// Smallest validation-loss decrease that counts as improvement
    #[arg(long, default_value_t = 0.001)]
    pub min_improvement: f64,

    #[arg(long, default_value_t = 0.15)]
    pub val_fraction: f64,

    #[arg(long, default_value_t = 0.15)]
    pub test_fraction: f64,

    /// Seed for the split, shuffling and sampled class weights
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    #[arg(long, default_value_t = 2)]
    pub num_workers: usize,

    /// Weight the loss by inverse class frequency
    #[arg(long, value_enum, default_value_t = WeightArg::None)]
    pub class_weights: WeightArg,

    /// Clips sampled when --class-weights approx
    #[arg(long, default_value_t = 1000)]
    pub weight_samples: usize,

    /// Output channels of each conv block (comma separated)
    #[arg(long, value_delimiter = ',', default_value = "16,32,64,128")]
    pub channels: Vec<usize>,

    #[arg(long, default_value_t = 0.2)]
    pub dropout: f64,

    /// Use the NdArray CPU backend instead of Wgpu
    #[arg(long)]
    pub cpu: bool,
}

/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let mel = MelConfig {
            n_fft:      a.n_fft,
            hop_length: a.hop_length,
            n_mels:     a.n_mels,
            ..MelConfig::default()
        };
        let class_weights = match a.class_weights {
            WeightArg::None   => ClassWeighting::None,
            WeightArg::Exact  => ClassWeighting::Exact,
            WeightArg::Approx => ClassWeighting::Approx { samples: a.weight_samples },
        };

        TrainConfig {
            data_dir:        a.data_dir,
            checkpoint_dir:  a.checkpoint_dir,
            labels:          a.labels,
            transform:       AudioTransform::new(a.sample_rate, a.num_samples, mel),
            batch_size:      a.batch_size,
            epochs:          a.epochs,
            lr:              a.lr,
            patience:        a.patience,
            min_improvement: a.min_improvement,
            val_fraction:    a.val_fraction,
            test_fraction:   a.test_fraction,
            seed:            a.seed,
            num_workers:     a.num_workers,
            class_weights,
            channels:        a.channels,
            dropout:         a.dropout,
            cpu:             a.cpu,
        }
    }
}

#[derive(Args, Debug)]
pub struct TestArgs {
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Folder to evaluate; default: the test split of the training folder
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    #[arg(long)]
    pub cpu: bool,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// The WAV file to classify
    pub wav: PathBuf,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: PathBuf,

    #[arg(long)]
    pub cpu: bool,
}

#[derive(Args, Debug)]
pub struct DistribArgs {
    #[arg(long, default_value = "data/audio")]
    pub data_dir: PathBuf,

    /// Estimate from this many randomly chosen clips
    #[arg(long)]
    pub approx: Option<usize>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Write a bar chart PNG here
    #[arg(long)]
    pub chart: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PlotArgs {
    /// The WAV file to plot
    pub wav: PathBuf,

    #[arg(long, default_value = "plots")]
    pub out_dir: PathBuf,

    /// Take the mel settings from this checkpoint's train_config.json
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use clap::Parser;

    fn train_config(args: &[&str]) -> TrainConfig {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Train(a) => a.into(),
            other => panic!("expected train, got {other:?}"),
        }
    }

    #[test]
    fn test_train_defaults_match_config_defaults() {
        let cfg = train_config(&["mel-classifier", "train"]);
        let def = TrainConfig::default();
        assert_eq!(cfg.epochs, def.epochs);
        assert_eq!(cfg.channels, def.channels);
        assert_eq!(cfg.transform.num_samples, def.transform.num_samples);
        assert_eq!(cfg.transform.mel.n_mels, def.transform.mel.n_mels);
        assert_eq!(cfg.class_weights, ClassWeighting::None);
        assert!(cfg.labels.is_none());
    }

    #[test]
    fn test_train_flags_are_converted() {
        let cfg = train_config(&[
            "mel-classifier", "train",
            "--labels", "dog,rain",
            "--channels", "8,16",
            "--class-weights", "approx",
            "--weight-samples", "50",
            "--cpu",
        ]);
        assert_eq!(cfg.labels, Some(vec!["dog".to_string(), "rain".to_string()]));
        assert_eq!(cfg.channels, vec![8, 16]);
        assert_eq!(cfg.class_weights, ClassWeighting::Approx { samples: 50 });
        assert!(cfg.cpu);
    }

    #[test]
    fn test_predict_requires_a_file() {
        assert!(Cli::try_parse_from(["mel-classifier", "predict"]).is_err());
        let cli = Cli::try_parse_from(["mel-classifier", "predict", "a.wav"]).unwrap();
        assert!(matches!(cli.command, Commands::Predict(ref a) if a.wav == PathBuf::from("a.wav")));
    }
}
