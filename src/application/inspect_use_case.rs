// ============================================================
// Layer 2 — DistribUseCase / PlotUseCase
// ============================================================
// Dataset and signal inspection, no model involved.
//
//   distrib — label counts of a clip folder, exact or sampled,
//             plus the class weights they imply and a bar chart
//
//   plot    — waveform, raw spectrogram and the mel spectrogram
//             the model would see, for one WAV file

use anyhow::Result;
use rand::{rngs::StdRng, SeedableRng};
use std::{fs, path::{Path, PathBuf}};

use crate::data::{
    dataset::SourceLabels,
    distribution::{class_distrib, class_distrib_approx, ClassDistribution},
    loader::{read_wav, WavFolderSource},
    preprocessor::AudioTransform,
};
use crate::domain::clip::{AudioClip, LabelSet};
use crate::infra::{checkpoint::CheckpointManager, plots};

// ─── DistribUseCase ───────────────────────────────────────────────────────────
pub struct DistribUseCase {
    pub data_dir: PathBuf,
    /// Sample this many clips instead of counting all of them
    pub approx:   Option<usize>,
    pub seed:     u64,
    /// Where to write the bar chart, if anywhere
    pub chart:    Option<PathBuf>,
}

impl DistribUseCase {
    /// Count labels without decoding any audio.
    pub fn execute(&self) -> Result<(ClassDistribution, LabelSet)> {
        let source = WavFolderSource::scan(&self.data_dir)?;
        let labels = source.discovered_labels();
        let view   = SourceLabels::new(&source, &labels);
        let name   = source.root().display().to_string();

        let distribution = match self.approx {
            Some(n) => {
                let mut rng = StdRng::seed_from_u64(self.seed);
                class_distrib_approx(&view, n, &name, &mut rng)?
            }
            None => class_distrib(&view, &name)?,
        };

        if let Some(path) = &self.chart {
            plots::save_png(path, (900, 600), |area| {
                plots::plot_class_distribution(area, &distribution, Some(&labels), &name)
            })?;
        }

        Ok((distribution, labels))
    }
}

// ─── PlotUseCase ──────────────────────────────────────────────────────────────
pub struct PlotUseCase {
    pub wav:       PathBuf,
    pub out_dir:   PathBuf,
    pub transform: AudioTransform,
}

impl PlotUseCase {
    /// Use the transform a trained model was built with, or the default one.
    pub fn with_checkpoint(wav: PathBuf, out_dir: PathBuf, checkpoint_dir: Option<&Path>) -> Result<Self> {
        let transform = match checkpoint_dir {
            Some(dir) => CheckpointManager::open(dir)?.load_config()?.transform,
            None      => AudioTransform::default(),
        };
        Ok(Self { wav, out_dir, transform })
    }

    /// Write waveform.png, specgram.png and mel.png into `out_dir`.
    pub fn execute(&self) -> Result<Vec<PathBuf>> {
        let (waveform, sample_rate) = read_wav(&self.wav)?;
        fs::create_dir_all(&self.out_dir)?;
        let title = self
            .wav
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.wav.display().to_string());

        let clip = AudioClip::new(title.clone(), waveform, sample_rate, "");
        tracing::info!(
            "'{}': {} channel(s), {:.2}s at {} Hz",
            title,
            clip.num_channels(),
            clip.duration_secs(),
            clip.sample_rate
        );

        let wave_png = self.out_dir.join("waveform.png");
        plots::save_png(&wave_png, (1000, 400), |area| {
            plots::plot_waveform(area, &clip.waveform, sample_rate, &title)
        })?;

        let spec_png = self.out_dir.join("specgram.png");
        plots::save_png(&spec_png, (1000, 500), |area| {
            plots::plot_specgram(area, &clip.waveform, sample_rate, &title)
        })?;

        let mel       = self.transform.mel_spectrogram();
        let (_, mels) = self.transform.apply(&clip, &mel);
        let mel_title = format!("{title} (mel)");
        let mel_png   = self.out_dir.join("mel.png");
        plots::save_png(&mel_png, (1000, 500), |area| {
            plots::plot_spectrogram(area, &mels, Some(mel_title.as_str()), "mel bin")
        })?;

        Ok(vec![wave_png, spec_png, mel_png])
    }
}
