// ============================================================
// Layer 4 — Audio Preprocessor
// ============================================================
// Brings every clip to the same shape before it reaches the
// spectrogram:
//
//   1. mix_down   — average all channels into one
//   2. resample   — convert to the fixed target sample rate
//   3. cut_or_pad — truncate or right-pad to num_samples
//   4. mel        — MelSpectrogram at the target rate
//
// After this every item has identical waveform length and
// identical mel shape, so the batcher can stack them directly.

use serde::{Deserialize, Serialize};

use crate::data::spectrogram::{MelConfig, MelSpectrogram, Spectrogram};
use crate::domain::clip::AudioClip;

/// The fixed-shape transform applied to every clip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioTransform {
    pub target_sample_rate: u32,
    pub num_samples:        usize,
    pub mel:                MelConfig,
}

impl Default for AudioTransform {
    fn default() -> Self {
        Self {
            target_sample_rate: 22050,
            num_samples:        22050,
            mel:                MelConfig::default(),
        }
    }
}

impl AudioTransform {
    pub fn new(target_sample_rate: u32, num_samples: usize, mel: MelConfig) -> Self {
        Self { target_sample_rate, num_samples, mel }
    }

    /// Shape of the mel spectrogram every processed clip produces
    pub fn mel_shape(&self) -> [usize; 2] {
        [self.mel.n_mels, self.mel.num_frames(self.num_samples)]
    }

    pub fn mel_spectrogram(&self) -> MelSpectrogram {
        MelSpectrogram::new(self.target_sample_rate, self.mel.clone())
    }

    /// Run the full pipeline on one clip.
    /// Returns the processed mono waveform and its mel spectrogram.
    pub fn apply(&self, clip: &AudioClip, mel: &MelSpectrogram) -> (Vec<f32>, Spectrogram) {
        let mono      = mix_down(&clip.waveform);
        let resampled = resample(&mono, clip.sample_rate, self.target_sample_rate);
        let fixed     = cut_or_pad(resampled, self.num_samples);
        let mels      = mel.compute(&fixed);
        (fixed, mels)
    }
}

/// Average all channels into a single channel.
pub fn mix_down(waveform: &[Vec<f32>]) -> Vec<f32> {
    match waveform {
        [] => Vec::new(),
        [only] => only.clone(),
        channels => {
            let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
            let n      = channels.len() as f32;
            (0..frames)
                .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() / n)
                .collect()
        }
    }
}

/// Linear-interpolation resampler.
/// Output length is `round(len * to / from)`.
pub fn resample(signal: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || to == 0 || signal.is_empty() {
        return signal.to_vec();
    }

    let ratio   = from as f64 / to as f64;
    let out_len = ((signal.len() as f64) * to as f64 / from as f64).round() as usize;
    let last    = signal.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos  = i as f64 * ratio;
            let idx  = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            signal[idx] * (1.0 - frac) + signal[next] * frac
        })
        .collect()
}

/// Truncate to `num_samples`, or right-pad with zeros.
pub fn cut_or_pad(mut signal: Vec<f32>, num_samples: usize) -> Vec<f32> {
    signal.resize(num_samples, 0.0);
    signal
}
