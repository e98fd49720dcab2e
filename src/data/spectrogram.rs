// ============================================================
// Layer 4 — Spectrograms
// ============================================================
// Turns a mono waveform into the 2-D picture the classifier
// actually looks at.
//
//   waveform ──STFT──► power spectrum [n_fft/2+1, frames]
//            ──mel filterbank──► mel spectrum [n_mels, frames]
//            ──power_to_db──► decibels (plots only)
//
// The STFT uses a periodic Hann window and, when centred,
// reflect-pads n_fft/2 samples on both sides so frame t is
// centred on sample t*hop. The mel filterbank uses the HTK
// mel scale with un-normalised triangular filters.

use rustfft::{num_complex::Complex, FftPlanner};
use serde::{Deserialize, Serialize};

/// A dense row-major 2-D matrix of spectral values.
/// Rows are frequency bins (or mel bands), columns are frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    pub data:   Vec<f32>,
    pub n_rows: usize,
    pub n_cols: usize,
}

impl Spectrogram {
    pub fn new(data: Vec<f32>, n_rows: usize, n_cols: usize) -> Self {
        debug_assert_eq!(data.len(), n_rows * n_cols);
        Self { data, n_rows, n_cols }
    }

    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.n_cols + col]
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.n_rows, self.n_cols]
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn min(&self) -> f32 {
        self.data.iter().copied().fold(f32::INFINITY, f32::min)
    }
}

/// Mel spectrogram parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MelConfig {
    pub n_fft:      usize,
    pub hop_length: usize,
    pub n_mels:     usize,
    pub f_min:      f32,
    /// Upper edge of the top mel band; None means Nyquist
    pub f_max:      Option<f32>,
    /// Exponent applied to the magnitude (2.0 = power)
    pub power:      f32,
}

impl Default for MelConfig {
    fn default() -> Self {
        Self {
            n_fft:      1024,
            hop_length: 512,
            n_mels:     64,
            f_min:      0.0,
            f_max:      None,
            power:      2.0,
        }
    }
}

impl MelConfig {
    /// Number of frames a centred STFT produces for `num_samples` input samples
    pub fn num_frames(&self, num_samples: usize) -> usize {
        let n_fft  = self.n_fft.max(1);
        let padded = num_samples + 2 * (n_fft / 2);
        if padded < n_fft {
            return 0;
        }
        1 + (padded - n_fft) / self.hop_length.max(1)
    }
}

/// Periodic Hann window of length `n`.
pub fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos())
        .collect()
}

/// Short-time Fourier transform returning |X|^power.
///
/// Output shape: [n_fft/2 + 1, frames]. With `center` the signal is
/// reflect-padded so there are `1 + len/hop` frames; without it frames
/// only cover whole windows inside the signal.
pub fn stft_power(signal: &[f32], n_fft: usize, hop: usize, power: f32, center: bool) -> Spectrogram {
    let n_fft = n_fft.max(1);
    let hop   = hop.max(1);
    let n_freqs = n_fft / 2 + 1;

    let padded: Vec<f32> = if center {
        pad_reflect(signal, n_fft / 2)
    } else {
        signal.to_vec()
    };

    let n_frames = if padded.len() >= n_fft {
        1 + (padded.len() - n_fft) / hop
    } else {
        0
    };

    let window  = hann_window(n_fft);
    let mut planner = FftPlanner::<f32>::new();
    let fft     = planner.plan_fft_forward(n_fft);
    let mut buf = vec![Complex::new(0.0f32, 0.0); n_fft];
    let mut data = vec![0.0f32; n_freqs * n_frames];

    for t in 0..n_frames {
        let start = t * hop;
        for (i, slot) in buf.iter_mut().enumerate() {
            *slot = Complex::new(padded[start + i] * window[i], 0.0);
        }
        fft.process(&mut buf);
        for (f, c) in buf.iter().take(n_freqs).enumerate() {
            let mag = c.norm();
            data[f * n_frames + t] = if power == 1.0 { mag } else { mag.powf(power) };
        }
    }

    Spectrogram::new(data, n_freqs, n_frames)
}

/// Reflect padding without repeating the edge sample.
/// Falls back to zero padding when the signal is too short to reflect.
fn pad_reflect(signal: &[f32], pad: usize) -> Vec<f32> {
    if signal.len() <= pad {
        let mut out = vec![0.0; pad];
        out.extend_from_slice(signal);
        out.extend(std::iter::repeat(0.0).take(pad));
        return out;
    }
    let n = signal.len();
    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| signal[i]));
    out.extend_from_slice(signal);
    out.extend((1..=pad).map(|i| signal[n - 1 - i]));
    out
}

pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10f32.powf(mel / 2595.0) - 1.0)
}

/// Triangular HTK mel filterbank, shape [n_mels, n_fft/2 + 1] row-major.
pub fn mel_filterbank(sample_rate: u32, n_fft: usize, n_mels: usize, f_min: f32, f_max: f32) -> Spectrogram {
    let n_freqs = n_fft / 2 + 1;
    let nyquist = sample_rate as f32 / 2.0;

    let all_freqs: Vec<f32> = (0..n_freqs)
        .map(|i| if n_freqs > 1 { nyquist * i as f32 / (n_freqs - 1) as f32 } else { 0.0 })
        .collect();

    let m_min = hz_to_mel(f_min);
    let m_max = hz_to_mel(f_max);
    let f_pts: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(m_min + (m_max - m_min) * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut data = vec![0.0f32; n_mels * n_freqs];
    for m in 0..n_mels {
        let (lo, mid, hi) = (f_pts[m], f_pts[m + 1], f_pts[m + 2]);
        for (k, &f) in all_freqs.iter().enumerate() {
            let down = if mid > lo { (f - lo) / (mid - lo) } else { 0.0 };
            let up   = if hi > mid { (hi - f) / (hi - mid) } else { 0.0 };
            data[m * n_freqs + k] = down.min(up).max(0.0);
        }
    }

    Spectrogram::new(data, n_mels, n_freqs)
}

/// Mel spectrogram transform bound to one sample rate.
#[derive(Debug, Clone)]
pub struct MelSpectrogram {
    config:     MelConfig,
    filterbank: Spectrogram,
}

impl MelSpectrogram {
    pub fn new(sample_rate: u32, config: MelConfig) -> Self {
        let f_max = config.f_max.unwrap_or(sample_rate as f32 / 2.0);
        let filterbank = mel_filterbank(sample_rate, config.n_fft, config.n_mels, config.f_min, f_max);
        Self { config, filterbank }
    }

    /// Mel spectrogram of a mono signal, shape [n_mels, frames].
    pub fn compute(&self, signal: &[f32]) -> Spectrogram {
        let spec = stft_power(signal, self.config.n_fft, self.config.hop_length, self.config.power, true);
        let fb   = &self.filterbank;

        let mut data = vec![0.0f32; fb.n_rows * spec.n_cols];
        for m in 0..fb.n_rows {
            let weights = &fb.data[m * fb.n_cols..(m + 1) * fb.n_cols];
            for (k, &w) in weights.iter().enumerate() {
                if w == 0.0 {
                    continue;
                }
                let row = &spec.data[k * spec.n_cols..(k + 1) * spec.n_cols];
                let out = &mut data[m * spec.n_cols..(m + 1) * spec.n_cols];
                for (o, &p) in out.iter_mut().zip(row) {
                    *o += w * p;
                }
            }
        }

        Spectrogram::new(data, fb.n_rows, spec.n_cols)
    }
}

/// Convert a power spectrogram to decibels.
///
/// `10*log10(max(amin, S)) - 10*log10(max(amin, reference))`, then
/// clipped from below at `max - top_db` when `top_db` is set.
pub fn power_to_db(spec: &Spectrogram, reference: f32, amin: f32, top_db: Option<f32>) -> Spectrogram {
    let ref_db = 10.0 * reference.abs().max(amin).log10();
    let mut data: Vec<f32> = spec
        .data
        .iter()
        .map(|&s| 10.0 * s.max(amin).log10() - ref_db)
        .collect();

    if let Some(top) = top_db {
        let floor = data.iter().copied().fold(f32::NEG_INFINITY, f32::max) - top.abs();
        for v in &mut data {
            *v = v.max(floor);
        }
    }

    Spectrogram::new(data, spec.n_rows, spec.n_cols)
}

/// `power_to_db` with the usual defaults (ref 1.0, amin 1e-10, top_db 80).
pub fn power_to_db_default(spec: &Spectrogram) -> Spectrogram {
    power_to_db(spec, 1.0, 1e-10, Some(80.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sr: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect()
    }

    #[test]
    fn test_centred_stft_frame_count() {
        let spec = stft_power(&vec![0.1; 4000], 512, 256, 2.0, true);
        assert_eq!(spec.n_rows, 257);
        assert_eq!(spec.n_cols, 1 + 4000 / 256);
    }

    #[test]
    fn test_stft_peak_at_tone_bin() {
        // 1 kHz at 8 kHz with n_fft 256 → bin 32
        let spec = stft_power(&sine(1000.0, 8000, 2048), 256, 128, 2.0, false);
        let col  = spec.n_cols / 2;
        let peak = (0..spec.n_rows)
            .max_by(|&a, &b| spec.at(a, col).partial_cmp(&spec.at(b, col)).unwrap())
            .unwrap();
        assert_eq!(peak, 32);
    }

    #[test]
    fn test_mel_scale_round_trip() {
        for hz in [0.0f32, 440.0, 1000.0, 8000.0] {
            assert!((mel_to_hz(hz_to_mel(hz)) - hz).abs() < 0.5);
        }
    }

    #[test]
    fn test_filterbank_is_triangular_and_bounded() {
        let fb = mel_filterbank(16000, 512, 40, 0.0, 8000.0);
        assert_eq!(fb.shape(), [40, 257]);
        assert!(fb.data.iter().all(|&w| (0.0..=1.0).contains(&w)));
        // every band picks up at least one bin at this resolution
        for m in 0..40 {
            assert!((0..257).any(|k| fb.at(m, k) > 0.0), "band {m} is empty");
        }
    }

    #[test]
    fn test_mel_spectrogram_shape() {
        let cfg = MelConfig { n_fft: 512, hop_length: 256, n_mels: 32, ..MelConfig::default() };
        let mel = MelSpectrogram::new(16000, cfg.clone());
        let out = mel.compute(&sine(440.0, 16000, 16000));
        assert_eq!(out.shape(), [32, cfg.num_frames(16000)]);
        assert!(out.max() > 0.0);
    }

    #[test]
    fn test_num_frames_matches_compute_for_odd_window() {
        for (n_fft, hop, n) in [(255, 256, 1024), (256, 256, 1024), (1023, 100, 50), (512, 128, 4000)] {
            let cfg = MelConfig { n_fft, hop_length: hop, n_mels: 8, ..MelConfig::default() };
            let out = MelSpectrogram::new(8000, cfg.clone()).compute(&vec![0.1; n]);
            assert_eq!(out.n_cols, cfg.num_frames(n), "n_fft={n_fft} hop={hop} n={n}");
        }
    }

    #[test]
    fn test_power_to_db_reference_and_top_db() {
        let spec = Spectrogram::new(vec![1.0, 10.0, 100.0, 1e-20], 2, 2);
        let db   = power_to_db(&spec, 1.0, 1e-10, Some(80.0));
        assert!((db.data[0] - 0.0).abs() < 1e-4);
        assert!((db.data[1] - 10.0).abs() < 1e-4);
        assert!((db.data[2] - 20.0).abs() < 1e-4);
        // 1e-20 → amin → -100 dB, floored at 20 - 80 = -60
        assert!((db.data[3] + 60.0).abs() < 1e-4);

        let unclipped = power_to_db(&spec, 1.0, 1e-10, None);
        assert!((unclipped.data[3] + 100.0).abs() < 1e-3);
    }
}
