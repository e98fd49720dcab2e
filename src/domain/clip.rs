// ============================================================
// Layer 3 — Audio Clip Domain Types
// ============================================================
// A clip is what a source hands us before any processing:
// the decoded samples, the rate they were recorded at, and
// the label exactly as the source spelled it.
//
// Layout of `waveform`: one Vec per channel, all the same
// length, samples normalised to [-1.0, 1.0].
//
//   waveform[0] = [l0, l1, l2, ...]   ← left / mono
//   waveform[1] = [r0, r1, r2, ...]   ← right (stereo only)

use serde::{Deserialize, Serialize};

/// A decoded, unprocessed audio clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioClip {
    /// Where the clip came from (file path or synthetic id)
    pub source: String,

    /// Samples per channel, channel-major
    pub waveform: Vec<Vec<f32>>,

    /// Native sample rate in Hz
    pub sample_rate: u32,

    /// Original label as found at the source
    pub og_label: String,
}

impl AudioClip {
    pub fn new(
        source:      impl Into<String>,
        waveform:    Vec<Vec<f32>>,
        sample_rate: u32,
        og_label:    impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            waveform,
            sample_rate,
            og_label: og_label.into(),
        }
    }

    pub fn num_channels(&self) -> usize {
        self.waveform.len()
    }

    /// Frames per channel (0 for a clip with no channels)
    pub fn num_frames(&self) -> usize {
        self.waveform.first().map_or(0, Vec::len)
    }

    /// Length of the clip in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.num_frames() as f64 / self.sample_rate as f64
    }
}

// ─── LabelSet ─────────────────────────────────────────────────────────────────
/// Ordered list of class names. A class's position in the list
/// is the integer label the model is trained against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    names: Vec<String>,
}

impl LabelSet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    pub fn name_of(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_lookup_both_ways() {
        let labels = LabelSet::new(["dog", "rooster", "rain"]);
        assert_eq!(labels.index_of("rooster"), Some(1));
        assert_eq!(labels.name_of(2), Some("rain"));
        assert_eq!(labels.index_of("cat"), None);
        assert_eq!(labels.name_of(3), None);
    }

    #[test]
    fn test_clip_dimensions() {
        let clip = AudioClip::new("a.wav", vec![vec![0.0; 8000], vec![0.0; 8000]], 16000, "dog");
        assert_eq!(clip.num_channels(), 2);
        assert_eq!(clip.num_frames(), 8000);
        assert!((clip.duration_secs() - 0.5).abs() < 1e-9);
    }
}
