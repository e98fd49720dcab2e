use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

use crate::data::preprocessor::AudioTransform;
use crate::data::spectrogram::MelSpectrogram;
use crate::domain::clip::{AudioClip, LabelSet};
use crate::domain::traits::{ClipSource, LabelledDataset};

/// One processed clip:
/// (waveform, sample_rate, label, mels, og_label).
/// `mels` is row-major with shape `mel_shape` = [n_mels, frames].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipItem {
    pub waveform:    Vec<f32>,
    pub sample_rate: u32,
    pub label:       usize,
    pub mels:        Vec<f32>,
    pub mel_shape:   [usize; 2],
    pub og_label:    String,
}

/// A clip source with the fixed-shape transform and label mapping applied.
pub struct ModifiedDataset {
    items:     Vec<ClipItem>,
    labels:    LabelSet,
    transform: AudioTransform,
}

/// Wrap `source`: resample, mix down, cut/pad, compute mels and map every
/// original label to its position in `labels`.
///
/// Fails on the first clip that cannot be decoded or whose label is not
/// in `labels`.
pub fn modify_data<S: ClipSource>(
    source:    &S,
    transform: AudioTransform,
    labels:    LabelSet,
) -> Result<ModifiedDataset> {
    let mel   = transform.mel_spectrogram();
    let total = source.len();
    let mut items = Vec::with_capacity(total);

    for index in 0..total {
        let clip  = source.clip(index)?;
        let label = labels.index_of(&clip.og_label).with_context(|| {
            format!(
                "Clip '{}' has label '{}' which is not one of {:?}",
                clip.source,
                clip.og_label,
                labels.names()
            )
        })?;

        items.push(process_clip(clip, label, &transform, &mel));

        if (index + 1) % 500 == 0 {
            tracing::info!("Processed {}/{} clips", index + 1, total);
        }
    }

    tracing::info!("Prepared {} clips ({} classes)", items.len(), labels.len());
    Ok(ModifiedDataset { items, labels, transform })
}

/// Apply `transform` to a single clip that already has an integer label.
pub fn process_clip(clip: AudioClip, label: usize, transform: &AudioTransform, mel: &MelSpectrogram) -> ClipItem {
    let (waveform, mels) = transform.apply(&clip, mel);
    ClipItem {
        waveform,
        sample_rate: transform.target_sample_rate,
        label,
        mel_shape: mels.shape(),
        mels: mels.data,
        og_label: clip.og_label,
    }
}

impl ModifiedDataset {
    /// Rebuild a dataset from already processed items (e.g. after a split).
    pub fn from_items(items: Vec<ClipItem>, labels: LabelSet, transform: AudioTransform) -> Self {
        Self { items, labels, transform }
    }

    pub fn into_items(self) -> Vec<ClipItem> {
        self.items
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn transform(&self) -> &AudioTransform {
        &self.transform
    }

    pub fn items(&self) -> &[ClipItem] {
        &self.items
    }
}

impl Dataset<ClipItem> for ModifiedDataset {
    fn get(&self, index: usize) -> Option<ClipItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

impl LabelledDataset for ModifiedDataset {
    fn item_count(&self) -> usize {
        self.items.len()
    }

    fn label_at(&self, index: usize) -> Option<usize> {
        self.items.get(index).map(|i| i.label)
    }
}

// ─── SourceLabels ─────────────────────────────────────────────────────────────
/// Integer labels of a clip source, read from its original labels
/// without decoding audio. Clips whose label is not in the set are
/// reported as None and therefore not counted.
pub struct SourceLabels<'a, S: ClipSource> {
    source: &'a S,
    labels: &'a LabelSet,
}

impl<'a, S: ClipSource> SourceLabels<'a, S> {
    pub fn new(source: &'a S, labels: &'a LabelSet) -> Self {
        Self { source, labels }
    }
}

impl<S: ClipSource> LabelledDataset for SourceLabels<'_, S> {
    fn item_count(&self) -> usize {
        self.source.len()
    }

    fn label_at(&self, index: usize) -> Option<usize> {
        self.source.og_label(index).and_then(|l| self.labels.index_of(l))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::loader::InMemorySource;
    use crate::data::spectrogram::MelConfig;
    use crate::domain::clip::AudioClip;

    fn small_transform() -> AudioTransform {
        AudioTransform::new(8000, 2000, MelConfig { n_fft: 256, hop_length: 128, n_mels: 8, ..MelConfig::default() })
    }

    #[test]
    fn test_items_carry_mapped_label_and_original() {
        let source = InMemorySource::new(vec![
            AudioClip::new("a", vec![vec![0.2; 3000]], 8000, "rain"),
            AudioClip::new("b", vec![vec![0.2; 1000]], 16000, "dog"),
        ]);
        let labels = LabelSet::new(["dog", "rain"]);
        let ds = modify_data(&source, small_transform(), labels).unwrap();

        assert_eq!(ds.len(), 2);
        let first = ds.get(0).unwrap();
        assert_eq!(first.label, 1);
        assert_eq!(first.og_label, "rain");
        assert_eq!(first.sample_rate, 8000);
        assert_eq!(first.waveform.len(), 2000);
        assert_eq!(first.mel_shape, small_transform().mel_shape());
        assert_eq!(first.mels.len(), first.mel_shape[0] * first.mel_shape[1]);
        assert_eq!(ds.label_at(1), Some(0));
        assert!(ds.get(2).is_none());
    }

    #[test]
    fn test_source_labels_skip_decoding() {
        let source = InMemorySource::new(vec![
            AudioClip::new("a", vec![], 8000, "rain"),
            AudioClip::new("b", vec![], 8000, "cat"),
        ]);
        let labels = LabelSet::new(["dog", "rain"]);
        let view   = SourceLabels::new(&source, &labels);
        assert_eq!(view.item_count(), 2);
        assert_eq!(view.label_at(0), Some(1));
        assert_eq!(view.label_at(1), None);
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let source = InMemorySource::new(vec![AudioClip::new("x", vec![vec![0.0; 10]], 8000, "cat")]);
        let err = modify_data(&source, small_transform(), LabelSet::new(["dog"])).err().unwrap();
        assert!(err.to_string().contains("cat"));
    }
}
