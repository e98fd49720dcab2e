// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer never knows where clips come from.
// A folder of WAV files and an in-memory Vec of synthetic
// clips both look the same through ClipSource.

use anyhow::Result;
use crate::domain::clip::AudioClip;

// ─── ClipSource ───────────────────────────────────────────────────────────────
/// Anything that can hand out labelled audio clips by index.
///
/// Implementations:
///   - WavFolderSource → `<dir>/<class>/*.wav`
///   - InMemorySource  → a Vec<AudioClip> built in code
pub trait ClipSource {
    /// Number of clips available
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Decode clip `index`. May hit the disk.
    fn clip(&self, index: usize) -> Result<AudioClip>;

    /// Original label of clip `index` without decoding any audio.
    fn og_label(&self, index: usize) -> Option<&str>;
}

// ─── LabelledDataset ──────────────────────────────────────────────────────────
/// A dataset whose integer labels can be read per item.
/// Class-distribution statistics only need this much.
pub trait LabelledDataset {
    fn item_count(&self) -> usize;

    /// Integer label of item `index`, None when out of range
    fn label_at(&self, index: usize) -> Option<usize>;
}
