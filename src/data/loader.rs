// ============================================================
// Layer 4 — Clip Loader
// ============================================================
// Finds labelled WAV files on disk and decodes them with hound.
//
// Expected layout (one sub-directory per class):
//
//   data/clips/
//     dog/
//       001.wav
//       002.wav
//     rain/
//       001.wav
//
// The directory name is the clip's original label. Scanning
// only records (path, label) pairs; audio is decoded on demand
// through ClipSource::clip so that label statistics can run
// without touching a single sample.

use anyhow::{bail, Context, Result};
use std::{fs, path::{Path, PathBuf}};

use crate::domain::clip::{AudioClip, LabelSet};
use crate::domain::traits::ClipSource;

/// A folder of class sub-directories containing .wav files.
#[derive(Debug, Clone)]
pub struct WavFolderSource {
    root:    PathBuf,
    entries: Vec<(PathBuf, String)>,
}

impl WavFolderSource {
    /// Walk `root` and index every `<class>/<file>.wav`.
    /// Classes and files are sorted by name so indices are stable.
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            bail!("Clip directory '{}' does not exist", root.display());
        }

        let mut class_dirs: Vec<PathBuf> = fs::read_dir(&root)
            .with_context(|| format!("Cannot read directory '{}'", root.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        class_dirs.sort();

        let mut entries = Vec::new();
        for dir in &class_dirs {
            let label = match dir.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => {
                    tracing::warn!("Skipping non UTF-8 class directory '{}'", dir.display());
                    continue;
                }
            };

            let mut files: Vec<PathBuf> = fs::read_dir(dir)
                .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| is_wav(p))
                .collect();
            files.sort();

            tracing::debug!("Class '{}': {} files", label, files.len());
            entries.extend(files.into_iter().map(|f| (f, label.clone())));
        }

        tracing::info!(
            "Indexed {} clips in {} classes under '{}'",
            entries.len(),
            class_dirs.len(),
            root.display()
        );
        Ok(Self { root, entries })
    }

    /// Class names in sorted order, as discovered on disk
    pub fn discovered_labels(&self) -> LabelSet {
        let mut names: Vec<&str> = self.entries.iter().map(|(_, l)| l.as_str()).collect();
        names.dedup();
        LabelSet::new(names)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ClipSource for WavFolderSource {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clip(&self, index: usize) -> Result<AudioClip> {
        let (path, label) = self
            .entries
            .get(index)
            .with_context(|| format!("Clip index {index} out of range ({} clips)", self.entries.len()))?;
        let (waveform, sample_rate) = read_wav(path)?;
        Ok(AudioClip::new(path.display().to_string(), waveform, sample_rate, label.clone()))
    }

    fn og_label(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(|(_, l)| l.as_str())
    }
}

/// Decode a WAV file into per-channel f32 samples in [-1, 1].
/// Integer PCM of any bit depth up to 32 and 32-bit float are supported.
pub fn read_wav(path: &Path) -> Result<(Vec<Vec<f32>>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Cannot open WAV file '{}'", path.display()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("Corrupt float samples in '{}'", path.display()))?,
        hound::SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .with_context(|| format!("Corrupt PCM samples in '{}'", path.display()))?
        }
    };

    let mut waveform = vec![Vec::with_capacity(interleaved.len() / channels); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &s) in frame.iter().enumerate() {
            waveform[ch].push(s);
        }
    }

    Ok((waveform, spec.sample_rate))
}

/// Write a mono 16-bit WAV file. Used to export processed clips
/// and to build fixtures.
pub fn write_wav_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels:        1,
        sample_rate,
        bits_per_sample: 16,
        sample_format:   hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Cannot create WAV file '{}'", path.display()))?;
    for &s in samples {
        writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

fn is_wav(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav"))
}

// ─── InMemorySource ───────────────────────────────────────────────────────────
/// Clips that already live in memory (synthetic data, tests).
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    clips: Vec<AudioClip>,
}

impl InMemorySource {
    pub fn new(clips: Vec<AudioClip>) -> Self {
        Self { clips }
    }
}

impl ClipSource for InMemorySource {
    fn len(&self) -> usize {
        self.clips.len()
    }

    fn clip(&self, index: usize) -> Result<AudioClip> {
        self.clips
            .get(index)
            .cloned()
            .with_context(|| format!("Clip index {index} out of range ({} clips)", self.clips.len()))
    }

    fn og_label(&self, index: usize) -> Option<&str> {
        self.clips.get(index).map(|c| c.og_label.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("mel_classifier_loader_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_scan_sorts_classes_and_files() {
        let root = temp_dir("scan");
        for class in ["rain", "dog"] {
            fs::create_dir_all(root.join(class)).unwrap();
            for name in ["b.wav", "a.wav"] {
                write_wav_mono(&root.join(class).join(name), &[0.0; 100], 8000).unwrap();
            }
        }
        fs::write(root.join("dog").join("notes.txt"), "ignore me").unwrap();

        let source = WavFolderSource::scan(&root).unwrap();
        assert_eq!(source.len(), 4);
        assert_eq!(source.og_label(0), Some("dog"));
        assert_eq!(source.og_label(3), Some("rain"));
        assert_eq!(source.discovered_labels().names(), &["dog".to_string(), "rain".to_string()]);

        let first = source.clip(0).unwrap();
        assert!(first.source.ends_with("a.wav"));
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let missing = std::env::temp_dir().join("mel_classifier_definitely_missing_dir");
        assert!(WavFolderSource::scan(missing).is_err());
    }

    #[test]
    fn test_read_wav_normalises_and_deinterleaves() {
        let root = temp_dir("stereo");
        let path = root.join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(16384i16).unwrap(); // left  = +0.5
            writer.write_sample(-16384i16).unwrap(); // right = -0.5
        }
        writer.finalize().unwrap();

        let (waveform, sr) = read_wav(&path).unwrap();
        assert_eq!(sr, 22050);
        assert_eq!(waveform.len(), 2);
        assert_eq!(waveform[0].len(), 10);
        assert!((waveform[0][0] - 0.5).abs() < 1e-4);
        assert!((waveform[1][0] + 0.5).abs() < 1e-4);
        fs::remove_dir_all(&root).ok();
    }

    #[test]
    fn test_in_memory_out_of_range() {
        let source = InMemorySource::new(vec![AudioClip::new("x", vec![vec![0.0]], 8000, "a")]);
        assert!(source.clip(0).is_ok());
        assert!(source.clip(1).is_err());
        assert_eq!(source.og_label(1), None);
    }
}
