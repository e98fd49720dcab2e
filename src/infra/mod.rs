// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting concerns used by several layers:
//
//   checkpoint.rs — best-model weights (Burn CompactRecorder),
//                   TrainConfig and learning curves as JSON
//
//   metrics.rs    — epoch-level loss / accuracy CSV
//
//   plots.rs      — waveform, spectrogram, class distribution
//                   and learning-curve charts (plotters)
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;

/// Diagnostic charts rendered with plotters
pub mod plots;
