// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// one user-facing goal per use case.
//
// Rules for this layer:
//   - No ML math or model code here
//   - No printing here (that's Layer 1)
//   - Only workflow coordination
//
// Backend choice (Wgpu or NdArray) is made here, everything
// below is generic over burn's Backend trait.

// Scan → transform → split → train → test
pub mod train_use_case;

// `test` and `predict` with a saved checkpoint
pub mod evaluate_use_case;

// `distrib` and `plot`
pub mod inspect_use_case;
