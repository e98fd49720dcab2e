// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All Burn model, loss and optimiser code lives here.
//
//   model.rs     — CNN over [batch, 1, n_mels, frames] mel
//                  spectrograms, logits per class
//
//   trainer.rs   — train_epoch / train_epochs: forward pass,
//                  loss, backward pass, Adam step, validation
//                  and early stopping on validation loss
//
//   evaluator.rs — gradient-free evaluation (test_model) and
//                  single-clip prediction
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)

/// Convolutional mel-spectrogram classifier
pub mod model;

/// Epoch loop with validation, early stopping and checkpointing
pub mod trainer;

/// Test-set evaluation and single-clip prediction
pub mod evaluator;
