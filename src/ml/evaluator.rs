// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Gradient-free passes over a loader (validation and test)
// and single-clip prediction. Everything here runs on a plain
// Backend; callers hand in `model.valid()` when they hold an
// autodiff model so no graph is recorded.

use anyhow::{Context, Result};
use burn::{
    data::dataloader::DataLoader,
    nn::loss::CrossEntropyLoss,
    prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::data::batcher::{item_tensor, ClipBatch};
use crate::data::dataset::ClipItem;
use crate::domain::clip::LabelSet;
use crate::ml::model::AudioClassifier;

/// Result of one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalReport {
    /// Mean of the per-batch losses
    pub average_loss: f64,
    pub correct:      usize,
    pub total:        usize,
    /// correct / total * 100
    pub accuracy:     f64,
}

/// Number of rows whose argmax matches the label.
pub fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns [batch, 1]
    let predicted = logits.argmax(1).flatten::<1>(0, 1);
    predicted.equal(labels).int().sum().into_scalar().elem::<i64>() as usize
}

/// Loss and accuracy over every batch of `loader`.
pub fn evaluate<B: Backend>(
    model:     &AudioClassifier<B>,
    loader:    &dyn DataLoader<ClipBatch<B>>,
    criterion: &CrossEntropyLoss<B>,
) -> EvalReport {
    let mut loss_sum = 0.0f64;
    let mut batches  = 0usize;
    let mut correct  = 0usize;
    let mut total    = 0usize;

    for batch in loader.iter() {
        let logits = model.forward(batch.mels);
        loss_sum += criterion
            .forward(logits.clone(), batch.labels.clone())
            .into_scalar()
            .elem::<f64>();
        batches += 1;

        total   += batch.labels.dims()[0];
        correct += count_correct(logits, batch.labels);
    }

    EvalReport {
        average_loss: if batches > 0 { loss_sum / batches as f64 } else { f64::NAN },
        correct,
        total,
        accuracy: if total > 0 { correct as f64 / total as f64 * 100.0 } else { 0.0 },
    }
}

/// Evaluate on the held-out test loader and log the summary line.
pub fn test_model<B: Backend>(
    model:     &AudioClassifier<B>,
    loader:    &dyn DataLoader<ClipBatch<B>>,
    criterion: &CrossEntropyLoss<B>,
) -> EvalReport {
    tracing::info!("Evaluating on {} test clips", loader.num_items());
    let report = evaluate(model, loader, criterion);
    tracing::info!(
        "Test set: Average loss: {:.4}, Accuracy: {}/{} ({:.1}%)",
        report.average_loss,
        report.correct,
        report.total,
        report.accuracy,
    );
    report
}

/// Class probabilities for one processed clip.
pub fn class_probabilities<B: Backend>(
    model:  &AudioClassifier<B>,
    item:   &ClipItem,
    device: &B::Device,
) -> Result<Vec<f32>> {
    let logits = model.forward(item_tensor::<B>(item, device));
    burn::tensor::activation::softmax(logits, 1)
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read probabilities: {e:?}"))
}

/// Index and value of the largest probability (first one on ties).
pub fn top_class(probs: &[f32]) -> (usize, f32) {
    probs
        .iter()
        .copied()
        .enumerate()
        .fold((0usize, f32::NEG_INFINITY), |acc, (i, p)| if p > acc.1 { (i, p) } else { acc })
}

/// Predict the class of one clip.
/// Returns (predicted_label, expected_label) as class names.
pub fn predict<B: Backend>(
    model:  &AudioClassifier<B>,
    item:   &ClipItem,
    labels: &LabelSet,
    device: &B::Device,
) -> Result<(String, String)> {
    let probs = class_probabilities(model, item, device)?;
    let (best, confidence) = top_class(&probs);

    let predicted = labels
        .name_of(best)
        .with_context(|| format!("Model predicted class {best} but only {} labels are known", labels.len()))?;
    let expected = labels
        .name_of(item.label)
        .with_context(|| format!("Target class {} is not a known label", item.label))?;

    tracing::debug!("Predicted '{}' ({:.3}), expected '{}'", predicted, confidence, expected);
    Ok((predicted.to_string(), expected.to_string()))
}
