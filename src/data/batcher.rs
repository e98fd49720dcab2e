// ============================================================
// Layer 4 — Clip Batcher
// ============================================================
// Implements Burn's Batcher trait: stacks N ClipItems into
// one image-like tensor the CNN can consume.
//
//   N × mels [n_mels, frames]  →  [N, 1, n_mels, frames]
//   N × label                  →  [N]
//
// Every item was cut/padded to the same length upstream, so
// all mel matrices share one shape and a flat copy + reshape
// is enough.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ClipItem;

/// A batch of spectrograms and their integer labels.
#[derive(Debug, Clone)]
pub struct ClipBatch<B: Backend> {
    /// Mel spectrograms — shape: [batch, 1, n_mels, frames]
    pub mels: Tensor<B, 4>,

    /// Class indices — shape: [batch]
    pub labels: Tensor<B, 1, Int>,
}

#[derive(Clone, Debug)]
pub struct ClipBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ClipBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ClipItem, ClipBatch<B>> for ClipBatcher<B> {
    fn batch(&self, items: Vec<ClipItem>) -> ClipBatch<B> {
        let batch_size       = items.len();
        let [n_mels, frames] = items[0].mel_shape;

        let mels_flat: Vec<f32> = items
            .iter()
            .flat_map(|item| item.mels.iter().copied())
            .collect();

        let labels: Vec<i32> = items.iter().map(|item| item.label as i32).collect();

        let mels = Tensor::<B, 1>::from_floats(mels_flat.as_slice(), &self.device)
            .reshape([batch_size, 1, n_mels, frames]);
        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ClipBatch { mels, labels }
    }
}

/// Single-item tensor for prediction: [1, 1, n_mels, frames].
pub fn item_tensor<B: Backend>(item: &ClipItem, device: &B::Device) -> Tensor<B, 4> {
    let [n_mels, frames] = item.mel_shape;
    Tensor::<B, 1>::from_floats(item.mels.as_slice(), device).reshape([1, 1, n_mels, frames])
}
