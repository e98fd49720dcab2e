// ============================================================
// Layer 4 — Class Distribution
// ============================================================
// Counts how often each label occurs and derives the
// "balanced" class weights used for a weighted cross-entropy:
//
//   percent[c] = count[c] / total * 100
//   weight[c]  = total / (n_classes * count[c])
//
// where n_classes is the number of distinct labels actually
// seen. A perfectly balanced dataset gets weight 1.0 for
// every class; rare classes get weights above 1.0.
//
// class_distrib walks every item. class_distrib_approx looks at
// a uniform random subset of distinct indices instead, which is
// enough to estimate the weights on a large dataset.

use anyhow::{ensure, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::traits::LabelledDataset;

/// Per-label counts, percentages and balancing weights.
/// All maps are keyed by label and iterate in label order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassDistribution {
    pub total:   usize,
    pub counts:  BTreeMap<usize, usize>,
    pub percent: BTreeMap<usize, f64>,
    pub weights: BTreeMap<usize, f64>,
}

impl ClassDistribution {
    /// Build the statistics from a label iterator.
    pub fn from_labels(labels: impl IntoIterator<Item = usize>) -> Self {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for label in labels {
            *counts.entry(label).or_insert(0) += 1;
        }

        let total     = counts.values().sum::<usize>();
        let n_classes = counts.len();

        let percent = counts
            .iter()
            .map(|(&l, &c)| (l, c as f64 / total as f64 * 100.0))
            .collect();
        let weights = counts
            .iter()
            .map(|(&l, &c)| (l, total as f64 / (n_classes * c) as f64))
            .collect();

        Self { total, counts, percent, weights }
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    /// Dense weight vector indexed by label, for CrossEntropyLoss.
    /// Labels never observed get a neutral 1.0.
    pub fn weight_vector(&self, num_classes: usize) -> Vec<f32> {
        (0..num_classes)
            .map(|l| self.weights.get(&l).map_or(1.0, |&w| w as f32))
            .collect()
    }
}

/// Exact distribution over every item of `dataset`.
pub fn class_distrib<D: LabelledDataset>(dataset: &D, dataset_name: &str) -> Result<ClassDistribution> {
    let total = dataset.item_count();
    ensure!(total > 0, "Dataset '{dataset_name}' is empty");

    let step = (total / 10).max(1);
    let labels = (0..total).filter_map(|i| {
        if (i + 1) % step == 0 {
            tracing::debug!("{}: counted {}/{} items", dataset_name, i + 1, total);
        }
        dataset.label_at(i)
    });

    let dist = ClassDistribution::from_labels(labels);
    tracing::info!(
        "Class distribution of '{}': {} items, {} classes",
        dataset_name,
        dist.total,
        dist.num_classes()
    );
    Ok(dist)
}

/// Approximate distribution from `num_samples` distinct random items.
pub fn class_distrib_approx<D: LabelledDataset, R: Rng + ?Sized>(
    dataset:      &D,
    num_samples:  usize,
    dataset_name: &str,
    rng:          &mut R,
) -> Result<ClassDistribution> {
    let total = dataset.item_count();
    ensure!(num_samples > 0, "num_samples must be at least 1");
    ensure!(
        num_samples <= total,
        "Cannot sample {num_samples} items from '{dataset_name}' which has only {total}"
    );

    let indices = rand::seq::index::sample(rng, total, num_samples);
    let dist    = ClassDistribution::from_labels(indices.iter().filter_map(|i| dataset.label_at(i)));

    tracing::info!(
        "Approximate class distribution of '{}': {} of {} items sampled, {} classes",
        dataset_name,
        num_samples,
        total,
        dist.num_classes()
    );
    Ok(dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    struct Labels(Vec<usize>);

    impl LabelledDataset for Labels {
        fn item_count(&self) -> usize {
            self.0.len()
        }

        fn label_at(&self, index: usize) -> Option<usize> {
            self.0.get(index).copied()
        }
    }

    #[test]
    fn test_percentages_and_weights() {
        // 6 × label 0, 2 × label 3
        let ds   = Labels(vec![0, 0, 3, 0, 0, 3, 0, 0]);
        let dist = class_distrib(&ds, "toy").unwrap();

        assert_eq!(dist.total, 8);
        assert_eq!(dist.counts[&0], 6);
        assert!((dist.percent[&0] - 75.0).abs() < 1e-9);
        assert!((dist.percent[&3] - 25.0).abs() < 1e-9);
        // 8 / (2 * 6) and 8 / (2 * 2)
        assert!((dist.weights[&0] - 8.0 / 12.0).abs() < 1e-9);
        assert!((dist.weights[&3] - 2.0).abs() < 1e-9);
        assert_eq!(dist.weights.keys().copied().collect::<Vec<_>>(), vec![0, 3]);
    }

    #[test]
    fn test_balanced_dataset_has_unit_weights() {
        let dist = ClassDistribution::from_labels([2, 1, 0, 0, 1, 2]);
        assert!(dist.weights.values().all(|&w| (w - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_weight_vector_fills_unseen_classes() {
        let dist = ClassDistribution::from_labels([0, 0, 0, 2]);
        let w    = dist.weight_vector(4);
        assert_eq!(w.len(), 4);
        assert_eq!(w[1], 1.0);
        assert_eq!(w[3], 1.0);
        assert!(w[2] > w[0]);
    }

    #[test]
    fn test_empty_dataset_is_an_error() {
        assert!(class_distrib(&Labels(vec![]), "empty").is_err());
    }

    #[test]
    fn test_approx_uses_num_samples_as_total() {
        let ds  = Labels((0..100).map(|i| i % 4).collect());
        let mut rng = StdRng::seed_from_u64(9);
        let dist = class_distrib_approx(&ds, 40, "toy", &mut rng).unwrap();
        assert_eq!(dist.total, 40);
        let pct: f64 = dist.percent.values().sum();
        assert!((pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_approx_full_sample_matches_exact() {
        let ds  = Labels(vec![1, 1, 2, 5, 5, 5]);
        let mut rng = StdRng::seed_from_u64(0);
        let approx = class_distrib_approx(&ds, 6, "toy", &mut rng).unwrap();
        assert_eq!(approx, class_distrib(&ds, "toy").unwrap());
    }

    #[test]
    fn test_approx_rejects_oversampling() {
        let ds  = Labels(vec![0, 1]);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(class_distrib_approx(&ds, 3, "toy", &mut rng).is_err());
        assert!(class_distrib_approx(&ds, 0, "toy", &mut rng).is_err());
    }
}
