// ============================================================
// Layer 4 — Train/Validation/Test Splitter
// ============================================================
// Shuffles samples with a seeded RNG and cuts them into
// consecutive parts. Clip folders are sorted by class, so an
// unshuffled split would put whole classes into one part.
//
// The seed is part of TrainConfig: the same seed over the same
// folder always yields the same test split, which is what lets
// `test` re-evaluate exactly the clips training never saw.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` and split into (train, validation).
///
/// `train_fraction` of the samples (rounded) go to the first part.
pub fn split_train_val<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = split_at.min(total);

    let val = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} / {} ({}% / {}%)",
        samples.len(),
        val.len(),
        (samples.len() * 100) / total.max(1),
        (val.len()     * 100) / total.max(1),
    );

    (samples, val)
}

/// Three-way split: (train, validation, test).
/// `val_fraction` and `test_fraction` are fractions of the whole set.
pub fn split_train_val_test<T>(
    samples:       Vec<T>,
    val_fraction:  f64,
    test_fraction: f64,
    seed:          u64,
) -> (Vec<T>, Vec<T>, Vec<T>) {
    let total      = samples.len();
    let test_count = ((total as f64) * test_fraction.clamp(0.0, 1.0)).round() as usize;
    let keep       = total - test_count.min(total);
    let (rest, test) = split_train_val(samples, keep as f64 / total.max(1) as f64, seed);

    let val_count  = (((total as f64) * val_fraction.clamp(0.0, 1.0)).round() as usize).min(rest.len());
    let train_frac = (rest.len() - val_count) as f64 / rest.len().max(1) as f64;
    let (train, val) = split_train_val(rest, train_frac, seed.wrapping_add(1));

    (train, val, test)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, val)      = split_train_val(items, 0.8, 7);
        assert_eq!(train.len(), 80);
        assert_eq!(val.len(),   20);
    }

    #[test]
    fn test_same_seed_same_split() {
        let (a, _) = split_train_val((0..50).collect::<Vec<_>>(), 0.5, 42);
        let (b, _) = split_train_val((0..50).collect::<Vec<_>>(), 0.5, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let items: Vec<usize> = Vec::new();
        let (train, val)      = split_train_val(items, 0.8, 1);
        assert!(train.is_empty());
        assert!(val.is_empty());
    }

    #[test]
    fn test_three_way_split_preserves_everything() {
        let (train, val, test) = split_train_val_test((0..100).collect::<Vec<usize>>(), 0.1, 0.2, 3);
        assert_eq!(test.len(), 20);
        assert_eq!(val.len(), 10);
        assert_eq!(train.len(), 70);

        let mut all: Vec<usize> = train.into_iter().chain(val).chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }
}
