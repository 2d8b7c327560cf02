// ============================================================
// Layer 4 — Train/Evaluation Splitter
// ============================================================
// Used when the transform stage is given a single raw corpus:
// shuffle with a seeded RNG, then cut into train / eval.
// The same seed always produces the same split.
//
// Reference: rand crate documentation (SliceRandom, StdRng)

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, eval).
///
/// # Example
/// ```ignore
/// let (train, eval) = split_train_eval(all_records, 0.8, 42);
/// ```
pub fn split_train_eval<T>(mut samples: Vec<T>, train_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let split_at = ((total as f64) * train_fraction.clamp(0.0, 1.0)).round() as usize;
    let split_at = split_at.min(total);

    let eval = samples.split_off(split_at);

    tracing::debug!(
        "Corpus split: {} train, {} eval ({}% / {}%)",
        samples.len(),
        eval.len(),
        (samples.len() * 100) / total.max(1),
        (eval.len()    * 100) / total.max(1),
    );

    (samples, eval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, eval)     = split_train_eval(items, 0.8, 1);
        assert_eq!(train.len(), 80);
        assert_eq!(eval.len(),  20);
    }

    #[test]
    fn test_all_items_preserved() {
        let items: Vec<usize> = (0..50).collect();
        let (train, eval)     = split_train_eval(items, 0.7, 1);
        let mut all: Vec<usize> = train.into_iter().chain(eval).collect();
        all.sort();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_eval((0..30).collect::<Vec<usize>>(), 0.8, 42);
        let b = split_train_eval((0..30).collect::<Vec<usize>>(), 0.8, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_dataset() {
        let (train, eval) = split_train_eval(Vec::<usize>::new(), 0.8, 1);
        assert!(train.is_empty());
        assert!(eval.is_empty());
    }
}
