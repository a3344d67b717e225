use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};

/// Generates standard-normal samples from a fixed seed so test assertions
/// stay deterministic.
pub fn normal_samples(size: usize, seed: u64) -> Vec<f64> {
    let mut rng = SmallRng::seed_from_u64(seed);
    StandardNormal.sample_iter(&mut rng).take(size).collect()
}

/// The value a quantile query targets: the element at position
/// `q * (len - 1)` of the sorted stream, rounded down.
pub fn true_quantile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    sorted[rank.floor() as usize]
}

/// Asserts that `actual` is within `rel_acc * |expected|` of `expected`.
#[track_caller]
pub fn assert_rel_close(rel_acc: f64, actual: f64, expected: f64) {
    let max_error = rel_acc * expected.abs() + 1e-12;
    assert!(
        (actual - expected).abs() <= max_error,
        "expected {} (+/-{}), got {}",
        expected,
        max_error,
        actual
    );
}
