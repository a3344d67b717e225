//! Quantile accuracy against sorted ground truth.

use ddsketch::{
    CubicallyInterpolatedMapping, DDSketch, DenseStore, IndexMapping, LinearlyInterpolatedMapping,
    LogarithmicMapping,
};

use crate::common::{assert_rel_close, normal_samples, true_quantile};

mod common;

#[test]
fn test_uniform_integers() {
    let mut sketch = DDSketch::new(0.01).unwrap();
    for i in 1..=100 {
        sketch.add(i as f64);
    }

    let p50 = sketch.quantile(0.5);
    assert!((49.5..=51.5).contains(&p50), "p50 = {}", p50);

    let p99 = sketch.quantile(0.99);
    assert!((98.0..=101.0).contains(&p99), "p99 = {}", p99);
}

#[test]
fn test_normal_distribution() {
    let accuracy = 0.02;
    let samples = normal_samples(100_000, 0xC0FFEE);

    let mut sketch = DDSketch::new(accuracy).unwrap();
    for &sample in &samples {
        sketch.add(sample);
    }

    let mut sorted = samples;
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    for q in [0.01, 0.05, 0.25, 0.5, 0.75, 0.95, 0.99] {
        let truth = true_quantile(&sorted, q);
        assert_rel_close(accuracy, sketch.quantile(q), truth);
    }

    // The median of a standard normal is zero, so the estimate must sit
    // within the accuracy band around it.
    let p50 = sketch.quantile(0.5);
    assert!((-0.02..=0.02).contains(&p50), "p50 = {}", p50);
}

fn check_mapping_accuracy<M: IndexMapping>(mapping: M, samples: &[f64], sorted: &[f64], accuracy: f64) {
    let mut sketch = DDSketch::with_parts(mapping, DenseStore::new(), DenseStore::new());
    for &sample in samples {
        sketch.add(sample);
    }

    for q in [0.05, 0.25, 0.5, 0.75, 0.95] {
        assert_rel_close(accuracy, sketch.quantile(q), true_quantile(sorted, q));
    }
}

#[test]
fn test_all_mappings_satisfy_accuracy() {
    let accuracy = 0.01;
    let samples = normal_samples(10_000, 7);
    let mut sorted = samples.clone();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    check_mapping_accuracy(LogarithmicMapping::new(accuracy).unwrap(), &samples, &sorted, accuracy);
    check_mapping_accuracy(
        LinearlyInterpolatedMapping::new(accuracy).unwrap(),
        &samples,
        &sorted,
        accuracy,
    );
    check_mapping_accuracy(
        CubicallyInterpolatedMapping::new(accuracy).unwrap(),
        &samples,
        &sorted,
        accuracy,
    );
}

#[test]
fn test_mixed_sign_stream() {
    let mut sketch = DDSketch::new(0.01).unwrap();
    for value in [-3.0, -2.0, -1.0, 0.0, 0.0, 1.0, 2.0, 3.0] {
        sketch.add(value);
    }

    let p50 = sketch.quantile(0.5);
    assert!(p50.abs() <= 1e-9, "p50 = {}", p50);
    assert_rel_close(0.01, sketch.quantile(0.0), -3.0);
    assert_rel_close(0.01, sketch.quantile(1.0), 3.0);
}

#[test]
fn test_edge_case_totality() {
    let empty = DDSketch::new(0.01).unwrap();
    assert!(empty.quantile(0.5).is_nan());

    let mut sketch = DDSketch::new(0.01).unwrap();
    sketch.add(1.0);
    assert!(sketch.quantile(-0.1).is_nan());
    assert!(sketch.quantile(1.1).is_nan());

    let mut zeros = DDSketch::new(0.01).unwrap();
    for _ in 0..10 {
        zeros.add(0.0);
    }
    for q in [0.0, 0.3, 0.5, 0.7, 1.0] {
        assert_eq!(zeros.quantile(q), 0.0);
    }
}

#[test]
fn test_extreme_magnitudes() {
    let mut sketch = DDSketch::new(0.01).unwrap();
    sketch.add(1e-300);
    sketch.add(1.0);
    sketch.add(1e300);

    assert_rel_close(0.01, sketch.quantile(0.0), 1e-300);
    assert_rel_close(0.01, sketch.quantile(0.5), 1.0);
    assert_rel_close(0.01, sketch.quantile(1.0), 1e300);
}
