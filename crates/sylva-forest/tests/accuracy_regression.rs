//! Accuracy and reproducibility regression tests for sylva-forest.
//!
//! These tests verify that algorithmic changes do not degrade forest
//! accuracy on a deterministic synthetic dataset, and that the forest is
//! a pure function of its seed.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use sylva_forest::{Execution, RandomForestConfig, WorkerPool, accuracy, score};

// ---------------------------------------------------------------------------
// Helper: deterministic synthetic classification dataset
// ---------------------------------------------------------------------------

/// Generate a 300-sample, 10-feature, 3-class classification dataset.
///
/// Features 0-2 are informative (class * 3.0 + noise in [0, 0.5]).
/// Features 3-9 are pure noise in [0, 0.5].
/// Samples are assigned round-robin across classes.
fn make_classification() -> (Vec<Vec<f64>>, Vec<usize>) {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let n_samples = 300;
    let n_features = 10;
    let n_classes = 3;

    let mut features = Vec::with_capacity(n_samples);
    let mut labels = Vec::with_capacity(n_samples);
    for i in 0..n_samples {
        let class = i % n_classes;
        labels.push(class);
        let row: Vec<f64> = (0..n_features)
            .map(|f| {
                let base = if f < 3 { class as f64 * 3.0 } else { 0.0 };
                base + rng.r#gen::<f64>() * 0.5
            })
            .collect();
        features.push(row);
    }
    (features, labels)
}

/// Split rows alternately into a train and a test half.
fn holdout(
    features: &[Vec<f64>],
    labels: &[usize],
) -> (Vec<Vec<f64>>, Vec<usize>, Vec<Vec<f64>>, Vec<usize>) {
    let (mut xtr, mut ytr, mut xte, mut yte) = (Vec::new(), Vec::new(), Vec::new(), Vec::new());
    for (i, (row, &label)) in features.iter().zip(labels).enumerate() {
        if (i / 3) % 2 == 0 {
            xtr.push(row.clone());
            ytr.push(label);
        } else {
            xte.push(row.clone());
            yte.push(label);
        }
    }
    (xtr, ytr, xte, yte)
}

// ---------------------------------------------------------------------------
// a) holdout_accuracy_above_threshold
// ---------------------------------------------------------------------------

/// Held-out accuracy with 25 bagged trees must exceed 0.90.
#[test]
fn holdout_accuracy_above_threshold() {
    let (features, labels) = make_classification();
    let (xtr, ytr, xte, yte) = holdout(&features, &labels);

    let forest = RandomForestConfig::new(25).unwrap().fit(&xtr, &ytr).unwrap();
    let acc = score(&forest, &xte, &yte).unwrap();

    assert!(acc > 0.90, "holdout accuracy {acc} <= 0.90");
}

// ---------------------------------------------------------------------------
// b) prediction_accuracy_on_training_data
// ---------------------------------------------------------------------------

/// Training accuracy must exceed 0.95 (unbounded trees memorize their data).
#[test]
fn prediction_accuracy_on_training_data() {
    let (features, labels) = make_classification();
    let forest = RandomForestConfig::new(25)
        .unwrap()
        .with_seed(42)
        .fit(&features, &labels)
        .unwrap();

    let predictions = forest.predict(&features).unwrap();
    let acc = accuracy(&labels, &predictions).unwrap();

    assert!(acc > 0.95, "training accuracy {acc} <= 0.95");
}

// ---------------------------------------------------------------------------
// c) feature_subsampling_keeps_accuracy
// ---------------------------------------------------------------------------

/// Considering 30% of features per split must still find the signal.
#[test]
fn feature_subsampling_keeps_accuracy() {
    let (features, labels) = make_classification();
    let (xtr, ytr, xte, yte) = holdout(&features, &labels);

    let forest = RandomForestConfig::new(25)
        .unwrap()
        .with_feature_fraction(0.3)
        .fit(&xtr, &ytr)
        .unwrap();
    let acc = score(&forest, &xte, &yte).unwrap();

    assert!(acc > 0.80, "subsampled holdout accuracy {acc} <= 0.80");
}

// ---------------------------------------------------------------------------
// d) deterministic_across_worker_counts
// ---------------------------------------------------------------------------

/// Same seed must give the same forest for any worker count or execution mode.
#[test]
fn deterministic_across_worker_counts() {
    let (features, labels) = make_classification();
    let base = RandomForestConfig::new(12)
        .unwrap()
        .with_seed(2024)
        .with_feature_fraction(0.5);

    let reference = base
        .clone()
        .with_execution(Execution::Sequential)
        .fit(&features, &labels)
        .unwrap();

    for n_workers in [1, 2, 4, 8] {
        let forest = base
            .clone()
            .with_n_workers(Some(n_workers))
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(forest, reference, "forest differs with {n_workers} workers");
    }

    let pool = WorkerPool::new(3).unwrap();
    let pooled = base.fit_with_pool(&pool, &features, &labels).unwrap();
    assert_eq!(pooled, reference);
    assert_eq!(
        pooled.predict_with_pool(&pool, &features).unwrap(),
        reference.predict_sequential(&features).unwrap().labels
    );
}

// ---------------------------------------------------------------------------
// e) no_bagging_full_fraction_trees_are_identical
// ---------------------------------------------------------------------------

/// Without bagging and with every feature considered, all trees coincide.
#[test]
fn no_bagging_full_fraction_trees_are_identical() {
    let (features, labels) = make_classification();
    let forest = RandomForestConfig::new(4)
        .unwrap()
        .with_bagging(false)
        .fit(&features, &labels)
        .unwrap();

    let first = &forest.trees()[0];
    assert!(forest.trees().iter().all(|t| t == first));
    assert_eq!(forest.predict(&features).unwrap(), first.predict_batch(&features).unwrap());
}

// ---------------------------------------------------------------------------
// f) max_depth_bounds_every_tree
// ---------------------------------------------------------------------------

/// No tree may exceed the configured depth.
#[test]
fn max_depth_bounds_every_tree() {
    let (features, labels) = make_classification();
    let forest = RandomForestConfig::new(10)
        .unwrap()
        .with_max_depth(Some(2))
        .fit(&features, &labels)
        .unwrap();

    assert!(forest.trees().iter().all(|t| t.depth() <= 2));
    assert_eq!(forest.max_depth(), Some(2));
}
