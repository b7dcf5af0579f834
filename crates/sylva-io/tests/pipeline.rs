//! End-to-end integration tests: CSV -> forest -> predictions CSV.

use std::fs;
use std::path::Path;

use sylva_forest::{RandomForest, RandomForestConfig, accuracy};
use sylva_io::{FeatureReader, LabelReader, PredictionWriter};
use tempfile::TempDir;

/// Write a two-cluster dataset: class 0 near (0, 0), class 1 near (5, 5).
fn write_dataset(dir: &Path) -> (std::path::PathBuf, std::path::PathBuf) {
    let mut data = String::from("x,y\n");
    let mut targets = String::from("target\n");
    for i in 0..20 {
        let jitter = f64::from(i % 5) * 0.1;
        let class = i % 2;
        let base = if class == 0 { 0.0 } else { 5.0 };
        data.push_str(&format!("{},{}\n", base + jitter, base - jitter));
        targets.push_str(&format!("{class}\n"));
    }
    let data_path = dir.join("data.csv");
    let targets_path = dir.join("targets.csv");
    fs::write(&data_path, data).unwrap();
    fs::write(&targets_path, targets).unwrap();
    (data_path, targets_path)
}

#[test]
fn train_predict_round_trip() {
    let dir = TempDir::new().unwrap();
    let (data_path, targets_path) = write_dataset(dir.path());

    // 1. Read CSVs
    let table = FeatureReader::new(&data_path).read().expect("features should parse");
    let labels = LabelReader::new(&targets_path).read().expect("labels should parse");
    assert_eq!(table.n_samples(), 20);
    assert_eq!(table.feature_names(), &["x", "y"]);
    assert_eq!(labels.len(), 20);

    // 2. Train and score
    let forest = RandomForestConfig::new(3)
        .unwrap()
        .fit(table.rows(), &labels)
        .unwrap();
    let predictions = forest.predict(table.rows()).unwrap();
    assert!((accuracy(&labels, &predictions).unwrap() - 1.0).abs() < f64::EPSILON);

    // 3. Save, reload, predict again
    let model_path = dir.path().join("model.bin");
    forest.save(&model_path).unwrap();
    let loaded = RandomForest::load(&model_path).unwrap();
    assert_eq!(loaded.predict(table.rows()).unwrap(), predictions);

    // 4. Write predictions and read them back as labels
    let out_path = dir.path().join("predictions.csv");
    PredictionWriter::new(&out_path).write(&predictions).unwrap();
    let round_tripped = LabelReader::new(&out_path).read().unwrap();
    assert_eq!(round_tripped, predictions);
}

#[test]
fn label_count_mismatch_surfaces_from_forest() {
    let dir = TempDir::new().unwrap();
    let (data_path, _) = write_dataset(dir.path());
    let short_targets = dir.path().join("short.csv");
    fs::write(&short_targets, "target\n0\n1\n").unwrap();

    let table = FeatureReader::new(&data_path).read().unwrap();
    let labels = LabelReader::new(&short_targets).read().unwrap();
    let err = RandomForestConfig::new(3)
        .unwrap()
        .fit(table.rows(), &labels)
        .unwrap_err();
    assert!(matches!(
        err,
        sylva_forest::ForestError::LabelCountMismatch { n_samples: 20, n_labels: 2 }
    ));
}
