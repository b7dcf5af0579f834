use std::path::PathBuf;

/// Errors from tree induction, forest orchestration, and model persistence.
#[derive(Debug, thiserror::Error)]
pub enum ForestError {
    /// Returned when the tree count is zero.
    #[error("n_trees must be at least 1, got {n_trees}")]
    InvalidTreeCount {
        /// The invalid tree count provided.
        n_trees: usize,
    },

    /// Returned when max_depth is zero.
    #[error("max_depth must be at least 1, got {max_depth}")]
    InvalidMaxDepth {
        /// The invalid max_depth value provided.
        max_depth: usize,
    },

    /// Returned when the feature fraction is outside (0.0, 1.0] or selects no feature.
    #[error("feature_fraction {fraction} selects no feature out of {n_features} (must be in (0.0, 1.0])")]
    InvalidFeatureFraction {
        /// The invalid fraction provided.
        fraction: f64,
        /// The number of features in the dataset.
        n_features: usize,
    },

    /// Returned when a worker pool is requested with zero workers.
    #[error("worker pool needs at least 1 worker, got {n_workers}")]
    InvalidWorkerCount {
        /// The invalid worker count provided.
        n_workers: usize,
    },

    /// Returned when the OS refuses to spawn a worker thread.
    #[error("failed to spawn worker thread {worker}")]
    WorkerSpawn {
        /// Zero-based index of the worker that could not be started.
        worker: usize,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when the label vector and the feature matrix disagree on row count.
    #[error("got {n_labels} labels for {n_samples} samples")]
    LabelCountMismatch {
        /// Number of rows in the feature matrix.
        n_samples: usize,
        /// Number of labels provided.
        n_labels: usize,
    },

    /// Returned when a label exceeds [`MAX_LABEL`](crate::MAX_LABEL).
    #[error("label {label} at sample {sample_index} exceeds the maximum class label {max}")]
    InvalidLabel {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The label provided.
        label: usize,
        /// The largest accepted label.
        max: usize,
    },

    /// Returned when bagging is requested on more rows than the generator can address.
    #[error("bootstrap resampling supports at most {max} samples, got {n_samples}")]
    TooManySamples {
        /// Number of rows in the feature matrix.
        n_samples: usize,
        /// The largest row count a bootstrap can draw from uniformly.
        max: usize,
    },

    /// Returned when a sample has a different number of features at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when `split` is called on a node that is already internal.
    #[error("node is already split on feature {feature}")]
    AlreadySplit {
        /// Feature of the existing split.
        feature: usize,
    },

    /// Returned when traversal reaches a node that cannot route a sample.
    #[error("corrupted tree: {reason}")]
    CorruptedTree {
        /// Human-readable description of the broken node.
        reason: String,
    },

    /// Returned when a tree-training task fails or panics.
    #[error("training tree {tree} failed: {reason}")]
    TrainingFailed {
        /// Slot index of the tree.
        tree: usize,
        /// Why the task failed.
        reason: String,
    },

    /// Returned when truth and prediction vectors differ in length.
    #[error("got {predicted} predictions for {truth} true labels")]
    LengthMismatch {
        /// Number of true labels.
        truth: usize,
        /// Number of predicted labels.
        predicted: usize,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a decoded model contradicts its own header or trees.
    #[error("corrupt model in {path}: {reason}")]
    CorruptModel {
        /// Path to the model file.
        path: PathBuf,
        /// Which consistency check failed.
        reason: String,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },
}
