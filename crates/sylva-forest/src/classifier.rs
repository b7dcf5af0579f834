use crate::error::ForestError;
use crate::forest::RandomForest;
use crate::tree::DecisionTree;

/// A fitted model that labels rows of a feature matrix.
pub trait Classifier {
    /// Number of feature columns each row must have.
    fn n_features(&self) -> usize;

    /// Predict one label per row.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] on a row of the
    /// wrong width, or any error of the underlying model.
    fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, ForestError>;
}

impl Classifier for DecisionTree {
    fn n_features(&self) -> usize {
        DecisionTree::n_features(self)
    }

    fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, ForestError> {
        DecisionTree::predict_batch(self, features)
    }
}

impl Classifier for RandomForest {
    fn n_features(&self) -> usize {
        RandomForest::n_features(self)
    }

    fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, ForestError> {
        self.predict(features)
    }
}
