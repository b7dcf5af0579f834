//! Classification scoring.

use crate::classifier::Classifier;
use crate::error::ForestError;

/// Fraction of positions where `predicted` equals `truth`.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`ForestError::LengthMismatch`] | the slices differ in length |
/// | [`ForestError::EmptyDataset`] | both slices are empty |
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> Result<f64, ForestError> {
    if truth.len() != predicted.len() {
        return Err(ForestError::LengthMismatch {
            truth: truth.len(),
            predicted: predicted.len(),
        });
    }
    if truth.is_empty() {
        return Err(ForestError::EmptyDataset);
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / truth.len() as f64)
}

/// Predict `features` with `model` and score the result against `labels`.
///
/// # Errors
///
/// Any error of [`Classifier::predict_batch`] or [`accuracy`].
pub fn score<C: Classifier + ?Sized>(
    model: &C,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<f64, ForestError> {
    let predicted = model.predict_batch(features)?;
    accuracy(labels, &predicted)
}
