//! Prediction for the random forest ensemble.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, instrument, warn};

use crate::error::ForestError;
use crate::forest::RandomForest;
use crate::pool::{TaskOutcome, WorkerPool, available_parallelism};
use crate::vote::majority;

/// A tree whose prediction was excluded from the vote.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TreeFailure {
    /// Slot index of the tree.
    pub tree: usize,
    /// Why its prediction failed.
    pub reason: String,
}

/// Forest prediction with the diagnostics of the vote.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ForestPrediction {
    /// One predicted label per input row.
    pub labels: Vec<usize>,
    /// Trees excluded from voting for every sample, in slot order.
    pub failed_trees: Vec<TreeFailure>,
    /// Rows no tree voted for; their label defaulted to class 0.
    pub defaulted_samples: Vec<usize>,
}

impl ForestPrediction {
    /// Return `true` when every tree voted and no label was defaulted.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed_trees.is_empty() && self.defaulted_samples.is_empty()
    }
}

impl RandomForest {
    /// Predict one label per row by majority vote across trees.
    ///
    /// Runs one task per tree on a pool created for this call. Trees that
    /// fail are dropped from the vote; use
    /// [`predict_detailed`](Self::predict_detailed) to see which.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::PredictionFeatureMismatch`] | a row's width differs from `n_features` |
    /// | [`ForestError::WorkerSpawn`] | a worker thread could not be started |
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, ForestError> {
        Ok(self.predict_detailed(features)?.labels)
    }

    /// Predict one label per row and report failed trees and defaulted rows.
    ///
    /// # Errors
    ///
    /// Same as [`predict`](Self::predict).
    pub fn predict_detailed(&self, features: &[Vec<f64>]) -> Result<ForestPrediction, ForestError> {
        self.check_width(features)?;
        let pool = WorkerPool::new(available_parallelism().min(self.n_trees()).max(1))?;
        let prediction = self.predict_detailed_with_pool(&pool, features);
        pool.shutdown();
        prediction
    }

    /// [`predict`](Self::predict) on a caller-owned pool.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] if a row has the
    /// wrong width.
    pub fn predict_with_pool(
        &self,
        pool: &WorkerPool,
        features: &[Vec<f64>],
    ) -> Result<Vec<usize>, ForestError> {
        Ok(self.predict_detailed_with_pool(pool, features)?.labels)
    }

    /// [`predict_detailed`](Self::predict_detailed) on a caller-owned pool.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] if a row has the
    /// wrong width.
    #[instrument(skip_all, fields(n_trees = self.n_trees(), n_samples = features.len()))]
    pub fn predict_detailed_with_pool(
        &self,
        pool: &WorkerPool,
        features: &[Vec<f64>],
    ) -> Result<ForestPrediction, ForestError> {
        self.check_width(features)?;

        let samples = Arc::new(features.to_vec());
        let results: Arc<Mutex<HashMap<usize, Vec<usize>>>> =
            Arc::new(Mutex::new(HashMap::with_capacity(self.n_trees())));

        let tasks: Vec<_> = (0..self.n_trees())
            .map(|slot| {
                let trees = Arc::clone(&self.trees);
                let samples = Arc::clone(&samples);
                let results = Arc::clone(&results);
                move || -> Result<(), ForestError> {
                    let predictions = trees[slot].predict_batch(&samples)?;
                    results
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(slot, predictions);
                    Ok(())
                }
            })
            .collect();

        let mut failed_trees = Vec::new();
        for (slot, outcome) in pool.run_batch(tasks).into_iter().enumerate() {
            let reason = match outcome {
                TaskOutcome::Completed(()) => continue,
                TaskOutcome::Failed { reason } => reason,
                TaskOutcome::Cancelled => "task did not run: pool is shut down".to_string(),
            };
            warn!(tree = slot, %reason, "tree prediction failed; excluded from vote");
            failed_trees.push(TreeFailure { tree: slot, reason });
        }

        let mut results = std::mem::take(&mut *results.lock().unwrap_or_else(PoisonError::into_inner));
        let per_tree: Vec<Vec<usize>> = (0..self.n_trees())
            .filter_map(|slot| results.remove(&slot))
            .collect();

        Ok(aggregate(&per_tree, features.len(), failed_trees))
    }

    /// Predict every tree in slot order on the calling thread.
    ///
    /// Votes the same way as [`predict_detailed`](Self::predict_detailed).
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::PredictionFeatureMismatch`] if a row has the
    /// wrong width.
    #[instrument(skip_all, fields(n_trees = self.n_trees(), n_samples = features.len()))]
    pub fn predict_sequential(&self, features: &[Vec<f64>]) -> Result<ForestPrediction, ForestError> {
        self.check_width(features)?;

        let mut per_tree = Vec::with_capacity(self.n_trees());
        let mut failed_trees = Vec::new();
        for (slot, tree) in self.trees.iter().enumerate() {
            match tree.predict_batch(features) {
                Ok(predictions) => per_tree.push(predictions),
                Err(e) => {
                    let reason = e.to_string();
                    warn!(tree = slot, %reason, "tree prediction failed; excluded from vote");
                    failed_trees.push(TreeFailure { tree: slot, reason });
                }
            }
        }

        Ok(aggregate(&per_tree, features.len(), failed_trees))
    }

    fn check_width(&self, features: &[Vec<f64>]) -> Result<(), ForestError> {
        match features.iter().find(|row| row.len() != self.n_features) {
            Some(row) => Err(ForestError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: row.len(),
            }),
            None => Ok(()),
        }
    }
}

/// Majority vote per sample over the surviving trees' predictions.
///
/// `per_tree` is in slot order, which fixes the tie-break.
fn aggregate(per_tree: &[Vec<usize>], n_samples: usize, failed_trees: Vec<TreeFailure>) -> ForestPrediction {
    let votes: Vec<Option<usize>> = (0..n_samples)
        .into_par_iter()
        .map(|i| majority(per_tree.iter().map(|predictions| predictions[i])))
        .collect();

    let mut defaulted_samples = Vec::new();
    let labels = votes
        .into_iter()
        .enumerate()
        .map(|(i, vote)| {
            vote.unwrap_or_else(|| {
                warn!(sample = i, "no tree voted; defaulting to class 0");
                defaulted_samples.push(i);
                0
            })
        })
        .collect();

    debug!(
        n_voting_trees = per_tree.len(),
        n_failed_trees = failed_trees.len(),
        n_defaulted = defaulted_samples.len(),
        "votes aggregated"
    );

    ForestPrediction {
        labels,
        failed_trees,
        defaulted_samples,
    }
}
