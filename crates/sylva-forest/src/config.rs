//! Configuration builder for random forest training.

use crate::error::ForestError;
use crate::forest::RandomForest;
use crate::pool::WorkerPool;

/// Where per-tree work runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// One task per tree on a worker pool.
    #[default]
    Parallel,
    /// Every tree in slot order on the calling thread.
    Sequential,
}

/// Configuration for random forest training.
///
/// Construct via [`RandomForestConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter          | Default                        |
/// |--------------------|--------------------------------|
/// | `bagging`          | `true`                         |
/// | `max_depth`        | `None`                         |
/// | `seed`             | 44                             |
/// | `feature_fraction` | 1.0                            |
/// | `n_workers`        | `None` (available parallelism) |
/// | `execution`        | `Parallel`                     |
#[derive(Debug, Clone)]
pub struct RandomForestConfig {
    pub(crate) n_trees: usize,
    pub(crate) bagging: bool,
    pub(crate) max_depth: Option<usize>,
    pub(crate) seed: u32,
    pub(crate) feature_fraction: f64,
    pub(crate) n_workers: Option<usize>,
    pub(crate) execution: Execution,
}

impl RandomForestConfig {
    /// Create a new config with the given number of trees.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::InvalidTreeCount`] if `n_trees` is zero.
    pub fn new(n_trees: usize) -> Result<Self, ForestError> {
        if n_trees == 0 {
            return Err(ForestError::InvalidTreeCount { n_trees });
        }
        Ok(Self {
            n_trees,
            bagging: true,
            max_depth: None,
            seed: 44,
            feature_fraction: 1.0,
            n_workers: None,
            execution: Execution::Parallel,
        })
    }

    // --- Setters ---

    /// Train each tree on a bootstrap resample (`true`) or on the full data.
    #[must_use]
    pub fn with_bagging(mut self, bagging: bool) -> Self {
        self.bagging = bagging;
        self
    }

    /// Set the maximum tree depth. `None` means unlimited.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the seed of the bootstrap and feature-subsampling streams.
    #[must_use]
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Set the fraction of features each split considers.
    #[must_use]
    pub fn with_feature_fraction(mut self, feature_fraction: f64) -> Self {
        self.feature_fraction = feature_fraction;
        self
    }

    /// Set the worker count of the pool [`fit`](Self::fit) creates.
    #[must_use]
    pub fn with_n_workers(mut self, n_workers: Option<usize>) -> Self {
        self.n_workers = n_workers;
        self
    }

    /// Choose parallel or sequential training.
    #[must_use]
    pub fn with_execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    // --- Getters ---

    /// Return the number of trees.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.n_trees
    }

    /// Return whether trees are trained on bootstrap resamples.
    #[must_use]
    pub fn bagging(&self) -> bool {
        self.bagging
    }

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Return the per-split feature fraction.
    #[must_use]
    pub fn feature_fraction(&self) -> f64 {
        self.feature_fraction
    }

    /// Return the configured worker count, if any.
    #[must_use]
    pub fn n_workers(&self) -> Option<usize> {
        self.n_workers
    }

    /// Return the execution mode.
    #[must_use]
    pub fn execution(&self) -> Execution {
        self.execution
    }

    /// Train a random forest on the provided dataset.
    ///
    /// `features[sample_idx][feature_idx]`: row-major layout.
    /// `labels[sample_idx]`: non-negative class labels.
    ///
    /// With [`Execution::Parallel`] a pool of `n_workers` threads is created
    /// for this call and shut down before returning.
    ///
    /// # Errors
    ///
    /// | Variant                                 | When                                             |
    /// |-----------------------------------------|--------------------------------------------------|
    /// | [`ForestError::EmptyDataset`]           | `features` is empty                              |
    /// | [`ForestError::ZeroFeatures`]           | rows have zero feature columns                   |
    /// | [`ForestError::FeatureCountMismatch`]   | rows have inconsistent lengths                   |
    /// | [`ForestError::NonFiniteValue`]         | any value is NaN or infinite                     |
    /// | [`ForestError::LabelCountMismatch`]     | `labels.len() != features.len()`                 |
    /// | [`ForestError::InvalidLabel`]           | a label exceeds [`MAX_LABEL`](crate::MAX_LABEL)  |
    /// | [`ForestError::TooManySamples`]         | bagging over more than `u32::MAX` rows           |
    /// | [`ForestError::InvalidMaxDepth`]        | `max_depth` is `Some(0)`                         |
    /// | [`ForestError::InvalidFeatureFraction`] | the fraction selects no feature or exceeds 1.0   |
    /// | [`ForestError::InvalidWorkerCount`]     | `n_workers` is `Some(0)`                         |
    /// | [`ForestError::WorkerSpawn`]            | a worker thread could not be started             |
    /// | [`ForestError::TrainingFailed`]         | a tree-training task failed or panicked          |
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<RandomForest, ForestError> {
        let n_features = crate::forest::validate(self, features, labels)?;
        match self.execution {
            Execution::Sequential => {
                crate::forest::train_sequential(self, features, labels, n_features)
            }
            Execution::Parallel => {
                let pool = match self.n_workers {
                    Some(n) => WorkerPool::new(n)?,
                    None => WorkerPool::with_available_parallelism()?,
                };
                let forest = crate::forest::train_on_pool(self, &pool, features, labels, n_features);
                pool.shutdown();
                forest
            }
        }
    }

    /// Train a random forest on a caller-owned pool.
    ///
    /// Ignores `n_workers` and `execution`. Produces the same forest as
    /// [`fit`](Self::fit) for the same seed.
    ///
    /// # Errors
    ///
    /// Same as [`fit`](Self::fit), minus the pool construction errors.
    pub fn fit_with_pool(
        &self,
        pool: &WorkerPool,
        features: &[Vec<f64>],
        labels: &[usize],
    ) -> Result<RandomForest, ForestError> {
        let n_features = crate::forest::validate(self, features, labels)?;
        crate::forest::train_on_pool(self, pool, features, labels, n_features)
    }
}
