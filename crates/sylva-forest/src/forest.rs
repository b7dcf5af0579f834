//! Random forest training: bagging and per-tree dispatch to the worker pool.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, instrument};

use crate::config::RandomForestConfig;
use crate::error::ForestError;
use crate::pool::{TaskOutcome, WorkerPool};
use crate::rng::{MersenneTwister, TreeSeeds, bootstrap_indices, check_bootstrap_size, tree_seeds};
use crate::tree::{DecisionTree, DecisionTreeConfig, validate_dataset};

/// A fitted random forest.
///
/// Trees are ordered by slot: tree `i` was grown from the `i`-th pair of
/// per-tree seeds, whatever worker trained it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Arc<Vec<DecisionTree>>,
    pub(crate) n_features: usize,
    pub(crate) bagging: bool,
    pub(crate) max_depth: Option<usize>,
    pub(crate) feature_fraction: f64,
}

impl RandomForest {
    /// Return the number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Return the number of features this forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return whether trees were trained on bootstrap resamples.
    #[must_use]
    pub fn bagging(&self) -> bool {
        self.bagging
    }

    /// Return the depth bound trees were grown with.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the per-split feature fraction trees were grown with.
    #[must_use]
    pub fn feature_fraction(&self) -> f64 {
        self.feature_fraction
    }

    /// Borrow the trees in slot order.
    #[must_use]
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

/// Validate data and config together; returns the feature count.
pub(crate) fn validate(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<usize, ForestError> {
    let n_features = validate_dataset(features, labels)?;
    if config.bagging {
        check_bootstrap_size(features.len())?;
    }
    tree_config(config, config.seed).validate(n_features)?;
    Ok(n_features)
}

fn tree_config(config: &RandomForestConfig, feature_seed: u32) -> DecisionTreeConfig {
    DecisionTreeConfig::new()
        .with_max_depth(config.max_depth)
        .with_feature_fraction(config.feature_fraction)
        .with_seed(feature_seed)
}

/// Grow the tree of one slot, resampling rows first when bagging.
fn train_tree(
    config: &DecisionTreeConfig,
    bagging: bool,
    seeds: TreeSeeds,
    features: &[Vec<f64>],
    labels: &[usize],
) -> Result<DecisionTree, ForestError> {
    if !bagging {
        return config.fit(features, labels);
    }
    let mut rng = MersenneTwister::new(seeds.bootstrap);
    let indices = bootstrap_indices(features.len(), &mut rng);
    let boot_features: Vec<Vec<f64>> = indices.iter().map(|&i| features[i].clone()).collect();
    let boot_labels: Vec<usize> = indices.iter().map(|&i| labels[i]).collect();
    config.fit(&boot_features, &boot_labels)
}

fn assemble(config: &RandomForestConfig, trees: Vec<DecisionTree>, n_features: usize) -> RandomForest {
    RandomForest {
        trees: Arc::new(trees),
        n_features,
        bagging: config.bagging,
        max_depth: config.max_depth,
        feature_fraction: config.feature_fraction,
    }
}

/// Train every slot on `pool`, one task per tree.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len(), n_workers = pool.n_workers()))]
pub(crate) fn train_on_pool(
    config: &RandomForestConfig,
    pool: &WorkerPool,
    features: &[Vec<f64>],
    labels: &[usize],
    n_features: usize,
) -> Result<RandomForest, ForestError> {
    info!(
        n_trees = config.n_trees,
        n_samples = features.len(),
        n_features,
        bagging = config.bagging,
        "training random forest"
    );

    // Tasks must be 'static; the dataset is shared read-only.
    let shared_features = Arc::new(features.to_vec());
    let shared_labels = Arc::new(labels.to_vec());
    let collected: Arc<Mutex<Vec<(usize, DecisionTree)>>> =
        Arc::new(Mutex::new(Vec::with_capacity(config.n_trees)));
    let bagging = config.bagging;

    let tasks: Vec<_> = tree_seeds(config.seed, config.n_trees)
        .into_iter()
        .enumerate()
        .map(|(slot, seeds)| {
            let features = Arc::clone(&shared_features);
            let labels = Arc::clone(&shared_labels);
            let collected = Arc::clone(&collected);
            let tree_config = tree_config(config, seeds.features);
            move || -> Result<(), ForestError> {
                let tree = train_tree(&tree_config, bagging, seeds, &features, &labels)?;
                debug!(slot, n_nodes = tree.n_nodes(), depth = tree.depth(), "tree trained");
                collected
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((slot, tree));
                Ok(())
            }
        })
        .collect();

    for (slot, outcome) in pool.run_batch(tasks).into_iter().enumerate() {
        match outcome {
            TaskOutcome::Completed(()) => {}
            TaskOutcome::Failed { reason } => {
                return Err(ForestError::TrainingFailed { tree: slot, reason });
            }
            TaskOutcome::Cancelled => {
                return Err(ForestError::TrainingFailed {
                    tree: slot,
                    reason: "task did not run: pool is shut down".to_string(),
                });
            }
        }
    }

    let mut finished =
        std::mem::take(&mut *collected.lock().unwrap_or_else(PoisonError::into_inner));
    // Completion order depends on scheduling; slot order does not.
    finished.sort_by_key(|&(slot, _)| slot);
    let trees: Vec<DecisionTree> = finished.into_iter().map(|(_, tree)| tree).collect();

    info!(n_trees_trained = trees.len(), "random forest training complete");
    Ok(assemble(config, trees, n_features))
}

/// Train every slot in order on the calling thread.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train_sequential(
    config: &RandomForestConfig,
    features: &[Vec<f64>],
    labels: &[usize],
    n_features: usize,
) -> Result<RandomForest, ForestError> {
    info!(
        n_trees = config.n_trees,
        n_samples = features.len(),
        n_features,
        bagging = config.bagging,
        "training random forest sequentially"
    );

    let trees = tree_seeds(config.seed, config.n_trees)
        .into_iter()
        .enumerate()
        .map(|(slot, seeds)| {
            let tree = train_tree(&tree_config(config, seeds.features), config.bagging, seeds, features, labels)
                .map_err(|e| ForestError::TrainingFailed {
                    tree: slot,
                    reason: e.to_string(),
                })?;
            debug!(slot, n_nodes = tree.n_nodes(), depth = tree.depth(), "tree trained");
            Ok(tree)
        })
        .collect::<Result<Vec<_>, ForestError>>()?;

    info!(n_trees_trained = trees.len(), "random forest training complete");
    Ok(assemble(config, trees, n_features))
}
