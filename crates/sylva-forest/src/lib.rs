//! Random forest classification over dense numeric features.
//!
//! Provides entropy-split decision trees, a bagged forest trained and
//! queried one task per tree on a fixed-size worker pool, majority voting,
//! an MT19937 generator for reproducible resampling, and model
//! serialization.

mod classifier;
mod config;
mod error;
mod forest;
mod metrics;
mod node;
mod pool;
mod predict;
mod rng;
mod serialize;
mod split;
mod tree;
mod vote;

pub use classifier::Classifier;
pub use config::{Execution, RandomForestConfig};
pub use error::ForestError;
pub use forest::RandomForest;
pub use metrics::{accuracy, score};
pub use node::{Entropy, FeatureIndex, Node, SplitRule};
pub use pool::{CancelToken, TaskOutcome, WorkerPool};
pub use predict::{ForestPrediction, TreeFailure};
pub use rng::{MersenneTwister, bootstrap_indices, subsample_features};
pub use split::entropy;
pub use tree::{DecisionTree, DecisionTreeConfig, MAX_LABEL};
pub use vote::majority;
