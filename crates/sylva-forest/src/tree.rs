use std::fmt;

use tracing::{debug, instrument};

use crate::{
    ForestError,
    node::{Entropy, Node},
    rng::{MersenneTwister, resolve_feature_count, subsample_features},
    split::{entropy, find_best_split},
    vote::majority,
};

/// Largest class label accepted for training.
///
/// Split search keeps one count per label value up to the node maximum,
/// so labels are bounded to keep those vectors small.
pub const MAX_LABEL: usize = u16::MAX as usize;

/// Configuration for a single entropy-split decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter          | Default             |
/// |--------------------|---------------------|
/// | `max_depth`        | `None` (unlimited)  |
/// | `feature_fraction` | 1.0 (all features)  |
/// | `seed`             | 44                  |
#[derive(Debug, Clone)]
pub struct DecisionTreeConfig {
    pub(crate) max_depth: Option<usize>,
    pub(crate) feature_fraction: f64,
    pub(crate) seed: u32,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: None,
            feature_fraction: 1.0,
            seed: 44,
        }
    }

    /// Set the maximum tree depth.
    ///
    /// `None` grows until every leaf is pure or unsplittable. `Some(d)`
    /// stops splitting at depth `d` (the root is depth 0).
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the fraction of features considered at each split.
    #[must_use]
    pub fn with_feature_fraction(mut self, feature_fraction: f64) -> Self {
        self.feature_fraction = feature_fraction;
        self
    }

    /// Set the seed of the feature-subsampling generator.
    #[must_use]
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    // --- Getters ---

    /// Return the maximum depth limit, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the fraction of features considered at each split.
    #[must_use]
    pub fn feature_fraction(&self) -> f64 {
        self.feature_fraction
    }

    /// Return the feature-subsampling seed.
    #[must_use]
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Train a decision tree on the provided row-major dataset.
    ///
    /// `features[sample_idx][feature_idx]`: row-major layout.
    /// `labels[sample_idx]`: non-negative class labels.
    ///
    /// # Errors
    ///
    /// | Variant                                   | When                                            |
    /// |-------------------------------------------|-------------------------------------------------|
    /// | [`ForestError::EmptyDataset`]             | `features` is empty                             |
    /// | [`ForestError::ZeroFeatures`]             | rows have zero feature columns                  |
    /// | [`ForestError::FeatureCountMismatch`]     | rows have inconsistent lengths                  |
    /// | [`ForestError::NonFiniteValue`]           | any value is NaN or infinite                    |
    /// | [`ForestError::LabelCountMismatch`]       | `labels.len() != features.len()`                |
    /// | [`ForestError::InvalidLabel`]             | a label exceeds [`MAX_LABEL`]                   |
    /// | [`ForestError::InvalidMaxDepth`]          | `max_depth` is `Some(0)`                        |
    /// | [`ForestError::InvalidFeatureFraction`]   | the fraction selects no feature or exceeds 1.0  |
    #[instrument(skip(self, features, labels), fields(n_samples = features.len()))]
    pub fn fit(&self, features: &[Vec<f64>], labels: &[usize]) -> Result<DecisionTree, ForestError> {
        let n_features = validate_dataset(features, labels)?;
        self.validate(n_features)?;

        let mut rng = MersenneTwister::new(self.seed);
        let tree = self.fit_unchecked(features, labels, n_features, &mut rng);

        debug!(
            n_nodes = tree.n_nodes(),
            n_leaves = tree.n_leaves(),
            depth = tree.depth(),
            "decision tree built"
        );
        Ok(tree)
    }

    pub(crate) fn validate(&self, n_features: usize) -> Result<(), ForestError> {
        if self.max_depth == Some(0) {
            return Err(ForestError::InvalidMaxDepth { max_depth: 0 });
        }
        let fraction = self.feature_fraction;
        if !(fraction > 0.0 && fraction <= 1.0) || resolve_feature_count(n_features, fraction) == 0 {
            return Err(ForestError::InvalidFeatureFraction {
                fraction,
                n_features,
            });
        }
        Ok(())
    }

    /// Grow a tree on data that already passed validation.
    pub(crate) fn fit_unchecked(
        &self,
        features: &[Vec<f64>],
        labels: &[usize],
        n_features: usize,
        rng: &mut MersenneTwister,
    ) -> DecisionTree {
        let all_indices: Vec<usize> = (0..features.len()).collect();
        let root_class = majority(all_indices.iter().map(|&i| labels[i])).unwrap_or(0);
        let mut root = Node::new_leaf(all_indices, root_class);

        let mut grower = Grower {
            features,
            labels,
            n_features,
            max_depth: self.max_depth,
            feature_fraction: self.feature_fraction,
            rng,
        };
        grower.grow(&mut root, 0);

        DecisionTree {
            root,
            n_features,
            max_depth: self.max_depth,
        }
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate a training set and return its feature count.
pub(crate) fn validate_dataset(features: &[Vec<f64>], labels: &[usize]) -> Result<usize, ForestError> {
    if features.is_empty() {
        return Err(ForestError::EmptyDataset);
    }
    let n_features = features[0].len();
    if n_features == 0 {
        return Err(ForestError::ZeroFeatures);
    }
    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(ForestError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(ForestError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }
    if labels.len() != features.len() {
        return Err(ForestError::LabelCountMismatch {
            n_samples: features.len(),
            n_labels: labels.len(),
        });
    }
    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|&(_, &l)| l > MAX_LABEL) {
        return Err(ForestError::InvalidLabel {
            sample_index,
            label,
            max: MAX_LABEL,
        });
    }
    Ok(n_features)
}

/// Recursive pre-order node splitting over a borrowed dataset.
struct Grower<'a> {
    features: &'a [Vec<f64>],
    labels: &'a [usize],
    n_features: usize,
    max_depth: Option<usize>,
    feature_fraction: f64,
    rng: &'a mut MersenneTwister,
}

impl Grower<'_> {
    fn grow(&mut self, node: &mut Node, depth: usize) {
        let criterion: Entropy = entropy(node.indices().iter().map(|&i| self.labels[i]));
        if !Node::can_split(depth, self.max_depth, criterion) {
            return;
        }

        let candidates = subsample_features(self.n_features, self.feature_fraction, &mut *self.rng);
        let Some(split) = find_best_split(self.features, self.labels, node.indices(), &candidates)
        else {
            return;
        };

        let left_class = majority(split.left_indices.iter().map(|&i| self.labels[i])).unwrap_or(0);
        let right_class = majority(split.right_indices.iter().map(|&i| self.labels[i])).unwrap_or(0);
        let left = Node::new_leaf(split.left_indices, left_class);
        let right = Node::new_leaf(split.right_indices, right_class);

        // A freshly grown node is always a leaf here.
        if node.split(split.feature, split.threshold, left, right).is_err() {
            return;
        }

        if let Some((left, right)) = node.children_mut() {
            self.grow(left, depth + 1);
            self.grow(right, depth + 1);
        }
    }
}

/// A fitted decision tree.
///
/// Owns its root node; children are boxed, so the tree is a strict
/// hierarchy that clones and serializes without indirection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) root: Node,
    pub(crate) n_features: usize,
    pub(crate) max_depth: Option<usize>,
}

impl DecisionTree {
    /// Predict the class label for a single sample.
    ///
    /// Walks from the root: at each internal node goes left when
    /// `sample[feature] <= threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::PredictionFeatureMismatch`] | `sample.len() != n_features` |
    /// | [`ForestError::CorruptedTree`] | an internal node cannot route the sample |
    pub fn predict(&self, sample: &[f64]) -> Result<usize, ForestError> {
        if sample.len() != self.n_features {
            return Err(ForestError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                Node::Leaf {
                    predicted_class, ..
                } => return Ok(*predicted_class),
                Node::Internal {
                    rule, left, right, ..
                } => {
                    let feature = rule.feature.index();
                    if feature >= sample.len() || !rule.threshold.is_finite() {
                        return Err(ForestError::CorruptedTree {
                            reason: format!(
                                "internal node at depth {depth} has unusable split \
                                 (feature {feature}, threshold {})",
                                rule.threshold
                            ),
                        });
                    }
                    node = if sample[feature] <= rule.threshold {
                        left
                    } else {
                        right
                    };
                    depth += 1;
                }
            }
        }
    }

    /// Predict class labels for every row of `features`.
    ///
    /// # Errors
    ///
    /// Fails on the first row that [`predict`](Self::predict) rejects.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<usize>, ForestError> {
        features.iter().map(|sample| self.predict(sample)).collect()
    }

    /// Borrow the root node.
    #[must_use]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Return the number of features this tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the depth bound the tree was grown with.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }

    /// Return the total number of nodes in the tree (both internal and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes().count()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes().filter(|(node, _)| node.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.nodes().map(|(_, d)| d).max().unwrap_or(0)
    }

    /// Pre-order iterator over `(node, depth)`.
    fn nodes(&self) -> impl Iterator<Item = (&Node, usize)> {
        let mut stack = vec![(&self.root, 0usize)];
        std::iter::from_fn(move || {
            let (node, depth) = stack.pop()?;
            if let Some((left, right)) = node.children() {
                stack.push((right, depth + 1));
                stack.push((left, depth + 1));
            }
            Some((node, depth))
        })
    }
}

/// Indented dump: one line per node, children below their parent.
impl fmt::Display for DecisionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (node, depth) in self.nodes() {
            let indent = "  ".repeat(depth);
            match node {
                Node::Leaf {
                    indices,
                    predicted_class,
                } => writeln!(
                    f,
                    "{indent}leaf -> class {predicted_class} ({} samples)",
                    indices.len()
                )?,
                Node::Internal { rule, indices, .. } => writeln!(
                    f,
                    "{indent}split feature {} <= {} ({} samples)",
                    rule.feature,
                    rule.threshold,
                    indices.len()
                )?,
            }
        }
        Ok(())
    }
}
