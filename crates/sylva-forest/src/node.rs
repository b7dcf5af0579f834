use std::fmt;

use crate::error::ForestError;

/// Zero-based feature column index.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(usize);

impl FeatureIndex {
    /// Create a new feature index from a zero-based column position.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based feature column index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Count-weighted entropy of a node's labels: `Σ -count_c · ln(count_c / total)`.
///
/// Zero iff the labels are pure; only meaningful for ordering comparisons.
#[derive(
    Debug, Clone, Copy, PartialEq, PartialOrd,
    serde::Serialize, serde::Deserialize,
)]
pub struct Entropy(f64);

impl Entropy {
    /// Wrap a raw entropy value.
    #[must_use]
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    /// Return the raw entropy value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Return `true` when the labels that produced this value are pure.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0.0
    }
}

impl fmt::Display for Entropy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// Split rule of an internal node: samples with `value <= threshold` go left.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SplitRule {
    /// Feature compared against the threshold.
    pub feature: FeatureIndex,
    /// Boundary value, the midpoint between two observed feature values.
    pub threshold: f64,
}

/// A node of a decision tree.
///
/// Children are owned through `Box`, so a tree is a strict hierarchy with
/// no sharing. A node starts as a [`Node::Leaf`] and may be turned into a
/// [`Node::Internal`] exactly once via [`Node::split`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Node {
    /// A terminal node.
    Leaf {
        /// Training rows (indices into the fitted dataset) that reached this node.
        indices: Vec<usize>,
        /// Majority label of those rows.
        predicted_class: usize,
    },
    /// A decision node.
    Internal {
        /// Training rows that reached this node; the union of both children's rows.
        indices: Vec<usize>,
        /// Feature and threshold routing samples to the children.
        rule: SplitRule,
        /// Subtree for `value <= threshold`.
        left: Box<Node>,
        /// Subtree for `value > threshold`.
        right: Box<Node>,
    },
}

impl Node {
    /// Create a leaf over `indices` predicting `predicted_class`.
    #[must_use]
    pub fn new_leaf(indices: Vec<usize>, predicted_class: usize) -> Self {
        Node::Leaf {
            indices,
            predicted_class,
        }
    }

    /// Turn this leaf into an internal node.
    ///
    /// The node keeps its indices; its predicted class is discarded, so
    /// [`predicted_class`](Self::predicted_class) returns `None` afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ForestError::AlreadySplit`] if the node is already internal;
    /// the node is left untouched.
    pub fn split(
        &mut self,
        feature: FeatureIndex,
        threshold: f64,
        left: Node,
        right: Node,
    ) -> Result<(), ForestError> {
        let indices = match self {
            Node::Leaf { indices, .. } => std::mem::take(indices),
            Node::Internal { rule, .. } => {
                return Err(ForestError::AlreadySplit {
                    feature: rule.feature.index(),
                });
            }
        };
        *self = Node::Internal {
            indices,
            rule: SplitRule { feature, threshold },
            left: Box::new(left),
            right: Box::new(right),
        };
        Ok(())
    }

    /// Whether a node at `depth` with the given entropy may be split.
    ///
    /// True iff `max_depth` is `None` or `depth < max_depth`, and
    /// `criterion` is non-zero.
    #[must_use]
    pub fn can_split(depth: usize, max_depth: Option<usize>, criterion: Entropy) -> bool {
        max_depth.is_none_or(|max_d| depth < max_d) && !criterion.is_zero()
    }

    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }

    /// Training rows that reached this node.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        match self {
            Node::Leaf { indices, .. } | Node::Internal { indices, .. } => indices,
        }
    }

    /// Predicted class of a leaf; `None` for internal nodes.
    #[must_use]
    pub fn predicted_class(&self) -> Option<usize> {
        match self {
            Node::Leaf {
                predicted_class, ..
            } => Some(*predicted_class),
            Node::Internal { .. } => None,
        }
    }

    /// Split rule of an internal node; `None` for leaves.
    #[must_use]
    pub fn rule(&self) -> Option<SplitRule> {
        match self {
            Node::Leaf { .. } => None,
            Node::Internal { rule, .. } => Some(*rule),
        }
    }

    /// Left and right children of an internal node.
    #[must_use]
    pub fn children(&self) -> Option<(&Node, &Node)> {
        match self {
            Node::Leaf { .. } => None,
            Node::Internal { left, right, .. } => Some((left, right)),
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<(&mut Node, &mut Node)> {
        match self {
            Node::Leaf { .. } => None,
            Node::Internal { left, right, .. } => Some((left, right)),
        }
    }
}
