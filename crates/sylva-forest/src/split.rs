use crate::node::{Entropy, FeatureIndex};

/// Count-weighted entropy of a label multiset.
///
/// `Σ -count_c · ln(count_c / total)` over classes with a non-zero count.
/// Returns zero for an empty or pure input.
#[must_use]
pub fn entropy<I>(labels: I) -> Entropy
where
    I: IntoIterator<Item = usize>,
{
    let mut sorted: Vec<usize> = labels.into_iter().collect();
    sorted.sort_unstable();
    // Per-class counts in ascending label order.
    let counts: Vec<usize> = sorted
        .chunk_by(|a, b| a == b)
        .map(<[usize]>::len)
        .collect();
    entropy_from_counts(&counts)
}

/// Entropy from per-class counts indexed by label.
pub(crate) fn entropy_from_counts(counts: &[usize]) -> Entropy {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return Entropy::new(0.0);
    }
    let total = total as f64;
    let value = counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let c = c as f64;
            -c * (c / total).ln()
        })
        .sum::<f64>();
    Entropy::new(value)
}

/// Winning partition of a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value; rows with `value <= threshold` go left.
    pub(crate) threshold: f64,
    /// `entropy(left) + entropy(right)` of the partition.
    pub(crate) score: f64,
    /// Rows going to the left child, in the parent's order.
    pub(crate) left_indices: Vec<usize>,
    /// Rows going to the right child, in the parent's order.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the partition of `sample_indices` with the lowest summed child entropy.
///
/// Candidate features are visited in the order given (ascending by
/// construction). For each, thresholds are the midpoints between
/// consecutive distinct values observed among `sample_indices`, visited in
/// ascending order. Partitions leaving a side empty are skipped. Only a
/// strictly lower score replaces the current best, so the first candidate
/// wins ties.
///
/// `features` is row-major: `features[sample_idx][feature_idx]`.
///
/// Returns `None` when no candidate yields two non-empty sides, e.g. when
/// every candidate feature is constant over the node.
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    labels: &[usize],
    sample_indices: &[usize],
    candidate_features: &[usize],
) -> Option<SplitResult> {
    let n_samples = sample_indices.len();
    if n_samples < 2 {
        return None;
    }

    let n_classes = sample_indices
        .iter()
        .map(|&si| labels[si])
        .max()
        .map_or(0, |m| m + 1);
    let mut parent_counts = vec![0usize; n_classes];
    for &si in sample_indices {
        parent_counts[labels[si]] += 1;
    }

    let mut best_score = f64::MAX;
    let mut best: Option<(FeatureIndex, f64)> = None;

    for &feat_idx in candidate_features {
        let mut sorted: Vec<(f64, usize)> = sample_indices
            .iter()
            .map(|&si| (features[si][feat_idx], labels[si]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut distinct: Vec<f64> = sorted.iter().map(|&(v, _)| v).collect();
        distinct.dedup();

        let mut left_counts = vec![0usize; n_classes];
        let mut right_counts = parent_counts.clone();
        let mut cursor = 0usize;

        for pair in distinct.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;

            // Move every row with value <= threshold to the left side.
            while cursor < n_samples && sorted[cursor].0 <= threshold {
                let class = sorted[cursor].1;
                left_counts[class] += 1;
                right_counts[class] -= 1;
                cursor += 1;
            }
            if cursor == 0 || cursor == n_samples {
                continue;
            }

            let score = entropy_from_counts(&left_counts).value()
                + entropy_from_counts(&right_counts).value();
            if score < best_score {
                best_score = score;
                best = Some((FeatureIndex::new(feat_idx), threshold));
            }
        }
    }

    let (feature, threshold) = best?;
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .partition(|&&si| features[si][feature.index()] <= threshold);

    Some(SplitResult {
        feature,
        threshold,
        score: best_score,
        left_indices,
        right_indices,
    })
}
