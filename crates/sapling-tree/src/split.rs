use rayon::iter::{IntoParallelIterator, ParallelIterator};

use crate::node::{FeatureIndex, Impurity};

/// Compute the Gini impurity `1 - Σ(p_c²)` of a node from its class counts.
///
/// Returns [`Impurity::PURE`] when `n_samples` is zero: an empty partition
/// carries no impurity.
#[must_use]
pub fn gini(class_counts: &[usize], n_samples: usize) -> Impurity {
    if n_samples == 0 {
        return Impurity::PURE;
    }
    let n = n_samples as f64;
    let sum_sq: f64 = class_counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum();
    Impurity::new(1.0 - sum_sq)
}

/// Return the class with the highest count, preferring the lowest class on ties.
///
/// Classes are numbered in ascending label order, so the lowest class is the
/// smallest label.
pub(crate) fn majority_class(class_counts: &[usize]) -> usize {
    let mut best = 0;
    for (class, &count) in class_counts.iter().enumerate() {
        if count > class_counts[best] {
            best = class;
        }
    }
    best
}

/// A scored split candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) feature: FeatureIndex,
    pub(crate) threshold: f64,
    pub(crate) gain: f64,
}

/// Result of finding the best split for a node.
#[derive(Debug, Clone)]
pub(crate) struct SplitResult {
    /// Feature used for the split.
    pub(crate) feature: FeatureIndex,
    /// Threshold value.
    pub(crate) threshold: f64,
    /// Parent impurity minus the size-weighted child impurities.
    pub(crate) gain: f64,
    /// Sample indices with `value < threshold`.
    pub(crate) left_indices: Vec<usize>,
    /// Sample indices with `value >= threshold`.
    pub(crate) right_indices: Vec<usize>,
}

/// Find the best split of `sample_indices` over every feature.
///
/// Candidate thresholds are the midpoints between consecutive distinct values
/// of each feature. Features are scanned in ascending order and thresholds
/// in ascending order; a candidate replaces the current best only when its
/// gain is strictly greater, so the first maximal candidate wins. With
/// `parallel` set, features are scored on the rayon pool and reduced in the
/// same order, which selects the same split.
///
/// Returns `None` when no candidate has a positive gain (including when every
/// feature is constant).
///
/// # Column-major layout
///
/// `features` is column-major: `features[feature_idx][sample_idx]`.
/// `classes[sample_idx]` is the sample's class in `0..n_classes`.
pub(crate) fn find_best_split(
    features: &[Vec<f64>],
    classes: &[usize],
    sample_indices: &[usize],
    n_classes: usize,
    parallel: bool,
) -> Option<SplitResult> {
    let n_samples = sample_indices.len();
    if n_samples < 2 || features.is_empty() {
        return None;
    }

    let mut parent_counts = vec![0usize; n_classes];
    for &si in sample_indices {
        parent_counts[classes[si]] += 1;
    }
    let parent_impurity = gini(&parent_counts, n_samples).value();

    let score = |feat_idx: usize| {
        best_for_feature(
            FeatureIndex::new(feat_idx),
            &features[feat_idx],
            classes,
            sample_indices,
            &parent_counts,
            parent_impurity,
        )
    };

    let per_feature: Vec<Option<Candidate>> = if parallel {
        (0..features.len()).into_par_iter().map(score).collect()
    } else {
        (0..features.len()).map(score).collect()
    };

    let best = first_best(per_feature.into_iter().flatten())?;

    let feat_col = &features[best.feature.index()];
    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = sample_indices
        .iter()
        .copied()
        .partition(|&si| feat_col[si] < best.threshold);

    Some(SplitResult {
        feature: best.feature,
        threshold: best.threshold,
        gain: best.gain,
        left_indices,
        right_indices,
    })
}

/// Keep the first candidate with the strictly greatest positive gain.
fn first_best(candidates: impl IntoIterator<Item = Candidate>) -> Option<Candidate> {
    let mut best: Option<Candidate> = None;
    let mut best_gain = 0.0;
    for candidate in candidates {
        if candidate.gain > best_gain {
            best_gain = candidate.gain;
            best = Some(candidate);
        }
    }
    best
}

/// Score every midpoint threshold of one feature column.
///
/// Sorts the `(value, class)` pairs and scans left-to-right, moving one
/// sample at a time from the right partition to the left. A threshold is
/// evaluated only at boundaries between distinct values.
fn best_for_feature(
    feature: FeatureIndex,
    feat_col: &[f64],
    classes: &[usize],
    sample_indices: &[usize],
    parent_counts: &[usize],
    parent_impurity: f64,
) -> Option<Candidate> {
    let n_samples = sample_indices.len();
    let n = n_samples as f64;

    let mut sorted: Vec<(f64, usize)> = sample_indices
        .iter()
        .map(|&si| (feat_col[si], classes[si]))
        .collect();
    sorted.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

    let mut left_counts = vec![0usize; parent_counts.len()];
    let mut right_counts = parent_counts.to_vec();
    let mut best: Option<Candidate> = None;
    let mut best_gain = 0.0;

    for i in 0..(n_samples - 1) {
        let (val_i, class_i) = sorted[i];
        left_counts[class_i] += 1;
        right_counts[class_i] -= 1;

        let val_next = sorted[i + 1].0;
        if val_i == val_next {
            continue;
        }

        let threshold = split_threshold(val_i, val_next);

        let n_left = i + 1;
        let n_right = n_samples - n_left;
        let weighted = (n_left as f64 / n) * gini(&left_counts, n_left).value()
            + (n_right as f64 / n) * gini(&right_counts, n_right).value();
        let gain = parent_impurity - weighted;

        if gain > best_gain {
            best_gain = gain;
            best = Some(Candidate {
                feature,
                threshold,
                gain,
            });
        }
    }

    best
}

/// Threshold separating two distinct sorted values `lo < hi`.
///
/// The midpoint is formed from halves so it stays finite near `f64::MAX`.
/// Between adjacent floats it rounds onto `lo`, and `hi` is used instead,
/// so `value < threshold` always reproduces the scored partition.
pub(crate) fn split_threshold(lo: f64, hi: f64) -> f64 {
    let mid = lo / 2.0 + hi / 2.0;
    if lo < mid && mid <= hi { mid } else { hi }
}
