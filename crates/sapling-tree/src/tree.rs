use std::collections::BTreeSet;
use std::fmt;

use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, instrument};

use crate::{
    TreeError,
    node::{Node, NodeIndex},
    split::{find_best_split, gini, majority_class},
};

/// Pruning criterion used when none is configured.
pub const DEFAULT_PRUNING_CRITERION: f64 = 0.1;

/// Configuration for fitting a decision tree.
///
/// Construct via [`DecisionTreeConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter               | Default |
/// |-------------------------|---------|
/// | `pruning_criterion`     | `0.1`   |
/// | `parallel_split_search` | `false` |
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTreeConfig {
    pub(crate) pruning_criterion: f64,
    pub(crate) parallel_split_search: bool,
}

impl DecisionTreeConfig {
    /// Create a new config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pruning_criterion: DEFAULT_PRUNING_CRITERION,
            parallel_split_search: false,
        }
    }

    /// Set the pruning criterion.
    ///
    /// After the tree is built, an interior node whose children are both
    /// leaves is collapsed when
    /// `impurity_gain * n_samples / total_samples < pruning_criterion`.
    /// `0.0` disables pruning.
    #[must_use]
    pub fn with_pruning_criterion(mut self, pruning_criterion: f64) -> Self {
        self.pruning_criterion = pruning_criterion;
        self
    }

    /// Score features on the rayon thread pool during split search.
    ///
    /// The chosen splits are identical to the sequential search.
    #[must_use]
    pub fn with_parallel_split_search(mut self, parallel: bool) -> Self {
        self.parallel_split_search = parallel;
        self
    }

    // --- Getters ---

    /// Return the pruning criterion.
    #[must_use]
    pub fn pruning_criterion(&self) -> f64 {
        self.pruning_criterion
    }

    /// Return whether split search runs in parallel.
    #[must_use]
    pub fn parallel_split_search(&self) -> bool {
        self.parallel_split_search
    }

    /// Build a decision tree on the provided row-major dataset and prune it.
    ///
    /// `features[sample_idx][feature_idx]` is row-major.
    /// `labels[sample_idx]` is the class label of each row.
    ///
    /// # Errors
    ///
    /// | Variant                                  | When                                      |
    /// |------------------------------------------|-------------------------------------------|
    /// | [`TreeError::EmptyDataset`]              | `features` is empty                       |
    /// | [`TreeError::LabelCountMismatch`]        | `labels.len() != features.len()`          |
    /// | [`TreeError::ZeroFeatures`]              | rows have zero feature columns            |
    /// | [`TreeError::FeatureCountMismatch`]      | rows have inconsistent lengths            |
    /// | [`TreeError::NonFiniteValue`]            | any value is NaN or infinite              |
    /// | [`TreeError::InvalidPruningCriterion`]   | criterion is negative or not finite       |
    #[instrument(skip(self, features, labels), fields(n_samples = features.len()))]
    pub fn fit<L: Ord + Clone>(
        &self,
        features: &[Vec<f64>],
        labels: &[L],
    ) -> Result<DecisionTree<L>, TreeError> {
        let criterion = self.pruning_criterion;
        if !criterion.is_finite() || criterion < 0.0 {
            return Err(TreeError::InvalidPruningCriterion { criterion });
        }
        let tree = self.fit_unpruned(features, labels)?;
        Ok(tree.prune(criterion))
    }

    /// Build a decision tree without pruning it.
    ///
    /// # Errors
    ///
    /// Same input errors as [`DecisionTreeConfig::fit`], except the pruning
    /// criterion is not checked.
    pub fn fit_unpruned<L: Ord + Clone>(
        &self,
        features: &[Vec<f64>],
        labels: &[L],
    ) -> Result<DecisionTree<L>, TreeError> {
        let n_features = validate(features, labels)?;
        let n_samples = features.len();

        // Classes are numbered in ascending label order.
        let class_labels: Vec<L> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<L>>()
            .into_iter()
            .collect();
        let classes: Vec<usize> = labels
            .iter()
            .map(|label| class_labels.binary_search(label).unwrap_or_default())
            .collect();

        debug!(
            n_samples,
            n_features,
            n_classes = class_labels.len(),
            "building decision tree"
        );

        // Column-major layout for split search.
        let col_features: Vec<Vec<f64>> = (0..n_features)
            .map(|feat_idx| features.iter().map(|row| row[feat_idx]).collect())
            .collect();

        let ctx = BuildContext {
            col_features: &col_features,
            classes: &classes,
            class_labels: &class_labels,
            parallel: self.parallel_split_search,
        };
        let arena = build_tree(&ctx, (0..n_samples).collect());

        debug!(n_nodes = arena.len(), "decision tree built");

        Ok(DecisionTree {
            nodes: arena,
            n_features,
            classes: class_labels,
            pruning_criterion: None,
        })
    }
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Check the dataset shape and values, returning the feature count.
fn validate<L>(features: &[Vec<f64>], labels: &[L]) -> Result<usize, TreeError> {
    if features.is_empty() || labels.is_empty() {
        return Err(TreeError::EmptyDataset);
    }
    if features.len() != labels.len() {
        return Err(TreeError::LabelCountMismatch {
            n_rows: features.len(),
            n_labels: labels.len(),
        });
    }

    let n_features = features[0].len();
    if n_features == 0 {
        return Err(TreeError::ZeroFeatures);
    }

    for (sample_index, row) in features.iter().enumerate() {
        if row.len() != n_features {
            return Err(TreeError::FeatureCountMismatch {
                expected: n_features,
                got: row.len(),
                sample_index,
            });
        }
        if let Some(feature_index) = row.iter().position(|v| !v.is_finite()) {
            return Err(TreeError::NonFiniteValue {
                sample_index,
                feature_index,
            });
        }
    }

    Ok(n_features)
}

/// Read-only inputs shared by every node the builder creates.
struct BuildContext<'a, L> {
    col_features: &'a [Vec<f64>],
    classes: &'a [usize],
    class_labels: &'a [L],
    parallel: bool,
}

/// Side of a split that a pending child is attached to.
#[derive(Clone, Copy)]
enum Branch {
    Left,
    Right,
}

/// Point `parent`'s `branch` child at `child`. A `None` parent means `child` is the root.
fn attach<L>(arena: &mut [Node<L>], parent: Option<(NodeIndex, Branch)>, child: NodeIndex) {
    if let Some((parent, branch)) = parent
        && let Node::Split { left, right, .. } = &mut arena[parent.index()]
    {
        match branch {
            Branch::Left => *left = child,
            Branch::Right => *right = child,
        }
    }
}

/// Build the arena-based decision tree with an explicit work stack.
///
/// Left children are popped before right ones, so the arena is in pre-order
/// with the root at index 0. Split children start as placeholders and are
/// filled in as each child is created.
fn build_tree<L: Clone>(ctx: &BuildContext<'_, L>, sample_indices: Vec<usize>) -> Vec<Node<L>> {
    let mut arena: Vec<Node<L>> = Vec::new();
    let mut pending: Vec<(Vec<usize>, Option<(NodeIndex, Branch)>)> =
        vec![(sample_indices, None)];

    while let Some((samples, parent)) = pending.pop() {
        let slot = NodeIndex::new(arena.len());
        let n_samples = samples.len();

        let mut class_counts = vec![0usize; ctx.class_labels.len()];
        for &si in &samples {
            class_counts[ctx.classes[si]] += 1;
        }

        let majority = ctx.class_labels[majority_class(&class_counts)].clone();
        let impurity = gini(&class_counts, n_samples);
        let n_present = class_counts.iter().filter(|&&c| c > 0).count();

        let split = if n_present > 1 {
            find_best_split(
                ctx.col_features,
                ctx.classes,
                &samples,
                class_counts.len(),
                ctx.parallel,
            )
        } else {
            None
        };

        // A split must shrink both sides or the subtree would never end.
        match split.filter(|s| !s.left_indices.is_empty() && !s.right_indices.is_empty()) {
            Some(split) => {
                arena.push(Node::Split {
                    feature: split.feature,
                    threshold: split.threshold,
                    left: slot,
                    right: slot,
                    impurity_gain: split.gain,
                    impurity,
                    n_samples,
                    majority,
                });
                pending.push((split.right_indices, Some((slot, Branch::Right))));
                pending.push((split.left_indices, Some((slot, Branch::Left))));
            }
            None => arena.push(Node::Leaf {
                majority,
                impurity,
                n_samples,
            }),
        }
        attach(&mut arena, parent, slot);
    }

    arena
}

/// Collapse prunable nodes, returning a compacted pre-order arena.
///
/// Only a node whose children are both leaves is a candidate, and its cost
/// is `impurity_gain * n_samples / total_samples`. Children always sit after
/// their parent, so a reverse sweep settles every child before its parent
/// and collapses cascade within one pass.
fn prune_nodes<L: Clone>(nodes: &[Node<L>], criterion: f64, total_samples: usize) -> Vec<Node<L>> {
    let mut collapsed = nodes.to_vec();
    for idx in (0..collapsed.len()).rev() {
        let Node::Split {
            left,
            right,
            impurity_gain,
            n_samples,
            ..
        } = &collapsed[idx]
        else {
            continue;
        };
        let cost = impurity_gain * *n_samples as f64 / total_samples as f64;
        let collapse = cost < criterion
            && collapsed[left.index()].is_leaf()
            && collapsed[right.index()].is_leaf();
        if collapse {
            collapsed[idx] = collapsed[idx].clone().into_leaf();
        }
    }
    compact(&collapsed)
}

/// Copy the nodes reachable from the root into a fresh pre-order arena.
fn compact<L: Clone>(nodes: &[Node<L>]) -> Vec<Node<L>> {
    let mut out = Vec::with_capacity(nodes.len());
    let mut pending = vec![(NodeIndex::ROOT, None)];
    while let Some((idx, parent)) = pending.pop() {
        let slot = NodeIndex::new(out.len());
        let node = &nodes[idx.index()];
        if let Some((left, right)) = node.children() {
            pending.push((right, Some((slot, Branch::Right))));
            pending.push((left, Some((slot, Branch::Left))));
        }
        out.push(node.clone());
        attach(&mut out, parent, slot);
    }
    out
}

/// A fitted binary decision tree.
///
/// Stored as an arena-based `Vec<Node>` with the root at index 0.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree<L> {
    pub(crate) nodes: Vec<Node<L>>,
    pub(crate) n_features: usize,
    pub(crate) classes: Vec<L>,
    pub(crate) pruning_criterion: Option<f64>,
}

impl<L: Clone> DecisionTree<L> {
    /// Return a copy of this tree pruned with `criterion`.
    ///
    /// The collapse cost of a node is weighted by the root's sample count.
    #[must_use]
    pub fn prune(&self, criterion: f64) -> Self {
        let total_samples = self.root().n_samples();
        let pruned = prune_nodes(&self.nodes, criterion, total_samples);

        debug!(
            criterion,
            n_nodes_before = self.nodes.len(),
            n_nodes_after = pruned.len(),
            "decision tree pruned"
        );

        Self {
            nodes: pruned,
            n_features: self.n_features,
            classes: self.classes.clone(),
            pruning_criterion: Some(criterion),
        }
    }

    /// Predict the class label for a single sample.
    ///
    /// Traverses from the root: at each `Split`, goes left when
    /// `sample[feature] < threshold`, right otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[f64]) -> Result<L, TreeError> {
        if sample.len() != self.n_features {
            return Err(TreeError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(self.nodes[self.traverse(sample)].majority().clone())
    }

    /// Traverse the tree from the root and return the arena index of the leaf.
    fn traverse(&self, sample: &[f64]) -> usize {
        let mut idx = NodeIndex::ROOT.index();
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[feature.index()] < *threshold {
                        left.index()
                    } else {
                        right.index()
                    };
                }
            }
        }
    }
}

impl<L: Clone + Send + Sync> DecisionTree<L> {
    /// Predict class labels for a batch of samples in parallel.
    ///
    /// The output has one label per input row, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::PredictionFeatureMismatch`] if any sample has the wrong feature count.
    pub fn predict_batch(&self, features: &[Vec<f64>]) -> Result<Vec<L>, TreeError> {
        features
            .into_par_iter()
            .map(|sample| self.predict(sample))
            .collect()
    }
}

impl<L> DecisionTree<L> {
    /// Return the root node.
    #[must_use]
    pub fn root(&self) -> &Node<L> {
        &self.nodes[NodeIndex::ROOT.index()]
    }

    /// Return the node at `idx`.
    #[must_use]
    pub fn node(&self, idx: NodeIndex) -> &Node<L> {
        &self.nodes[idx.index()]
    }

    /// Return every node in arena order (pre-order, root first).
    #[must_use]
    pub fn nodes(&self) -> &[Node<L>] {
        &self.nodes
    }

    /// Return the number of features this tree was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Return the distinct training labels in ascending order.
    #[must_use]
    pub fn classes(&self) -> &[L] {
        &self.classes
    }

    /// Return the criterion this tree was pruned with, or `None` if unpruned.
    #[must_use]
    pub fn pruning_criterion(&self) -> Option<f64> {
        self.pruning_criterion
    }

    /// Return the total number of nodes in the tree (both splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth of the tree.
    ///
    /// A single-node tree (just a root leaf) has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut stack = vec![(NodeIndex::ROOT, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            match self.nodes[idx.index()].children() {
                Some((left, right)) => {
                    stack.push((left, d + 1));
                    stack.push((right, d + 1));
                }
                None => max_depth = max_depth.max(d),
            }
        }
        max_depth
    }
}

impl<L: fmt::Display> DecisionTree<L> {
    /// Render the tree as indented text, one node per line.
    ///
    /// Each line is `"    " * depth + branch + " -> " + body`, where the
    /// branch is `T` for a left child, `F` for a right child and a space for
    /// the root. Splits render as `feature < threshold?`, leaves as
    /// `{label: n_samples}`.
    #[must_use]
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pending = vec![(NodeIndex::ROOT, 0usize, " ")];
        while let Some((idx, depth, branch)) = pending.pop() {
            write!(f, "{}{branch} -> ", "    ".repeat(depth))?;
            match &self.nodes[idx.index()] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    writeln!(f, "{feature} < {threshold:?}?")?;
                    pending.push((*right, depth + 1, "F"));
                    pending.push((*left, depth + 1, "T"));
                }
                Node::Leaf {
                    majority,
                    n_samples,
                    ..
                } => writeln!(f, "{{{majority}: {n_samples}}}")?,
            }
        }
        Ok(())
    }
}

impl<L: fmt::Display> fmt::Display for DecisionTree<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f)
    }
}

/// A decision tree classifier that is configured first and fitted later.
///
/// Holds at most one fitted tree; every call to [`Classifier::fit`] replaces
/// it. Prediction and rendering fail with [`TreeError::NotFitted`] until a
/// fit succeeds.
#[derive(Debug, Clone)]
pub struct Classifier<L> {
    config: DecisionTreeConfig,
    tree: Option<DecisionTree<L>>,
}

impl<L> Classifier<L> {
    /// Create an unfitted classifier.
    #[must_use]
    pub fn new(config: DecisionTreeConfig) -> Self {
        Self { config, tree: None }
    }

    /// Return the configuration.
    #[must_use]
    pub fn config(&self) -> &DecisionTreeConfig {
        &self.config
    }

    /// Return the fitted tree, if any.
    #[must_use]
    pub fn tree(&self) -> Option<&DecisionTree<L>> {
        self.tree.as_ref()
    }

    /// Return `true` once a fit has succeeded.
    #[must_use]
    pub fn is_fitted(&self) -> bool {
        self.tree.is_some()
    }

    fn fitted(&self) -> Result<&DecisionTree<L>, TreeError> {
        self.tree.as_ref().ok_or(TreeError::NotFitted)
    }
}

impl<L: Ord + Clone + Send + Sync> Classifier<L> {
    /// Fit a fresh tree, discarding any previous one.
    ///
    /// On error the classifier is left unfitted.
    ///
    /// # Errors
    ///
    /// See [`DecisionTreeConfig::fit`].
    pub fn fit(
        &mut self,
        features: &[Vec<f64>],
        labels: &[L],
    ) -> Result<&DecisionTree<L>, TreeError> {
        self.tree = None;
        let tree = self.config.fit(features, labels)?;
        Ok(self.tree.insert(tree))
    }

    /// Predict one label per row, in input order.
    ///
    /// # Errors
    ///
    /// | Variant                                    | When                            |
    /// |--------------------------------------------|---------------------------------|
    /// | [`TreeError::NotFitted`]                   | no successful fit yet           |
    /// | [`TreeError::PredictionFeatureMismatch`]   | a row has the wrong width       |
    pub fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<L>, TreeError> {
        self.fitted()?.predict_batch(features)
    }
}

impl<L: fmt::Display> Classifier<L> {
    /// Render the fitted tree.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::NotFitted`] before a successful fit.
    pub fn render(&self) -> Result<String, TreeError> {
        Ok(self.fitted()?.render())
    }
}

impl<L> Default for Classifier<L> {
    fn default() -> Self {
        Self::new(DecisionTreeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_points() -> Vec<Vec<f64>> {
        vec![vec![1.0], vec![2.0], vec![3.0], vec![4.0]]
    }

    #[test]
    fn empty_dataset_error() {
        let features: Vec<Vec<f64>> = vec![];
        let labels: Vec<i64> = vec![];
        let err = DecisionTreeConfig::new().fit(&features, &labels).unwrap_err();
        assert!(matches!(err, TreeError::EmptyDataset));
        assert!(err.is_invalid_input());
    }

    #[test]
    fn label_count_mismatch_error() {
        let err = DecisionTreeConfig::new()
            .fit(&four_points(), &[0, 1, 1])
            .unwrap_err();
        assert!(matches!(
            err,
            TreeError::LabelCountMismatch {
                n_rows: 4,
                n_labels: 3
            }
        ));
    }

    #[test]
    fn feature_count_mismatch_error() {
        let features = vec![vec![1.0, 2.0], vec![3.0]];
        let err = DecisionTreeConfig::new().fit(&features, &[0, 1]).unwrap_err();
        assert!(matches!(
            err,
            TreeError::FeatureCountMismatch {
                expected: 2,
                got: 1,
                sample_index: 1
            }
        ));
    }

    #[test]
    fn zero_features_error() {
        let features = vec![vec![], vec![]];
        let err = DecisionTreeConfig::new().fit(&features, &[0, 1]).unwrap_err();
        assert!(matches!(err, TreeError::ZeroFeatures));
    }

    #[test]
    fn non_finite_value_error() {
        let features = vec![vec![1.0, f64::NAN], vec![3.0, 4.0]];
        let err = DecisionTreeConfig::new().fit(&features, &[0, 1]).unwrap_err();
        assert!(matches!(
            err,
            TreeError::NonFiniteValue {
                sample_index: 0,
                feature_index: 1
            }
        ));
    }

    #[test]
    fn negative_criterion_error() {
        let err = DecisionTreeConfig::new()
            .with_pruning_criterion(-0.5)
            .fit(&four_points(), &[0, 0, 1, 1])
            .unwrap_err();
        assert!(matches!(err, TreeError::InvalidPruningCriterion { .. }));
    }

    #[test]
    fn pure_dataset_single_leaf() {
        let tree = DecisionTreeConfig::new()
            .fit(&four_points(), &[0, 0, 0, 0])
            .unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(
            tree.root(),
            &Node::Leaf {
                majority: 0,
                impurity: crate::Impurity::PURE,
                n_samples: 4,
            }
        );
    }

    #[test]
    fn single_split_at_midpoint() {
        let tree = DecisionTreeConfig::new()
            .with_pruning_criterion(0.0)
            .fit(&four_points(), &[0, 0, 1, 1])
            .unwrap();
        match tree.root() {
            Node::Split {
                feature,
                threshold,
                impurity_gain,
                n_samples,
                ..
            } => {
                assert_eq!(feature.index(), 0);
                assert!((threshold - 2.5).abs() < f64::EPSILON);
                assert!((impurity_gain - 0.5).abs() < 1e-12);
                assert_eq!(*n_samples, 4);
            }
            Node::Leaf { .. } => panic!("root should split"),
        }
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(
            tree.predict_batch(&[vec![1.5], vec![3.5]]).unwrap(),
            vec![0, 1]
        );
    }

    #[test]
    fn threshold_value_routes_right() {
        let tree = DecisionTreeConfig::new()
            .with_pruning_criterion(0.0)
            .fit(&four_points(), &[0, 0, 1, 1])
            .unwrap();
        assert_eq!(tree.predict(&[2.5]).unwrap(), 1);
    }

    #[test]
    fn constant_features_with_mixed_labels_is_leaf() {
        let features = vec![vec![1.0, 7.0]; 5];
        let tree = DecisionTreeConfig::new()
            .with_pruning_criterion(0.0)
            .fit(&features, &[2, 1, 2, 1, 3])
            .unwrap();
        assert_eq!(tree.n_nodes(), 1);
        // Labels 1 and 2 tie with two samples each; the smaller label wins.
        assert_eq!(*tree.root().majority(), 1);
    }

    #[test]
    fn high_criterion_collapses_to_root() {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![2.0, 2.0],
        ];
        let labels = [0, 1, 1, 0, 1];
        let unpruned = DecisionTreeConfig::new()
            .fit_unpruned(&features, &labels)
            .unwrap();
        assert!(unpruned.n_nodes() > 1);

        let tree = DecisionTreeConfig::new()
            .with_pruning_criterion(1.0)
            .fit(&features, &labels)
            .unwrap();
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(*tree.root().majority(), 1);
        assert_eq!(tree.root().n_samples(), 5);
        assert_eq!(tree.pruning_criterion(), Some(1.0));
    }

    /// Root with a weak split whose right child carries a strong split.
    fn lopsided_tree() -> DecisionTree<i64> {
        use crate::{FeatureIndex, Impurity};
        let leaf = |majority, n_samples| Node::Leaf {
            majority,
            impurity: Impurity::PURE,
            n_samples,
        };
        DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: FeatureIndex::new(0),
                    threshold: 1.0,
                    left: NodeIndex::new(1),
                    right: NodeIndex::new(2),
                    impurity_gain: 0.01,
                    impurity: Impurity::new(0.6),
                    n_samples: 100,
                    majority: 0,
                },
                leaf(0, 50),
                Node::Split {
                    feature: FeatureIndex::new(0),
                    threshold: 2.0,
                    left: NodeIndex::new(3),
                    right: NodeIndex::new(4),
                    impurity_gain: 0.5,
                    impurity: Impurity::new(0.5),
                    n_samples: 50,
                    majority: 1,
                },
                leaf(1, 25),
                leaf(2, 25),
            ],
            n_features: 1,
            classes: vec![0, 1, 2],
            pruning_criterion: None,
        }
    }

    #[test]
    fn prune_keeps_node_with_internal_child() {
        // The root costs 0.01 but its right child costs 0.25 and survives.
        let pruned = lopsided_tree().prune(0.1);
        assert_eq!(pruned.nodes(), lopsided_tree().nodes());
    }

    #[test]
    fn prune_cascades_within_one_pass() {
        // Collapsing the right child makes the root collapsible in the same pass.
        let pruned = lopsided_tree().prune(0.3);
        assert_eq!(pruned.n_nodes(), 1);
        assert_eq!(*pruned.root().majority(), 0);
        assert_eq!(pruned.root().n_samples(), 100);
        assert_eq!(pruned.predict(&[5.0]).unwrap(), 0);
    }

    #[test]
    fn pruned_arena_has_no_orphans() {
        let features: Vec<Vec<f64>> = (0..10).map(|v| vec![f64::from(v % 5), f64::from(v)]).collect();
        let labels = [0, 1, 0, 1, 1, 0, 0, 1, 1, 0];
        let tree = DecisionTreeConfig::new()
            .with_pruning_criterion(0.05)
            .fit(&features, &labels)
            .unwrap();

        let mut reachable = 0;
        let mut stack = vec![NodeIndex::ROOT];
        while let Some(idx) = stack.pop() {
            reachable += 1;
            if let Some((l, r)) = tree.node(idx).children() {
                stack.push(l);
                stack.push(r);
            }
        }
        assert_eq!(reachable, tree.n_nodes());
    }

    #[test]
    fn render_single_split() {
        let tree = DecisionTreeConfig::new()
            .with_pruning_criterion(0.0)
            .fit(&four_points(), &[0, 0, 1, 1])
            .unwrap();
        let expected = "  -> 0 < 2.5?\n    T -> {0: 2}\n    F -> {1: 2}\n";
        assert_eq!(tree.render(), expected);
    }

    #[test]
    fn render_leaf_root() {
        let tree = DecisionTreeConfig::new()
            .fit(&four_points(), &[3, 3, 3, 3])
            .unwrap();
        assert_eq!(tree.render(), "  -> {3: 4}\n");
    }

    #[test]
    fn string_labels_are_supported() {
        let labels = ["cat", "cat", "dog", "dog"];
        let tree = DecisionTreeConfig::new()
            .fit(&four_points(), &labels)
            .unwrap();
        assert_eq!(tree.classes(), &["cat", "dog"]);
        assert_eq!(tree.predict(&[4.0]).unwrap(), "dog");
    }

    #[test]
    fn prediction_feature_mismatch() {
        let tree = DecisionTreeConfig::new()
            .fit(&four_points(), &[0, 0, 1, 1])
            .unwrap();
        let err = tree.predict(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            TreeError::PredictionFeatureMismatch {
                expected: 1,
                got: 2
            }
        ));
    }

    #[test]
    fn classifier_not_fitted() {
        let clf: Classifier<i64> = Classifier::default();
        assert!(!clf.is_fitted());
        assert!(matches!(
            clf.predict(&[vec![1.0]]).unwrap_err(),
            TreeError::NotFitted
        ));
        assert!(matches!(clf.render().unwrap_err(), TreeError::NotFitted));
    }

    #[test]
    fn classifier_fit_predict_render() {
        let mut clf = Classifier::new(DecisionTreeConfig::new().with_pruning_criterion(0.0));
        clf.fit(&four_points(), &[0, 0, 1, 1]).unwrap();
        assert_eq!(clf.predict(&[vec![1.5], vec![3.5]]).unwrap(), vec![0, 1]);
        assert!(clf.render().unwrap().starts_with("  -> 0 < 2.5?"));
    }

    #[test]
    fn classifier_failed_refit_discards_previous_tree() {
        let mut clf = Classifier::default();
        clf.fit(&four_points(), &[0, 0, 1, 1]).unwrap();
        assert!(clf.is_fitted());
        assert!(clf.fit(&four_points(), &[0, 1]).is_err());
        assert!(!clf.is_fitted());
    }

    #[test]
    fn depth_of_xor_is_at_least_two() {
        let features = vec![
            vec![0.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 0.0],
        ];
        let tree = DecisionTreeConfig::new()
            .with_pruning_criterion(0.0)
            .fit_unpruned(&features, &[0, 1, 1, 0, 0])
            .unwrap();
        assert!(tree.depth() >= 2);
        assert_eq!(tree.n_leaves(), tree.n_nodes() / 2 + 1);
    }

    #[test]
    fn values_near_f64_max_split_cleanly() {
        let features = vec![vec![1.0e308], vec![1.7e308]];
        let tree = DecisionTreeConfig::new()
            .with_pruning_criterion(0.0)
            .fit(&features, &[0, 1])
            .unwrap();
        assert_eq!(tree.n_nodes(), 3);
        assert_eq!(tree.predict_batch(&features).unwrap(), vec![0, 1]);
        assert_eq!(tree.predict(&[f64::MAX]).unwrap(), 1);
    }

    #[test]
    fn deep_chain_fits_on_a_small_stack() {
        // Alternating labels make every split peel off a single sample.
        let n = 2000;
        let features: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64]).collect();
        let labels: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();

        let handle = std::thread::Builder::new()
            .stack_size(256 * 1024)
            .spawn(move || {
                let tree = DecisionTreeConfig::new()
                    .with_pruning_criterion(0.0)
                    .fit(&features, &labels)
                    .unwrap();
                let rendered = tree.render();
                let predicted = tree.predict_batch(&features).unwrap();
                (tree.depth(), tree.n_nodes(), rendered.lines().count(), predicted == labels)
            })
            .unwrap();
        let (depth, n_nodes, n_lines, all_correct) = handle.join().unwrap();

        assert!(depth >= n / 2);
        assert_eq!(n_lines, n_nodes);
        assert!(all_correct);
    }
}
