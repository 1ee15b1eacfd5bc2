//! Binary decision-tree classification: fit, prune, predict, render.
//!
//! Trees are grown greedily by exhaustive Gini split search over midpoint
//! thresholds, then simplified bottom-up by collapsing splits whose
//! sample-weighted impurity gain falls below a pruning criterion.

mod error;
mod node;
mod serialize;
mod split;
mod tree;

pub use error::TreeError;
pub use node::{FeatureIndex, Impurity, Node, NodeIndex};
pub use split::gini;
pub use tree::{Classifier, DEFAULT_PRUNING_CRITERION, DecisionTree, DecisionTreeConfig};

/// Return the fraction of `predicted` labels equal to `actual`.
///
/// Returns `0.0` for empty input; compares only the common prefix when the
/// lengths differ.
#[must_use]
pub fn accuracy<L: PartialEq>(predicted: &[L], actual: &[L]) -> f64 {
    let n = predicted.len().min(actual.len());
    if n == 0 {
        return 0.0;
    }
    let correct = predicted
        .iter()
        .zip(actual)
        .filter(|(p, a)| p == a)
        .count();
    correct as f64 / n as f64
}
