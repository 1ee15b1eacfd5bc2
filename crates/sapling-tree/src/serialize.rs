//! Model serialization and deserialization via bincode.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::error::TreeError;
use crate::node::{Node, NodeIndex};
use crate::tree::DecisionTree;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope<T> {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Number of nodes in the tree arena.
    n_nodes: usize,
    /// Number of features the model was trained on.
    n_features: usize,
    /// The serialized tree.
    tree: T,
}

impl<L: Serialize> DecisionTree<L> {
    /// Save the tree to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::SerializeModel`] | bincode encoding failed |
    /// | [`TreeError::WriteModel`] | file write failed |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TreeError> {
        let path = path.as_ref();

        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            n_nodes: self.n_nodes(),
            n_features: self.n_features,
            tree: self,
        };

        let bytes = bincode::serialize(&envelope)
            .map_err(|e| TreeError::SerializeModel { source: e })?;

        std::fs::write(path, &bytes).map_err(|e| TreeError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(size_bytes = bytes.len(), n_nodes = self.n_nodes(), "model saved");

        Ok(())
    }
}

impl<L: DeserializeOwned> DecisionTree<L> {
    /// Load a tree from a binary file written by [`DecisionTree::save`].
    ///
    /// The label type must match the one the tree was saved with.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`TreeError::ReadModel`] | file read failed |
    /// | [`TreeError::DeserializeModel`] | bincode decoding failed |
    /// | [`TreeError::IncompatibleModelVersion`] | format version mismatch |
    /// | [`TreeError::CorruptModel`] | decoded arena is not a well-formed tree |
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, TreeError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| TreeError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        let envelope: ModelEnvelope<DecisionTree<L>> =
            bincode::deserialize(&bytes).map_err(|e| TreeError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(TreeError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        check_structure(&envelope).map_err(|reason| TreeError::CorruptModel {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!(
            n_nodes = envelope.n_nodes,
            n_features = envelope.n_features,
            "model loaded"
        );

        Ok(envelope.tree)
    }
}

/// Check that a decoded arena is a pre-order tree rooted at index 0.
///
/// Every child index points forward and is referenced exactly once, so
/// traversal cannot loop or index out of bounds.
fn check_structure<L>(envelope: &ModelEnvelope<DecisionTree<L>>) -> Result<(), String> {
    let tree = &envelope.tree;
    let n_nodes = tree.nodes.len();

    if n_nodes == 0 {
        return Err("tree has no nodes".to_string());
    }
    if envelope.n_nodes != n_nodes {
        return Err(format!(
            "header records {} nodes but the tree has {n_nodes}",
            envelope.n_nodes
        ));
    }
    if tree.n_features == 0 || envelope.n_features != tree.n_features {
        return Err(format!(
            "header records {} features but the tree has {}",
            envelope.n_features, tree.n_features
        ));
    }

    let mut referenced = vec![false; n_nodes];
    referenced[NodeIndex::ROOT.index()] = true;
    for (idx, node) in tree.nodes.iter().enumerate() {
        let Node::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } = node
        else {
            continue;
        };
        if feature.index() >= tree.n_features {
            return Err(format!(
                "node {idx} splits on feature {feature} of {}",
                tree.n_features
            ));
        }
        if !threshold.is_finite() {
            return Err(format!("node {idx} has a non-finite threshold"));
        }
        for child in [*left, *right] {
            let c = child.index();
            if c <= idx || c >= n_nodes {
                return Err(format!("node {idx} has out-of-order child {child}"));
            }
            if std::mem::replace(&mut referenced[c], true) {
                return Err(format!("node {child} has more than one parent"));
            }
        }
    }

    if let Some(orphan) = referenced.iter().position(|&r| !r) {
        return Err(format!("node {orphan} is unreachable"));
    }

    Ok(())
}
