//! Dataset types produced by [`DatasetReader`](crate::DatasetReader).

/// Feature rows paired with one integer class label per row.
///
/// `features[i]` is labelled `labels[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
    labels: Vec<i64>,
}

impl LabeledDataset {
    pub(crate) fn new(feature_names: Vec<String>, features: Vec<Vec<f64>>, labels: Vec<i64>) -> Self {
        debug_assert_eq!(features.len(), labels.len());
        Self {
            feature_names,
            features,
            labels,
        }
    }

    /// Feature column names from the CSV header.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Feature values: `features()[sample_index][feature_index]`.
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Class labels, one per row.
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }

    /// Number of rows.
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Split into `(feature_names, features, labels)`.
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<f64>>, Vec<i64>) {
        (self.feature_names, self.features, self.labels)
    }
}

/// Feature rows without labels, as used for prediction input.
#[derive(Debug, Clone, PartialEq)]
pub struct UnlabeledDataset {
    feature_names: Vec<String>,
    features: Vec<Vec<f64>>,
}

impl UnlabeledDataset {
    pub(crate) fn new(feature_names: Vec<String>, features: Vec<Vec<f64>>) -> Self {
        Self {
            feature_names,
            features,
        }
    }

    /// Feature column names from the CSV header.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Feature values: `features()[sample_index][feature_index]`.
    pub fn features(&self) -> &[Vec<f64>] {
        &self.features
    }

    /// Number of rows.
    pub fn n_samples(&self) -> usize {
        self.features.len()
    }

    /// Number of feature columns.
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}
