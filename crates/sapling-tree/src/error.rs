use std::path::PathBuf;

/// Errors from decision tree training, inference, and persistence.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Returned when the training dataset has zero samples.
    #[error("training dataset has zero samples")]
    EmptyDataset,

    /// Returned when the number of label entries differs from the number of rows.
    #[error("dataset has {n_rows} rows but {n_labels} labels")]
    LabelCountMismatch {
        /// Number of feature rows supplied.
        n_rows: usize,
        /// Number of labels supplied.
        n_labels: usize,
    },

    /// Returned when the training dataset has zero feature columns.
    #[error("training dataset has zero feature columns")]
    ZeroFeatures,

    /// Returned when a sample has a different number of features than expected.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a training value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when the pruning criterion is negative or not finite.
    #[error("pruning criterion must be finite and non-negative, got {criterion}")]
    InvalidPruningCriterion {
        /// The rejected criterion value.
        criterion: f64,
    },

    /// Returned when predicting or rendering before a successful fit.
    #[error("classifier has not been fitted")]
    NotFitted,

    /// Returned when a sample has a different number of features at prediction time.
    #[error("prediction input has {got} features, expected {expected}")]
    PredictionFeatureMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the prediction input.
        got: usize,
    },

    /// Returned when model serialization fails.
    #[error("failed to serialize model")]
    SerializeModel {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when model deserialization fails.
    #[error("failed to deserialize model from {path}")]
    DeserializeModel {
        /// Path to the model file that could not be deserialized.
        path: PathBuf,
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the model file fails.
    #[error("failed to write model to {path}")]
    WriteModel {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the model file fails.
    #[error("failed to read model from {path}")]
    ReadModel {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading a model with an incompatible format version.
    #[error("incompatible model version in {path}: expected {expected}, found {found}")]
    IncompatibleModelVersion {
        /// The model format version this build expects.
        expected: u32,
        /// The model format version found in the file.
        found: u32,
        /// Path to the model file with the incompatible version.
        path: PathBuf,
    },

    /// Returned when a decoded model does not describe a well-formed tree.
    #[error("corrupt model in {path}: {reason}")]
    CorruptModel {
        /// Path to the model file.
        path: PathBuf,
        /// The structural check that failed.
        reason: String,
    },
}

impl TreeError {
    /// Return `true` for errors caused by a malformed training dataset or config.
    #[must_use]
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            TreeError::EmptyDataset
                | TreeError::LabelCountMismatch { .. }
                | TreeError::ZeroFeatures
                | TreeError::FeatureCountMismatch { .. }
                | TreeError::NonFiniteValue { .. }
                | TreeError::InvalidPruningCriterion { .. }
        )
    }
}
