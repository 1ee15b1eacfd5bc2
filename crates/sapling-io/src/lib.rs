//! CSV dataset loading and validation for sapling.

mod domain;
mod error;
mod reader;

pub use domain::{LabeledDataset, UnlabeledDataset};
pub use error::IoError;
pub use reader::DatasetReader;
