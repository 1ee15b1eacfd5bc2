//! CSV dataset reader with full input validation.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::IoError;
use crate::domain::{LabeledDataset, UnlabeledDataset};

/// Reads a numeric feature table from a CSV file.
///
/// Expected CSV format:
/// - Header row required
/// - Labelled files: `feature1,...,featureN,label`, the last column an integer class
/// - Unlabelled files: `feature1,...,featureN`
/// - All rows must have the same number of columns as the header
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::NoFeatureColumns`] | Header has no feature column |
/// | [`IoError::EmptyDataset`] | Labelled file has zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Feature cell is NaN, Inf, or unparseable float |
/// | [`IoError::InvalidLabel`] | Label cell is not an integer |
pub struct DatasetReader {
    path: PathBuf,
}

/// Header and raw records of a CSV file, after column-count validation.
struct RawTable {
    header: Vec<String>,
    records: Vec<csv::StringRecord>,
}

impl DatasetReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read a file whose last column holds integer class labels.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read_labeled(&self) -> Result<LabeledDataset, IoError> {
        let table = self.read_table(2)?;
        if table.records.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }
        let n_features = table.header.len() - 1;

        let mut features = Vec::with_capacity(table.records.len());
        let mut labels = Vec::with_capacity(table.records.len());
        for (row_index, record) in table.records.iter().enumerate() {
            features.push(self.parse_features(record, row_index, n_features)?);

            let raw = record.get(n_features).unwrap_or("").trim();
            let label: i64 = raw.parse().map_err(|_| IoError::InvalidLabel {
                path: self.path.clone(),
                row_index,
                raw: raw.to_string(),
            })?;
            labels.push(label);
        }

        let mut header = table.header;
        header.truncate(n_features);

        info!(
            n_samples = features.len(),
            n_features,
            "labelled dataset loaded"
        );

        Ok(LabeledDataset::new(header, features, labels))
    }

    /// Read a file in which every column is a feature.
    ///
    /// A header with no data rows yields an empty dataset.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read_unlabeled(&self) -> Result<UnlabeledDataset, IoError> {
        let table = self.read_table(1)?;
        let n_features = table.header.len();

        let features = table
            .records
            .iter()
            .enumerate()
            .map(|(row_index, record)| self.parse_features(record, row_index, n_features))
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            n_samples = features.len(),
            n_features,
            "unlabelled dataset loaded"
        );

        Ok(UnlabeledDataset::new(table.header, features))
    }

    /// Open the file, read the header and all records, and check row widths.
    fn read_table(&self, min_columns: usize) -> Result<RawTable, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        // flexible(true) lets our own InconsistentRowLength check fire instead
        // of a low-level CsvParse error.
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);

        let header: Vec<String> = rdr
            .headers()
            .map_err(|e| self.csv_error(e))?
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        let expected = header.len();
        debug!(expected, "read CSV header");

        if expected < min_columns {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }

        let mut records = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| self.csv_error(e))?;
            if record.len() != expected {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected,
                    got: record.len(),
                });
            }
            records.push(record);
        }

        Ok(RawTable { header, records })
    }

    fn parse_features(
        &self,
        record: &csv::StringRecord,
        row_index: usize,
        n_features: usize,
    ) -> Result<Vec<f64>, IoError> {
        let mut row = Vec::with_capacity(n_features);
        for col_index in 0..n_features {
            let raw = record.get(col_index).unwrap_or("").trim();
            let value = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| IoError::NonFiniteValue {
                    path: self.path.clone(),
                    row_index,
                    col_index,
                    raw: raw.to_string(),
                })?;
            row.push(value);
        }
        Ok(row)
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}
