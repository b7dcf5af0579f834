//! CSV feature-matrix reader with full input validation.

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use crate::table::FeatureTable;
use crate::IoError;

/// Reads a numeric feature matrix from a CSV file.
///
/// Expected CSV format:
/// - Header row required; every column is a feature and the header holds
///   the feature names
/// - `feature1,feature2,...,featureN`
/// - One row per sample, all rows must have the same number of columns
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::NoFeatureColumns`] | Header has no column |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InconsistentRowLength`] | Row has different column count than header |
/// | [`IoError::NonFiniteValue`] | Cell is NaN, Inf, or unparseable float |
pub struct FeatureReader {
    path: PathBuf,
}

impl FeatureReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the CSV file, returning a [`FeatureTable`].
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<FeatureTable, IoError> {
        let mut rdr = open_csv(&self.path)?;

        let header = rdr.headers().map_err(|e| csv_error(&self.path, e))?;
        let feature_names: Vec<String> = header.iter().map(|name| name.trim().to_string()).collect();
        let expected_cols = feature_names.len();
        debug!(expected_cols, "read CSV header");

        if expected_cols == 0 {
            return Err(IoError::NoFeatureColumns {
                path: self.path.clone(),
            });
        }

        let mut rows = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| csv_error(&self.path, e))?;

            if record.len() != expected_cols {
                return Err(IoError::InconsistentRowLength {
                    path: self.path.clone(),
                    row_index,
                    expected: expected_cols,
                    got: record.len(),
                });
            }

            let row = record
                .iter()
                .enumerate()
                .map(|(col_index, raw)| {
                    raw.trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|v| v.is_finite())
                        .ok_or_else(|| IoError::NonFiniteValue {
                            path: self.path.clone(),
                            row_index,
                            col_index,
                            raw: raw.to_string(),
                        })
                })
                .collect::<Result<Vec<f64>, IoError>>()?;
            rows.push(row);
        }

        if rows.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(
            n_samples = rows.len(),
            n_features = expected_cols,
            "feature table loaded"
        );
        Ok(FeatureTable::new(feature_names, rows))
    }
}

/// Open `path` as a headed CSV source.
///
/// `flexible(true)` lets rows of the wrong width through so callers can
/// report [`IoError::InconsistentRowLength`] instead of a parse error.
pub(crate) fn open_csv(path: &Path) -> Result<csv::Reader<File>, IoError> {
    let file = File::open(path).map_err(|source| IoError::FileNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file))
}

pub(crate) fn csv_error(path: &Path, source: csv::Error) -> IoError {
    IoError::CsvParse {
        path: path.to_path_buf(),
        offset: source.position().map_or(0, csv::Position::byte),
        source,
    }
}
