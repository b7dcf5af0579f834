use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::feature_reader::{csv_error, open_csv};
use crate::IoError;

/// Reads class labels from the first column of a headed CSV file.
///
/// Further columns are ignored. Every label must be a non-negative integer.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InvalidLabel`] | Cell is missing or not a non-negative integer |
pub struct LabelReader {
    path: PathBuf,
}

impl LabelReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Read and validate the label column.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub fn read(&self) -> Result<Vec<usize>, IoError> {
        let mut rdr = open_csv(&self.path)?;
        rdr.headers().map_err(|e| csv_error(&self.path, e))?;

        let mut labels = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| csv_error(&self.path, e))?;
            let raw = record.get(0).unwrap_or("");
            let label = raw.trim().parse::<usize>().map_err(|_| IoError::InvalidLabel {
                path: self.path.clone(),
                row_index,
                raw: raw.to_string(),
            })?;
            labels.push(label);
        }

        if labels.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        info!(n_labels = labels.len(), "labels loaded");
        Ok(labels)
    }
}
