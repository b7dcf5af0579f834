use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::IoError;

/// Writes predicted labels as a one-column CSV with header `prediction`.
pub struct PredictionWriter {
    path: PathBuf,
}

impl PredictionWriter {
    /// Create a new writer targeting the given file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Write one row per label, in order. Overwrites an existing file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::WriteFile`] if the file cannot be created or written.
    #[instrument(skip_all, fields(path = %self.path.display(), n_labels = labels.len()))]
    pub fn write(&self, labels: &[usize]) -> Result<(), IoError> {
        let write_error = |source: io::Error| IoError::WriteFile {
            path: self.path.clone(),
            source,
        };

        let file = File::create(&self.path).map_err(write_error)?;
        let mut wtr = csv::Writer::from_writer(file);
        wtr.write_record(["prediction"])
            .map_err(|e| write_error(e.into()))?;
        for label in labels {
            wtr.write_record([label.to_string()])
                .map_err(|e| write_error(e.into()))?;
        }
        wtr.flush().map_err(write_error)?;

        info!("predictions written");
        Ok(())
    }
}
