/// A numeric feature matrix read from CSV.
///
/// Produced by [`FeatureReader`](crate::FeatureReader). `feature_names[j]`
/// names column `j` of every row.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    /// Feature column names from the CSV header.
    feature_names: Vec<String>,
    /// Feature values: `rows[sample_index][feature_index]`.
    rows: Vec<Vec<f64>>,
}

impl FeatureTable {
    pub(crate) fn new(feature_names: Vec<String>, rows: Vec<Vec<f64>>) -> Self {
        Self {
            feature_names,
            rows,
        }
    }

    /// Return the feature column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the feature matrix (row-major).
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Consume the table, returning the feature matrix.
    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }

    /// Return the number of samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    /// Return the number of feature columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }
}
