//! Model persistence via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::error::ForestError;
use crate::forest::RandomForest;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Number of trees in the forest.
    n_trees: usize,
    /// Number of features the model was trained on.
    n_features: usize,
    /// The serialized forest.
    forest: RandomForest,
}

impl RandomForest {
    /// Save the model to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::SerializeModel`] | bincode encoding failed |
    /// | [`ForestError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForestError> {
        let path = path.as_ref();

        // Cloning shares the tree vector.
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            n_trees: self.n_trees(),
            n_features: self.n_features,
            forest: self.clone(),
        };

        let bytes = bincode::serialize(&envelope)
            .map_err(|source| ForestError::SerializeModel { source })?;

        std::fs::write(path, &bytes).map_err(|source| ForestError::WriteModel {
            path: path.to_path_buf(),
            source,
        })?;

        info!(size_bytes = bytes.len(), n_trees = self.n_trees(), "model saved");
        Ok(())
    }

    /// Load a model from a binary file written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ForestError::ReadModel`] | file read failed |
    /// | [`ForestError::DeserializeModel`] | bincode decoding failed |
    /// | [`ForestError::IncompatibleModelVersion`] | format version mismatch |
    /// | [`ForestError::CorruptModel`] | tree or feature counts disagree between header, forest, and trees |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForestError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|source| ForestError::ReadModel {
            path: path.to_path_buf(),
            source,
        })?;

        let envelope: ModelEnvelope =
            bincode::deserialize(&bytes).map_err(|source| ForestError::DeserializeModel {
                path: path.to_path_buf(),
                source,
            })?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(ForestError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
                path: path.to_path_buf(),
            });
        }

        envelope.check_consistency().map_err(|reason| ForestError::CorruptModel {
            path: path.to_path_buf(),
            reason,
        })?;

        debug!(
            n_trees = envelope.n_trees,
            n_features = envelope.n_features,
            "model loaded"
        );
        Ok(envelope.forest)
    }
}

impl ModelEnvelope {
    /// Check the header against the forest and every tree against the forest.
    fn check_consistency(&self) -> Result<(), String> {
        let forest = &self.forest;
        if self.n_trees != forest.n_trees() {
            return Err(format!(
                "header lists {} trees, forest holds {}",
                self.n_trees,
                forest.n_trees()
            ));
        }
        if forest.n_trees() == 0 {
            return Err("forest holds no trees".to_string());
        }
        if self.n_features != forest.n_features {
            return Err(format!(
                "header lists {} features, forest expects {}",
                self.n_features, forest.n_features
            ));
        }
        if let Some((slot, tree)) = forest
            .trees()
            .iter()
            .enumerate()
            .find(|(_, tree)| tree.n_features() != forest.n_features)
        {
            return Err(format!(
                "tree {slot} expects {} features, forest expects {}",
                tree.n_features(),
                forest.n_features
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{FORMAT_VERSION, ModelEnvelope};
    use crate::config::RandomForestConfig;
    use crate::forest::RandomForest;
    use crate::ForestError;

    fn train_simple_model() -> RandomForest {
        let features = vec![
            vec![1.0, 0.0],
            vec![2.0, 0.0],
            vec![3.0, 0.0],
            vec![10.0, 0.0],
            vec![11.0, 0.0],
            vec![12.0, 0.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        RandomForestConfig::new(5)
            .unwrap()
            .with_seed(42)
            .fit(&features, &labels)
            .unwrap()
    }

    #[test]
    fn round_trip_identical_predictions() {
        let dir = TempDir::new().unwrap();
        let model_path = dir.path().join("test_model.bin");

        let forest = train_simple_model();
        forest.save(&model_path).unwrap();
        let loaded = RandomForest::load(&model_path).unwrap();

        assert_eq!(forest, loaded);
        let samples = vec![vec![1.5, 0.0], vec![11.0, 0.0], vec![5.0, 0.0]];
        assert_eq!(
            forest.predict(&samples).unwrap(),
            loaded.predict(&samples).unwrap()
        );
    }

    #[test]
    fn load_nonexistent_file_error() {
        let dir = TempDir::new().unwrap();
        let err = RandomForest::load(dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, ForestError::ReadModel { .. }));
    }

    #[test]
    fn load_corrupt_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.bin");
        std::fs::write(&path, b"not a valid bincode file").unwrap();
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, ForestError::DeserializeModel { .. }));
    }

    #[test]
    fn future_version_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("future.bin");
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION + 1,
            n_trees: 5,
            n_features: 2,
            forest: train_simple_model(),
        };
        std::fs::write(&path, bincode::serialize(&envelope).unwrap()).unwrap();
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ForestError::IncompatibleModelVersion { expected: 1, found: 2, .. }
        ));
    }

    fn write_envelope(dir: &TempDir, name: &str, envelope: &ModelEnvelope) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bincode::serialize(envelope).unwrap()).unwrap();
        path
    }

    #[test]
    fn header_tree_count_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let forest = train_simple_model();
        let path = write_envelope(
            &dir,
            "trees.bin",
            &ModelEnvelope {
                format_version: FORMAT_VERSION,
                n_trees: 99,
                n_features: forest.n_features(),
                forest,
            },
        );
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, ForestError::CorruptModel { ref reason, .. } if reason.contains("99 trees")));
    }

    #[test]
    fn header_feature_count_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let forest = train_simple_model();
        let path = write_envelope(
            &dir,
            "features.bin",
            &ModelEnvelope {
                format_version: FORMAT_VERSION,
                n_trees: forest.n_trees(),
                n_features: 7,
                forest,
            },
        );
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, ForestError::CorruptModel { ref reason, .. } if reason.contains("7 features")));
    }

    #[test]
    fn tree_width_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let trained = train_simple_model();
        // Trees expect 2 features; the forest claims 1.
        let forest = RandomForest {
            n_features: 1,
            ..trained
        };
        let path = write_envelope(
            &dir,
            "width.bin",
            &ModelEnvelope {
                format_version: FORMAT_VERSION,
                n_trees: forest.n_trees(),
                n_features: 1,
                forest,
            },
        );
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, ForestError::CorruptModel { ref reason, .. } if reason.starts_with("tree 0")));
    }

    #[test]
    fn empty_forest_rejected() {
        let dir = TempDir::new().unwrap();
        let forest = RandomForest {
            trees: std::sync::Arc::new(Vec::new()),
            ..train_simple_model()
        };
        let path = write_envelope(
            &dir,
            "empty.bin",
            &ModelEnvelope {
                format_version: FORMAT_VERSION,
                n_trees: 0,
                n_features: 2,
                forest,
            },
        );
        let err = RandomForest::load(&path).unwrap_err();
        assert!(matches!(err, ForestError::CorruptModel { .. }));
    }

    #[test]
    fn save_to_missing_directory_error() {
        let dir = TempDir::new().unwrap();
        let err = train_simple_model()
            .save(dir.path().join("no/such/dir/model.bin"))
            .unwrap_err();
        assert!(matches!(err, ForestError::WriteModel { .. }));
    }
}
