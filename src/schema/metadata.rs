use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::SchemaError;

/// Ordered training-time feature layout and label vocabulary.
///
/// Produced by the training pipeline alongside the model artifact. The two
/// arrays are order-significant: `feature_columns[i]` is input slot `i` of the
/// model, and the model's class index `k` names `label_classes[k]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    feature_columns: Vec<String>,
    label_classes: Vec<String>,
}

impl SchemaMetadata {
    /// Build metadata from in-memory arrays, applying the same checks as [`Self::load_json`].
    pub fn new(
        feature_columns: Vec<String>,
        label_classes: Vec<String>,
    ) -> Result<Self, SchemaError> {
        let metadata = Self {
            feature_columns,
            label_classes,
        };
        metadata.validate()?;
        Ok(metadata)
    }

    /// Load and validate a `metadata.json` artifact.
    pub fn load_json(path: &Path) -> Result<Self, SchemaError> {
        let bytes = std::fs::read(path).map_err(|source| SchemaError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let metadata: Self =
            serde_json::from_slice(&bytes).map_err(|source| SchemaError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        metadata.validate()?;
        Ok(metadata)
    }

    /// Validate structural invariants of the metadata.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.feature_columns.is_empty() {
            return Err(SchemaError::Empty("feature_columns"));
        }
        if self.label_classes.is_empty() {
            return Err(SchemaError::Empty("label_classes"));
        }
        if let Some(dup) = first_duplicate(&self.feature_columns) {
            return Err(SchemaError::DuplicateColumn(dup.to_string()));
        }
        if let Some(dup) = first_duplicate(&self.label_classes) {
            return Err(SchemaError::DuplicateClass(dup.to_string()));
        }
        Ok(())
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn label_classes(&self) -> &[String] {
        &self.label_classes
    }

    /// Class name for a model output index, if the index is in range.
    pub fn label(&self, index: usize) -> Option<&str> {
        self.label_classes.get(index).map(String::as_str)
    }
}

fn first_duplicate(values: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(values.len());
    values
        .iter()
        .find(|value| !seen.insert(value.as_str()))
        .map(String::as_str)
}
