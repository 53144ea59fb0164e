use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::SchemaError;
use super::encoder::{EncodedVector, vocabulary_columns};
use super::metadata::SchemaMetadata;
use super::record::NUMERIC_FIELDS;

/// What to do with encoded columns the training schema does not contain.
///
/// Such a column comes from a category that is valid input but was never seen
/// in training data, so the model has no slot for it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownColumnPolicy {
    /// Discard the column; the remaining features are still scored.
    #[default]
    Drop,
    /// Refuse the request with [`ReconcileError::UnknownColumns`].
    Reject,
}

impl FromStr for UnknownColumnPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "reject" => Ok(Self::Reject),
            other => Err(format!(
                "Invalid unknown-column policy '{other}'; expected 'drop' or 'reject'"
            )),
        }
    }
}

impl fmt::Display for UnknownColumnPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Drop => "drop",
            Self::Reject => "reject",
        })
    }
}

/// An encoded column with no slot in the training schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownColumn {
    pub column: String,
    /// Record field that produced the column.
    pub field: &'static str,
    /// Category value for indicator columns; `None` for numeric fields.
    pub category: Option<&'static str>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// The record encodes to columns the model was never trained on.
    #[error("Columns not present in the training schema: {}", column_list(.0))]
    UnknownColumns(Vec<UnknownColumn>),
}

fn column_list(unknown: &[UnknownColumn]) -> String {
    unknown
        .iter()
        .map(|unknown| unknown.column.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Aligns encoded records to the training column order.
///
/// Built once at startup from the metadata; read-only afterwards.
#[derive(Debug, Clone)]
pub struct Reconciler {
    width: usize,
    positions: HashMap<String, usize>,
    policy: UnknownColumnPolicy,
    unseen: Vec<String>,
}

impl Reconciler {
    /// Build a reconciler, failing if the metadata names a column that no
    /// valid record can ever produce.
    ///
    /// Under [`UnknownColumnPolicy::Reject`] every numeric field must also be a
    /// metadata column, otherwise every request would be refused.
    pub fn new(metadata: &SchemaMetadata, policy: UnknownColumnPolicy) -> Result<Self, SchemaError> {
        let vocabulary = vocabulary_columns();
        let unproducible: Vec<String> = metadata
            .feature_columns()
            .iter()
            .filter(|column| !vocabulary.contains(*column))
            .cloned()
            .collect();
        if !unproducible.is_empty() {
            return Err(SchemaError::UnproducibleColumns(unproducible));
        }

        let positions: HashMap<String, usize> = metadata
            .feature_columns()
            .iter()
            .enumerate()
            .map(|(idx, column)| (column.clone(), idx))
            .collect();
        let unseen: Vec<String> = vocabulary
            .into_iter()
            .filter(|column| !positions.contains_key(column))
            .collect();
        if policy == UnknownColumnPolicy::Reject {
            let unused: Vec<String> = NUMERIC_FIELDS
                .iter()
                .filter(|field| unseen.iter().any(|column| column == *field))
                .map(|field| field.to_string())
                .collect();
            if !unused.is_empty() {
                return Err(SchemaError::UnusedFields(unused));
            }
        }

        Ok(Self {
            width: metadata.feature_columns().len(),
            positions,
            policy,
            unseen,
        })
    }

    /// Produce the model input vector: slot `i` holds the value for
    /// `feature_columns[i]`, or zero when the record did not encode it.
    pub fn reconcile(&self, encoded: &EncodedVector) -> Result<Vec<f32>, ReconcileError> {
        let mut row = vec![0.0f32; self.width];
        let mut unknown = Vec::new();
        for (column, entry) in encoded.entries() {
            match self.positions.get(column) {
                Some(&idx) => row[idx] = entry.value,
                None => unknown.push(UnknownColumn {
                    column: column.to_string(),
                    field: entry.field,
                    category: entry.category,
                }),
            }
        }
        if unknown.is_empty() {
            return Ok(row);
        }
        match self.policy {
            UnknownColumnPolicy::Drop => {
                tracing::debug!(
                    "Dropping columns absent from training schema: {}",
                    column_list(&unknown)
                );
                Ok(row)
            }
            UnknownColumnPolicy::Reject => Err(ReconcileError::UnknownColumns(unknown)),
        }
    }

    /// Number of model input slots.
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn policy(&self) -> UnknownColumnPolicy {
        self.policy
    }

    /// Vocabulary columns the training data never produced.
    pub fn unseen_columns(&self) -> &[String] {
        &self.unseen
    }
}
