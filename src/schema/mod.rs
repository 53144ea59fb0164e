//! Training-time feature schema and the per-request mapping onto it.
//!
//! A validated [`FeatureRecord`] is one-hot encoded into an [`EncodedVector`]
//! and then reconciled against the ordered `feature_columns` stored in
//! [`SchemaMetadata`], producing exactly the vector layout the model was fit on.

mod encoder;
mod metadata;
mod reconcile;
mod record;

pub use encoder::{EncodedVector, encode, indicator_columns, vocabulary_columns};
pub use metadata::SchemaMetadata;
pub use reconcile::{ReconcileError, Reconciler, UnknownColumn, UnknownColumnPolicy};
pub use record::{Categorical, FeatureRecord, Island, NUMERIC_FIELDS, Sex};

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or cross-checking the schema metadata artifact.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The metadata file could not be read.
    #[error("Failed to read metadata {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The metadata file is not valid JSON or has the wrong shape.
    #[error("Invalid metadata {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// One of the required arrays is empty.
    #[error("Metadata field `{0}` must not be empty")]
    Empty(&'static str),
    /// A feature column appears more than once.
    #[error("Duplicate feature column `{0}` in metadata")]
    DuplicateColumn(String),
    /// A label class appears more than once.
    #[error("Duplicate label class `{0}` in metadata")]
    DuplicateClass(String),
    /// The declared vocabulary can never produce these metadata columns.
    #[error(
        "Metadata expects columns the request vocabulary cannot produce: {}",
        .0.join(", ")
    )]
    UnproducibleColumns(Vec<String>),
    /// Record fields the metadata has no column for, under a strict policy.
    #[error(
        "Metadata has no column for record fields {}; strict reconciliation would refuse every request",
        .0.join(", ")
    )]
    UnusedFields(Vec<String>),
}
