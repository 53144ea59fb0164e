//! One-shot startup load of the model/metadata pair.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use super::source::{ArtifactSource, SourceError};
use super::xgboost::XgbModel;
use super::{Classifier, ModelError};
use crate::schema::{SchemaError, SchemaMetadata};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("Failed to hash {path}: {source}")]
    Hash {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid SHA-256 value; expected 64 hex characters, got '{0}'")]
    ChecksumFormat(String),
    #[error("Model SHA-256 mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    /// Model and metadata come from different training runs.
    #[error("Model and metadata are not a matched pair: {0}")]
    VersionMismatch(String),
}

/// A verified model/metadata pair ready to serve.
#[derive(Debug)]
pub struct LoadedArtifacts {
    pub model: XgbModel,
    pub metadata: SchemaMetadata,
    /// Hex SHA-256 of the model file as loaded.
    pub model_sha256: String,
}

/// Fetch, verify and parse the model, load the metadata, and check they match.
///
/// Any scratch file created by a remote source is removed before returning.
pub fn load_artifacts(
    source: &dyn ArtifactSource,
    metadata_path: &Path,
    expected_sha256: Option<&str>,
) -> Result<LoadedArtifacts, LoadError> {
    let expected_sha256 = expected_sha256.map(normalize_sha256).transpose()?;

    tracing::info!("Loading model from {}", source.describe());
    let fetched = source.fetch()?;
    let model_sha256 = sha256_file(fetched.path())?;
    if let Some(expected) = expected_sha256
        && expected != model_sha256
    {
        return Err(LoadError::ChecksumMismatch {
            expected,
            actual: model_sha256,
        });
    }
    let model = XgbModel::load_json(fetched.path())?;
    drop(fetched);

    tracing::info!("Loading metadata from {}", metadata_path.display());
    let metadata = SchemaMetadata::load_json(metadata_path)?;
    check_pair(&model, &metadata)?;

    Ok(LoadedArtifacts {
        model,
        metadata,
        model_sha256,
    })
}

/// Verify a classifier and metadata were produced by the same training run.
///
/// Guarantees every class index the model can emit names a label, and that
/// the model input width equals the reconciled vector width.
pub fn check_pair(model: &dyn Classifier, metadata: &SchemaMetadata) -> Result<(), LoadError> {
    if model.num_classes() != metadata.label_classes().len() {
        return Err(LoadError::VersionMismatch(format!(
            "model emits {} classes but metadata lists {} labels",
            model.num_classes(),
            metadata.label_classes().len()
        )));
    }
    if model.num_features() != metadata.feature_columns().len() {
        return Err(LoadError::VersionMismatch(format!(
            "model expects {} features but metadata lists {} columns",
            model.num_features(),
            metadata.feature_columns().len()
        )));
    }
    if let Some(names) = model.feature_names()
        && names != metadata.feature_columns()
    {
        let position = names
            .iter()
            .zip(metadata.feature_columns())
            .position(|(model_name, column)| model_name != column)
            .unwrap_or(0);
        return Err(LoadError::VersionMismatch(format!(
            "feature {position} is '{}' in the model but '{}' in metadata",
            names[position],
            metadata.feature_columns()[position]
        )));
    }
    Ok(())
}

/// Lower-case a hex SHA-256 digest, rejecting anything that is not 64 hex digits.
pub fn normalize_sha256(value: &str) -> Result<String, LoadError> {
    let trimmed = value.trim();
    if trimmed.len() != 64 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(LoadError::ChecksumFormat(trimmed.to_string()));
    }
    Ok(trimmed.to_ascii_lowercase())
}

fn sha256_file(path: &Path) -> Result<String, LoadError> {
    let hash_error = |source| LoadError::Hash {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(hash_error)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).map_err(hash_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
