//! Trained model artifacts: the numeric classifier, where it is fetched from,
//! and the startup loader that pairs it with its schema metadata.

mod loader;
mod source;
mod xgboost;

pub use loader::{LoadError, LoadedArtifacts, check_pair, load_artifacts, normalize_sha256};
pub use source::{ArtifactSource, FetchedArtifact, LocalArtifact, RemoteObject, SourceError};
pub use xgboost::{Objective, XgbModel};

use std::path::PathBuf;

use thiserror::Error;

/// Opaque numeric classifier: an ordered feature vector in, a class index out.
///
/// Implementations are immutable after loading and shared across concurrent
/// requests without locking.
pub trait Classifier: Send + Sync {
    /// Number of classes the model can emit; indices are `0..num_classes()`.
    fn num_classes(&self) -> usize;

    /// Length of the feature vector the model was fit on.
    fn num_features(&self) -> usize;

    /// Column names recorded in the artifact at training time, if any.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Predict the best class index for a feature vector.
    fn predict_class_index(&self, features: &[f32]) -> Result<usize, ModelError>;
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Model is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    /// The artifact parsed but violates a structural invariant.
    #[error("Malformed model: {0}")]
    Malformed(String),
    /// The artifact uses a feature this loader does not implement.
    #[error("Unsupported model: {0}")]
    Unsupported(String),
    #[error("Expected {expected} features but received {actual}")]
    FeatureCount { expected: usize, actual: usize },
    /// Failure reported by a classifier backend at prediction time.
    #[error("Prediction backend failed: {0}")]
    Backend(String),
}
