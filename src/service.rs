//! Prediction orchestration: encode, reconcile, predict, look up the label.

use std::sync::Arc;

use thiserror::Error;

use crate::model::{Classifier, LoadError, LoadedArtifacts, ModelError, check_pair};
use crate::schema::{
    FeatureRecord, ReconcileError, Reconciler, SchemaMetadata, UnknownColumnPolicy, encode,
};

#[derive(Debug, Error)]
pub enum PredictError {
    /// The record uses a category the model was never trained on and the
    /// reconciler is configured to refuse it.
    #[error(transparent)]
    Rejected(#[from] ReconcileError),
    #[error("Model prediction failed: {0}")]
    Model(#[from] ModelError),
    #[error("Model returned class index {index} but only {classes} labels exist")]
    LabelOutOfRange { index: usize, classes: usize },
}

impl PredictError {
    /// Internal failures are logged server-side and never described to callers.
    pub fn is_internal(&self) -> bool {
        !matches!(self, PredictError::Rejected(_))
    }
}

/// Outcome of a single prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prediction {
    pub class_index: usize,
    pub species: String,
}

/// Immutable prediction pipeline built once at startup.
///
/// Holds no interior mutability, so one instance serves concurrent requests
/// behind an `Arc` without locking.
pub struct PredictionService {
    model: Arc<dyn Classifier>,
    metadata: SchemaMetadata,
    reconciler: Reconciler,
}

impl PredictionService {
    /// Pair a classifier with its metadata, verifying they match and that the
    /// request vocabulary can produce every column the metadata expects.
    pub fn new(
        model: Arc<dyn Classifier>,
        metadata: SchemaMetadata,
        policy: UnknownColumnPolicy,
    ) -> Result<Self, LoadError> {
        check_pair(model.as_ref(), &metadata)?;
        let reconciler = Reconciler::new(&metadata, policy)?;
        Ok(Self {
            model,
            metadata,
            reconciler,
        })
    }

    pub fn from_artifacts(
        artifacts: LoadedArtifacts,
        policy: UnknownColumnPolicy,
    ) -> Result<Self, LoadError> {
        Self::new(Arc::new(artifacts.model), artifacts.metadata, policy)
    }

    /// Predict the species for a validated record.
    pub fn predict(&self, record: &FeatureRecord) -> Result<Prediction, PredictError> {
        let encoded = encode(record);
        let row = self.reconciler.reconcile(&encoded)?;
        let class_index = self.model.predict_class_index(&row)?;
        let species = self.label_for_index(class_index)?.to_string();
        tracing::debug!("Predicted class {class_index} ({species})");
        Ok(Prediction {
            class_index,
            species,
        })
    }

    /// Label for a model output index.
    pub fn label_for_index(&self, index: usize) -> Result<&str, PredictError> {
        self.metadata
            .label(index)
            .ok_or(PredictError::LabelOutOfRange {
                index,
                classes: self.metadata.label_classes().len(),
            })
    }

    pub fn metadata(&self) -> &SchemaMetadata {
        &self.metadata
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn num_classes(&self) -> usize {
        self.model.num_classes()
    }
}
