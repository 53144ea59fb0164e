mod support;

use std::sync::Arc;

use penguin_serve::model::{Classifier, LoadError, LocalArtifact, ModelError, XgbModel, load_artifacts};
use penguin_serve::schema::{
    Categorical, FeatureRecord, Island, ReconcileError, Reconciler, SchemaMetadata, Sex,
    UnknownColumn, UnknownColumnPolicy, encode, indicator_columns,
};
use penguin_serve::service::{PredictError, PredictionService};
use serde_json::Value;
use support::{adelie, chinstrap, fixture, fixture_service, gentoo, load_fixture_artifacts};

fn segment_sum<C: Categorical>(metadata: &SchemaMetadata, row: &[f32]) -> f32 {
    let columns = indicator_columns::<C>();
    metadata
        .feature_columns()
        .iter()
        .zip(row)
        .filter(|(column, _)| columns.contains(*column))
        .map(|(_, value)| *value)
        .sum()
}

#[test]
fn reconciled_rows_match_metadata_width_with_one_hot_segments() {
    let artifacts = load_fixture_artifacts();
    let reconciler = Reconciler::new(&artifacts.metadata, UnknownColumnPolicy::Reject).unwrap();
    for &sex in Sex::VALUES {
        for &island in Island::VALUES {
            let record = FeatureRecord {
                sex,
                island,
                ..adelie()
            };
            let row = reconciler.reconcile(&encode(&record)).unwrap();
            assert_eq!(row.len(), artifacts.metadata.feature_columns().len());
            assert_eq!(segment_sum::<Sex>(&artifacts.metadata, &row), 1.0);
            assert_eq!(segment_sum::<Island>(&artifacts.metadata, &row), 1.0);
        }
    }
}

#[test]
fn fixture_model_separates_species() {
    let service = fixture_service(UnknownColumnPolicy::Drop);
    assert_eq!(service.predict(&adelie()).unwrap().species, "Adelie");
    assert_eq!(service.predict(&chinstrap()).unwrap().species, "Chinstrap");
    assert_eq!(service.predict(&gentoo()).unwrap().species, "Gentoo");
}

#[test]
fn every_model_index_names_a_label() {
    let service = fixture_service(UnknownColumnPolicy::Drop);
    for index in 0..service.num_classes() {
        let label = service.label_for_index(index).unwrap();
        assert_eq!(label, service.metadata().label_classes()[index]);
    }
    assert!(matches!(
        service.label_for_index(service.num_classes()),
        Err(PredictError::LabelOutOfRange { .. })
    ));
}

#[test]
fn repeated_predictions_agree() {
    let service = fixture_service(UnknownColumnPolicy::Drop);
    for record in [adelie(), chinstrap(), gentoo()] {
        assert_eq!(
            service.predict(&record).unwrap(),
            service.predict(&record).unwrap()
        );
    }
}

#[test]
fn biscoe_male_yields_known_species() {
    let service = fixture_service(UnknownColumnPolicy::Drop);
    let record = FeatureRecord {
        bill_length_mm: 39.1,
        bill_depth_mm: 18.7,
        flipper_length_mm: 181.0,
        body_mass_g: 3750.0,
        year: 2007,
        sex: Sex::Male,
        island: Island::Biscoe,
    };
    let prediction = service.predict(&record).unwrap();
    assert!(
        service
            .metadata()
            .label_classes()
            .contains(&prediction.species)
    );
}

#[test]
fn torgersen_female_with_zero_mass_succeeds() {
    let service = fixture_service(UnknownColumnPolicy::Drop);
    let record = FeatureRecord {
        bill_length_mm: 38.9,
        bill_depth_mm: 17.8,
        flipper_length_mm: 181.0,
        body_mass_g: 0.0,
        year: 2007,
        sex: Sex::Female,
        island: Island::Torgersen,
    };
    assert_eq!(service.predict(&record).unwrap().species, "Adelie");
}

/// Fixture model and metadata retrained as if no Torgersen bird was ever seen.
fn without_torgersen() -> (XgbModel, SchemaMetadata) {
    let mut model: Value =
        serde_json::from_slice(&std::fs::read(fixture("model.json")).unwrap()).unwrap();
    let learner = &mut model["learner"];
    learner["feature_names"]
        .as_array_mut()
        .unwrap()
        .retain(|name| name != "island_Torgersen");
    learner["feature_types"].as_array_mut().unwrap().pop();
    learner["learner_model_param"]["num_feature"] = Value::from("9");
    let model = XgbModel::from_slice(&serde_json::to_vec(&model).unwrap()).unwrap();

    let full = load_fixture_artifacts().metadata;
    let columns = full
        .feature_columns()
        .iter()
        .filter(|column| column.as_str() != "island_Torgersen")
        .cloned()
        .collect();
    let metadata = SchemaMetadata::new(columns, full.label_classes().to_vec()).unwrap();
    (model, metadata)
}

#[test]
fn unseen_category_is_dropped_by_default() {
    let (model, metadata) = without_torgersen();
    let service =
        PredictionService::new(Arc::new(model), metadata, UnknownColumnPolicy::Drop).unwrap();
    assert_eq!(service.reconciler().unseen_columns(), ["island_Torgersen"]);

    let record = FeatureRecord {
        island: Island::Torgersen,
        ..adelie()
    };
    let row = service.reconciler().reconcile(&encode(&record)).unwrap();
    assert_eq!(row.len(), 9);
    assert_eq!(segment_sum::<Island>(service.metadata(), &row), 0.0);
    assert!(service.predict(&record).is_ok());
}

#[test]
fn unseen_category_is_refused_when_strict() {
    let (model, metadata) = without_torgersen();
    let service =
        PredictionService::new(Arc::new(model), metadata, UnknownColumnPolicy::Reject).unwrap();
    let record = FeatureRecord {
        island: Island::Torgersen,
        ..adelie()
    };
    let err = service.predict(&record).unwrap_err();
    assert!(!err.is_internal());
    let PredictError::Rejected(ReconcileError::UnknownColumns(columns)) = err else {
        panic!("expected unknown columns to be rejected");
    };
    assert_eq!(
        columns,
        [UnknownColumn {
            column: "island_Torgersen".to_string(),
            field: "island",
            category: Some("Torgersen"),
        }]
    );
    assert!(service.predict(&adelie()).is_ok());
}

struct Broken;

impl Classifier for Broken {
    fn num_classes(&self) -> usize {
        3
    }

    fn num_features(&self) -> usize {
        10
    }

    fn predict_class_index(&self, _: &[f32]) -> Result<usize, ModelError> {
        Err(ModelError::Backend("forced failure".to_string()))
    }
}

#[test]
fn model_failure_is_internal_and_never_a_prediction() {
    let metadata = load_fixture_artifacts().metadata;
    let service =
        PredictionService::new(Arc::new(Broken), metadata, UnknownColumnPolicy::Drop).unwrap();
    let err = service.predict(&adelie()).unwrap_err();
    assert!(err.is_internal());
}

#[test]
fn sha256_pin_is_enforced() {
    let pinned = load_fixture_artifacts().model_sha256;
    let source = LocalArtifact::new(fixture("model.json"));
    load_artifacts(&source, &fixture("metadata.json"), Some(&pinned.to_uppercase())).unwrap();

    let wrong = "0".repeat(64);
    assert!(matches!(
        load_artifacts(&source, &fixture("metadata.json"), Some(&wrong)),
        Err(LoadError::ChecksumMismatch { .. })
    ));
}

#[test]
fn metadata_from_another_run_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let metadata_path = dir.path().join("metadata.json");
    let mut metadata: Value =
        serde_json::from_slice(&std::fs::read(fixture("metadata.json")).unwrap()).unwrap();
    metadata["label_classes"] = serde_json::json!(["Adelie", "Gentoo"]);
    std::fs::write(&metadata_path, serde_json::to_vec(&metadata).unwrap()).unwrap();

    let err = load_artifacts(
        &LocalArtifact::new(fixture("model.json")),
        &metadata_path,
        None,
    )
    .unwrap_err();
    assert!(matches!(err, LoadError::VersionMismatch(_)), "{err}");
}

#[test]
fn missing_model_file_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_artifacts(
        &LocalArtifact::new(dir.path().join("model.json")),
        &fixture("metadata.json"),
        None,
    )
    .unwrap_err();
    assert!(err.to_string().contains("not found"), "{err}");
}
