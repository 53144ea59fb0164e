#![allow(dead_code)]

pub mod penguin_env;

use std::path::PathBuf;

use penguin_serve::model::{LoadedArtifacts, LocalArtifact, load_artifacts};
use penguin_serve::schema::{FeatureRecord, Island, Sex, UnknownColumnPolicy};
use penguin_serve::service::PredictionService;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn load_fixture_artifacts() -> LoadedArtifacts {
    load_artifacts(
        &LocalArtifact::new(fixture("model.json")),
        &fixture("metadata.json"),
        None,
    )
    .expect("load fixture artifacts")
}

pub fn fixture_service(policy: UnknownColumnPolicy) -> PredictionService {
    PredictionService::from_artifacts(load_fixture_artifacts(), policy).expect("build service")
}

/// A typical Adelie from Biscoe.
pub fn adelie() -> FeatureRecord {
    FeatureRecord {
        bill_length_mm: 39.0,
        bill_depth_mm: 18.5,
        flipper_length_mm: 190.0,
        body_mass_g: 3800.0,
        year: 2008,
        sex: Sex::Male,
        island: Island::Biscoe,
    }
}

pub fn gentoo() -> FeatureRecord {
    FeatureRecord {
        bill_length_mm: 47.5,
        bill_depth_mm: 14.5,
        flipper_length_mm: 217.0,
        body_mass_g: 5200.0,
        year: 2009,
        sex: Sex::Female,
        island: Island::Biscoe,
    }
}

pub fn chinstrap() -> FeatureRecord {
    FeatureRecord {
        bill_length_mm: 49.0,
        bill_depth_mm: 18.4,
        flipper_length_mm: 195.0,
        body_mass_g: 3700.0,
        year: 2007,
        sex: Sex::Male,
        island: Island::Dream,
    }
}
