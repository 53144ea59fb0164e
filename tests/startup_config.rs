mod support;

use std::path::PathBuf;

use penguin_serve::config::{self, CONFIG_FILE_NAME, ConfigError};
use penguin_serve::model::load_artifacts;
use penguin_serve::schema::UnknownColumnPolicy;
use penguin_serve::service::PredictionService;
use support::fixture;
use support::penguin_env::PenguinEnvGuard;

const OVERRIDES: [&str; 10] = [
    "MODEL_PATH",
    "METADATA_PATH",
    "MODEL_GCS_URI",
    "MODEL_BUCKET",
    "MODEL_OBJECT",
    "MODEL_SHA256",
    "GCS_ENDPOINT",
    "GCS_ACCESS_TOKEN",
    "PENGUIN_SERVE_BIND",
    "PENGUIN_SERVE_UNKNOWN_COLUMNS",
];

/// Blank every override so the host environment cannot leak in.
fn clean_env<'a>(home: &'a str, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    let mut vars: Vec<(&str, &str)> = OVERRIDES.iter().map(|key| (*key, "")).collect();
    vars.push(("PENGUIN_SERVE_HOME", home));
    vars.extend_from_slice(extra);
    vars
}

#[test]
fn config_file_in_app_root_is_picked_up_and_env_wins() {
    let home = tempfile::tempdir().unwrap();
    let root = home.path().join(".penguin-serve");
    std::fs::create_dir_all(&root).unwrap();
    std::fs::write(
        root.join(CONFIG_FILE_NAME),
        r#"
bind = "127.0.0.1:7000"
unknown_columns = "reject"

[artifacts]
model_path = "/does/not/exist/model.json"
"#,
    )
    .unwrap();

    let model = fixture("model.json").display().to_string();
    let home_str = home.path().display().to_string();
    let _env = PenguinEnvGuard::set(&clean_env(
        &home_str,
        &[("MODEL_PATH", model.as_str()), ("PENGUIN_SERVE_BIND", "127.0.0.1:7001")],
    ));

    let config = config::load(None).unwrap();
    assert_eq!(config.bind_addr().unwrap().port(), 7001);
    assert_eq!(config.unknown_columns, UnknownColumnPolicy::Reject);
    assert_eq!(config.model_path().unwrap(), PathBuf::from(&model));
    assert_eq!(
        config.metadata_path().unwrap(),
        root.join("data").join("metadata.json")
    );
}

#[test]
fn configured_paths_build_a_working_service() {
    let home = tempfile::tempdir().unwrap();
    let model = fixture("model.json").display().to_string();
    let metadata = fixture("metadata.json").display().to_string();
    let home_str = home.path().display().to_string();
    let _env = PenguinEnvGuard::set(&clean_env(
        &home_str,
        &[("MODEL_PATH", model.as_str()), ("METADATA_PATH", metadata.as_str())],
    ));

    let config = config::load(None).unwrap();
    let source = config.artifact_source().unwrap();
    let artifacts = load_artifacts(
        source.as_ref(),
        &config.metadata_path().unwrap(),
        config.artifacts.model_sha256.as_deref(),
    )
    .unwrap();
    let service = PredictionService::from_artifacts(artifacts, config.unknown_columns).unwrap();
    assert_eq!(service.num_classes(), 3);
}

#[test]
fn explicit_config_path_must_exist() {
    let home = tempfile::tempdir().unwrap();
    let home_str = home.path().display().to_string();
    let _env = PenguinEnvGuard::set(&clean_env(&home_str, &[]));
    let err = config::load(Some(&home.path().join("missing.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Read { .. }));
}

#[test]
fn invalid_policy_in_env_aborts_startup() {
    let home = tempfile::tempdir().unwrap();
    let home_str = home.path().display().to_string();
    let _env = PenguinEnvGuard::set(&clean_env(
        &home_str,
        &[("PENGUIN_SERVE_UNKNOWN_COLUMNS", "sometimes")],
    ));
    assert!(matches!(
        config::load(None),
        Err(ConfigError::InvalidValue { .. })
    ));
}
