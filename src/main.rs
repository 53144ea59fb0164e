//! Entry point for the penguin species prediction server.

use std::path::PathBuf;
use std::sync::Arc;

use penguin_serve::config::{self, ServeConfig};
use penguin_serve::model::load_artifacts;
use penguin_serve::service::PredictionService;
use penguin_serve::{api, logging};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let Some(options) = parse_args(std::env::args().skip(1).collect())? else {
        println!("{}", help_text());
        return Ok(());
    };
    let mut config = config::load(options.config.as_deref()).map_err(|err| err.to_string())?;
    if let Some(bind) = options.bind {
        config.bind = bind;
        config.validate().map_err(|err| err.to_string())?;
    }

    if let Err(err) = logging::init(&config.logging) {
        eprintln!("Logging disabled: {err}");
    }

    let service = build_service(&config).map_err(|err| {
        tracing::error!("Startup failed: {err}");
        err
    })?;
    let addr = config.bind_addr().map_err(|err| err.to_string())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| format!("Failed to start async runtime: {err}"))?;
    runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|err| format!("Failed to bind {addr}: {err}"))?;
        api::serve(listener, Arc::new(service), api::shutdown_signal())
            .await
            .map_err(|err| format!("Server error: {err}"))
    })
}

fn build_service(config: &ServeConfig) -> Result<PredictionService, String> {
    let source = config.artifact_source().map_err(|err| err.to_string())?;
    let metadata_path = config.metadata_path().map_err(|err| err.to_string())?;
    let artifacts = load_artifacts(
        source.as_ref(),
        &metadata_path,
        config.artifacts.model_sha256.as_deref(),
    )
    .map_err(|err| err.to_string())?;
    tracing::info!(
        "Model loaded: sha256={} features={} classes={:?}",
        artifacts.model_sha256,
        artifacts.metadata.feature_columns().len(),
        artifacts.metadata.label_classes()
    );
    let service = PredictionService::from_artifacts(artifacts, config.unknown_columns)
        .map_err(|err| err.to_string())?;
    let unseen = service.reconciler().unseen_columns();
    if !unseen.is_empty() {
        tracing::warn!(
            "Columns the model never saw ({}): {}",
            config.unknown_columns,
            unseen.join(", ")
        );
    }
    Ok(service)
}

#[derive(Debug, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    bind: Option<String>,
}

/// `Ok(None)` means help was requested.
fn parse_args(args: Vec<String>) -> Result<Option<CliOptions>, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Ok(None),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--bind" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--bind requires a value".to_string())?;
                options.bind = Some(value.clone());
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(Some(options))
}

fn help_text() -> String {
    [
        "penguin-serve",
        "",
        "Serve penguin species predictions over HTTP.",
        "",
        "Usage:",
        "  penguin-serve [--config <path>] [--bind <addr:port>]",
        "",
        "Options:",
        "  --config <path>  TOML config file (default: penguin-serve.toml in the app directory)",
        "  --bind <addr>    Listen address, overrides config and PENGUIN_SERVE_BIND",
        "",
        "Environment:",
        "  MODEL_PATH, METADATA_PATH, MODEL_SHA256, MODEL_GCS_URI,",
        "  MODEL_BUCKET + MODEL_OBJECT, GCS_ENDPOINT, GCS_ACCESS_TOKEN,",
        "  PENGUIN_SERVE_BIND, PENGUIN_SERVE_UNKNOWN_COLUMNS (drop|reject), RUST_LOG",
    ]
    .join("\n")
}
