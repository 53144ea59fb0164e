//! Developer utility that loads a model/metadata pair with the server's checks
//! and prints a summary.

use std::path::PathBuf;

use penguin_serve::config;
use penguin_serve::model::{ArtifactSource, LocalArtifact, load_artifacts};
use penguin_serve::schema::Reconciler;

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let config = config::load(options.config.as_deref()).map_err(|err| err.to_string())?;
    let source: Box<dyn ArtifactSource> = match &options.model {
        Some(path) => Box::new(LocalArtifact::new(path)),
        None => config.artifact_source().map_err(|err| err.to_string())?,
    };
    let metadata_path = match &options.metadata {
        Some(path) => path.clone(),
        None => config.metadata_path().map_err(|err| err.to_string())?,
    };
    let sha256 = options
        .sha256
        .as_deref()
        .or(config.artifacts.model_sha256.as_deref());

    let artifacts =
        load_artifacts(source.as_ref(), &metadata_path, sha256).map_err(|err| err.to_string())?;
    let reconciler = Reconciler::new(&artifacts.metadata, config.unknown_columns)
        .map_err(|err| err.to_string())?;

    println!("model:      {}", source.describe());
    println!("metadata:   {}", metadata_path.display());
    println!("sha256:     {}", artifacts.model_sha256);
    println!("objective:  {:?}", artifacts.model.objective());
    println!("trees:      {}", artifacts.model.num_trees());
    println!("classes:    {}", artifacts.metadata.label_classes().join(", "));
    println!("features ({}):", artifacts.metadata.feature_columns().len());
    for (idx, column) in artifacts.metadata.feature_columns().iter().enumerate() {
        println!("  {idx:>3} {column}");
    }
    let unseen = reconciler.unseen_columns();
    if unseen.is_empty() {
        println!("unseen vocabulary columns: none");
    } else {
        println!(
            "unseen vocabulary columns ({}): {}",
            reconciler.policy(),
            unseen.join(", ")
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct CliOptions {
    config: Option<PathBuf>,
    model: Option<PathBuf>,
    metadata: Option<PathBuf>,
    sha256: Option<String>,
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--config" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--config requires a value".to_string())?;
                options.config = Some(PathBuf::from(value));
            }
            "--model" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--model requires a value".to_string())?;
                options.model = Some(PathBuf::from(value));
            }
            "--metadata" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--metadata requires a value".to_string())?;
                options.metadata = Some(PathBuf::from(value));
            }
            "--sha256" => {
                idx += 1;
                let value = args.get(idx).ok_or_else(|| "--sha256 requires a value".to_string())?;
                options.sha256 = Some(value.clone());
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }
    Ok(options)
}

fn help_text() -> String {
    [
        "penguin-artifacts-check",
        "",
        "Load a model/metadata pair with the server's startup checks and print a summary.",
        "",
        "Usage:",
        "  penguin-artifacts-check [--config <path>] [--model <model.json>] [--metadata <metadata.json>] [--sha256 <hex>]",
        "",
        "Unset options fall back to the server configuration and environment.",
    ]
    .join("\n")
}
