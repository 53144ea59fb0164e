//! Server configuration: an optional TOML file overlaid with environment variables.

use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::model::{ArtifactSource, LocalArtifact, RemoteObject, SourceError};
use crate::schema::UnknownColumnPolicy;

/// File name looked up in the app root when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "penguin-serve.toml";

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_MODEL_FILE: &str = "model.json";
const DEFAULT_METADATA_FILE: &str = "metadata.json";

/// Errors raised while loading or interpreting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error(transparent)]
    AppDir(#[from] AppDirError),
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Top-level server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Socket address the HTTP listener binds to.
    pub bind: String,
    /// What to do with encoded columns the model never saw.
    pub unknown_columns: UnknownColumnPolicy,
    pub artifacts: ArtifactSettings,
    pub logging: LogSettings,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            unknown_columns: UnknownColumnPolicy::default(),
            artifacts: ArtifactSettings::default(),
            logging: LogSettings::default(),
        }
    }
}

/// Where the model/metadata pair is loaded from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Local model file; defaults to `data/model.json` in the app root.
    pub model_path: Option<PathBuf>,
    /// Local metadata file; defaults to `data/metadata.json` in the app root.
    pub metadata_path: Option<PathBuf>,
    /// Optional hex SHA-256 pin for the model file.
    pub model_sha256: Option<String>,
    /// When set, the model is downloaded instead of read from `model_path`.
    pub remote: Option<RemoteSettings>,
    /// Bearer token for the object store. Environment only.
    #[serde(skip)]
    pub access_token: Option<AccessToken>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    pub bucket: String,
    pub object: String,
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Secret kept out of `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Logging knobs consumed by [`crate::logging::init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: Option<String>,
    /// Write a per-launch log file under the app logs directory.
    pub file: bool,
    /// Number of log files kept after pruning.
    pub max_files: usize,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: None,
            file: true,
            max_files: 10,
        }
    }
}

/// Load configuration from `explicit` or the app root, then apply environment overrides.
///
/// A missing default file yields defaults; a missing explicit file is an error.
pub fn load(explicit: Option<&Path>) -> Result<ServeConfig, ConfigError> {
    let mut config = match explicit {
        Some(path) => load_from(path)?,
        None => {
            let path = app_dirs::app_root_dir()?.join(CONFIG_FILE_NAME);
            if path.is_file() {
                load_from(&path)?
            } else {
                ServeConfig::default()
            }
        }
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Parse a TOML config file.
pub fn load_from(path: &Path) -> Result<ServeConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
        path: path.to_path_buf(),
        source,
    })
}

impl ServeConfig {
    /// Overlay environment variables read through `lookup`. Empty values count as unset.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(bind) = var("PENGUIN_SERVE_BIND") {
            self.bind = bind.trim().to_string();
        }
        if let Some(policy) = var("PENGUIN_SERVE_UNKNOWN_COLUMNS") {
            self.unknown_columns =
                policy
                    .parse()
                    .map_err(|message| ConfigError::InvalidValue {
                        key: "PENGUIN_SERVE_UNKNOWN_COLUMNS",
                        message,
                    })?;
        }
        if let Some(path) = var("MODEL_PATH") {
            self.artifacts.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = var("METADATA_PATH") {
            self.artifacts.metadata_path = Some(PathBuf::from(path));
        }
        if let Some(sha) = var("MODEL_SHA256") {
            self.artifacts.model_sha256 = Some(sha);
        }

        let endpoint = self
            .artifacts
            .remote
            .as_ref()
            .and_then(|remote| remote.endpoint.clone());
        if let Some(uri) = var("MODEL_GCS_URI") {
            let object = RemoteObject::from_uri(&uri)?;
            self.artifacts.remote = Some(RemoteSettings {
                bucket: object.bucket().to_string(),
                object: object.key().to_string(),
                endpoint,
            });
        } else {
            match (var("MODEL_BUCKET"), var("MODEL_OBJECT")) {
                (Some(bucket), Some(object)) => {
                    self.artifacts.remote = Some(RemoteSettings {
                        bucket,
                        object,
                        endpoint,
                    });
                }
                (None, None) => {}
                (Some(_), None) => return Err(missing_pair("MODEL_OBJECT", "MODEL_BUCKET")),
                (None, Some(_)) => return Err(missing_pair("MODEL_BUCKET", "MODEL_OBJECT")),
            }
        }
        if let Some(endpoint) = var("GCS_ENDPOINT") {
            match self.artifacts.remote.as_mut() {
                Some(remote) => remote.endpoint = Some(endpoint),
                None => tracing::warn!("GCS_ENDPOINT is set but no remote model is configured"),
            }
        }
        if let Some(token) = var("GCS_ACCESS_TOKEN") {
            self.artifacts.access_token = Some(AccessToken::new(token));
        }
        Ok(())
    }

    /// Reject values that would only fail later at bind or prune time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.logging.max_files == 0 {
            return Err(ConfigError::InvalidValue {
                key: "logging.max_files",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .parse()
            .map_err(|err: std::net::AddrParseError| ConfigError::InvalidValue {
                key: "bind",
                message: format!("'{}': {err}", self.bind),
            })
    }

    pub fn model_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.artifacts.model_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dirs::default_data_dir()?.join(DEFAULT_MODEL_FILE)),
        }
    }

    pub fn metadata_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.artifacts.metadata_path {
            Some(path) => Ok(path.clone()),
            None => Ok(app_dirs::default_data_dir()?.join(DEFAULT_METADATA_FILE)),
        }
    }

    /// Build the model source: the remote object when configured, else the local file.
    pub fn artifact_source(&self) -> Result<Box<dyn ArtifactSource>, ConfigError> {
        let Some(remote) = &self.artifacts.remote else {
            return Ok(Box::new(LocalArtifact::new(self.model_path()?)));
        };
        let mut object = RemoteObject::new(remote.bucket.as_str(), remote.object.as_str())?;
        if let Some(endpoint) = &remote.endpoint {
            object = object.with_endpoint(endpoint.as_str());
        }
        if let Some(token) = &self.artifacts.access_token {
            object = object.with_access_token(token.expose());
        }
        Ok(Box::new(object))
    }
}

fn missing_pair(missing: &'static str, present: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: missing,
        message: format!("required when {present} is set"),
    }
}
