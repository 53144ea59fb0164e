//! Where a model artifact comes from: a local file or a remote object store.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use url::Url;

use crate::http_client;

const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
const MAX_MODEL_BYTES: u64 = 256 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Model artifact not found at {0}")]
    Missing(PathBuf),
    #[error("Invalid object URI '{0}'; expected gs://<bucket>/<key>")]
    InvalidUri(String),
    #[error("Invalid object store endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Object {url} unavailable: HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to download {url}: {message}")]
    Transport { url: String, message: String },
    #[error("Failed to prepare scratch file: {0}")]
    Scratch(std::io::Error),
    #[error("Failed to write downloaded artifact: {0}")]
    Write(std::io::Error),
}

/// A resolved artifact on the local filesystem.
///
/// Remote fetches own their scratch file; it is deleted when this value drops,
/// so the path must not be used after the load completes.
#[derive(Debug)]
pub struct FetchedArtifact {
    path: PathBuf,
    scratch: Option<NamedTempFile>,
}

impl FetchedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file is a temporary download.
    pub fn is_scratch(&self) -> bool {
        self.scratch.is_some()
    }
}

/// Capability to produce the model artifact as a local file.
pub trait ArtifactSource: fmt::Debug + Send + Sync {
    /// Human-readable location for logs.
    fn describe(&self) -> String;

    fn fetch(&self) -> Result<FetchedArtifact, SourceError>;
}

/// Artifact already present on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalArtifact {
    path: PathBuf,
}

impl LocalArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArtifactSource for LocalArtifact {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<FetchedArtifact, SourceError> {
        if !self.path.is_file() {
            return Err(SourceError::Missing(self.path.clone()));
        }
        Ok(FetchedArtifact {
            path: self.path.clone(),
            scratch: None,
        })
    }
}

/// Object in a Google Cloud Storage bucket, fetched through the JSON API.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteObject {
    bucket: String,
    key: String,
    endpoint: String,
    access_token: Option<String>,
}

impl fmt::Debug for RemoteObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteObject")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("endpoint", &self.endpoint)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RemoteObject {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Result<Self, SourceError> {
        let bucket: String = bucket.into();
        let key: String = key.into();
        let bucket = bucket.trim();
        let key = key.trim().trim_start_matches('/');
        if bucket.is_empty() || key.is_empty() || bucket.contains('/') {
            return Err(SourceError::InvalidUri(format!("gs://{bucket}/{key}")));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
            access_token: None,
        })
    }

    /// Parse a `gs://bucket/key` URI.
    pub fn from_uri(uri: &str) -> Result<Self, SourceError> {
        let invalid = || SourceError::InvalidUri(uri.to_string());
        let rest = uri.trim().strip_prefix("gs://").ok_or_else(invalid)?;
        let (bucket, key) = rest.split_once('/').ok_or_else(invalid)?;
        Self::new(bucket, key).map_err(|_| invalid())
    }

    /// Use a different API endpoint, e.g. a storage emulator.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Send an OAuth bearer token with the download.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = (!token.trim().is_empty()).then(|| token.trim().to_string());
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Media download URL: `<endpoint>/storage/v1/b/<bucket>/o/<key>?alt=media`.
    pub fn media_url(&self) -> Result<Url, SourceError> {
        let invalid = |reason: String| SourceError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };
        let mut url = Url::parse(&self.endpoint).map_err(|err| invalid(err.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| invalid("missing host".to_string()))?
            .to_string();
        let loopback = host == "localhost" || host == "127.0.0.1" || host == "[::1]";
        if url.scheme() != "https" && !(url.scheme() == "http" && loopback) {
            return Err(invalid("must use https".to_string()));
        }
        url.path_segments_mut()
            .map_err(|_| invalid("cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o", self.key.as_str()]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }
}

impl ArtifactSource for RemoteObject {
    fn describe(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.key)
    }

    fn fetch(&self) -> Result<FetchedArtifact, SourceError> {
        let url = self.media_url()?;
        let mut request = http_client::agent().get(url.as_str());
        if let Some(token) = &self.access_token {
            request = request.set("Authorization", &format!("Bearer {token}"));
        }
        let response = match request.call() {
            Ok(response) => response,
            Err(ureq::Error::Status(status, _)) => {
                return Err(SourceError::Status {
                    url: url.to_string(),
                    status,
                });
            }
            Err(err) => {
                return Err(SourceError::Transport {
                    url: url.to_string(),
                    message: err.to_string(),
                });
            }
        };

        let mut scratch = NamedTempFile::new().map_err(SourceError::Scratch)?;
        let written = http_client::copy_bounded(response, &mut scratch, MAX_MODEL_BYTES)
            .map_err(SourceError::Write)?;
        scratch.flush().map_err(SourceError::Write)?;
        tracing::info!(
            "Downloaded {} ({written} bytes) to {}",
            self.describe(),
            scratch.path().display()
        );
        Ok(FetchedArtifact {
            path: scratch.path().to_path_buf(),
            scratch: Some(scratch),
        })
    }
}
