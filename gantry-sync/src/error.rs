//! Error types for gantry-sync.

use std::path::PathBuf;

use thiserror::Error;

use gantry_core::error::ConfigError;
use gantry_core::types::ComponentKind;
use gantry_renderer::RenderError;

/// Failures reported by an [`ObjectStore`](crate::store::ObjectStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key does not exist. Callers treat a missing manifest as a steady
    /// state, not a failure.
    #[error("object not found: {key}")]
    NotFound { key: String },

    #[error("permission denied for {key}: {reason}")]
    PermissionDenied { key: String, reason: String },

    #[error("transport error for {key}: {reason}")]
    Transport { key: String, reason: String },
}

/// Failures reported by a [`JobApi`](crate::orchestration::JobApi).
#[derive(Debug, Error)]
pub enum JobApiError {
    #[error("job '{name}' does not exist")]
    NotFound { name: String },

    #[error("job '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("job definition rejected: {reason}")]
    InvalidDefinition { reason: String },

    #[error("job API request for '{name}' failed: {reason}")]
    Request { name: String, reason: String },
}

/// All errors that can arise from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    #[error("object store error: {0}")]
    Store(#[from] StoreError),

    #[error("job API error: {0}")]
    JobApi(#[from] JobApiError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} '{name}' not found at {path}")]
    ComponentNotFound {
        kind: ComponentKind,
        name: String,
        path: PathBuf,
    },

    #[error("{kind} '{name}' already exists at {path}")]
    ComponentExists {
        kind: ComponentKind,
        name: String,
        path: PathBuf,
    },

    /// Local content differs from the last lock; the operation needs a
    /// locked component.
    #[error("{kind} '{name}' has edits in progress; run `gantry lock` first")]
    Unlocked { kind: ComponentKind, name: String },

    #[error("module '{name}' is not packaged; run `gantry package` first")]
    NotPackaged { name: String },

    #[error("manifest at {path} could not be parsed: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("remote manifest {key} could not be parsed: {source}")]
    RemoteManifestParse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration in {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A file listed during a scan disappeared before it could be read.
    #[error("file vanished while scanning: {path}")]
    FileVanished { path: PathBuf },

    #[error("error walking {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("zip error for {path}: {source}")]
    Zip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not start upload workers: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Convenience constructor for [`EngineError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    EngineError::Io {
        path: path.into(),
        source,
    }
}

/// Like [`io_err`], but maps `NotFound` to [`EngineError::FileVanished`] for
/// files that were just listed by a directory scan.
pub(crate) fn scan_err(path: impl Into<PathBuf>, source: std::io::Error) -> EngineError {
    let path = path.into();
    if source.kind() == std::io::ErrorKind::NotFound {
        EngineError::FileVanished { path }
    } else {
        EngineError::Io { path, source }
    }
}
