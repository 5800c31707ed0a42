//! Error types for gantry-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from layout and configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the path involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `gantry.yaml` exists but is not valid YAML for [`crate::config::FileConfig`].
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The project `.env` file is malformed.
    #[error("failed to read environment file {path}: {source}")]
    Dotenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    /// A setting required by the current command has no value.
    #[error("{key} is not set; add it to gantry.yaml, .env, or the environment")]
    MissingSetting { key: &'static str },

    /// A setting has a value that cannot be interpreted.
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// A component name contains characters that cannot appear in keys or paths.
    #[error("invalid component name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
