//! Error types for gantry-renderer.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from scaffolding and override expansion.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Tera(#[from] tera::Error),

    /// JSON serialization error (building tera context).
    #[error("context serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while loading user templates.
    #[error("template io error at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    /// A job configuration document does not have the expected shape.
    /// `target` is the override index, or `None` for the base document.
    #[error("invalid job configuration ({}): {reason}", describe_target(*.target))]
    InvalidDocument {
        target: Option<usize>,
        reason: String,
    },

    /// Two expanded deployment documents share a `Name`.
    #[error("deployment name '{0}' is produced more than once; give each override a unique Name")]
    DuplicateJobName(String),
}

fn describe_target(target: Option<usize>) -> String {
    match target {
        Some(index) => format!("override #{}", index + 1),
        None => "base config".to_string(),
    }
}
