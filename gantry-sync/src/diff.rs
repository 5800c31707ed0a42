//! Dry-run unified diff support for `gantry diff`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use gantry_core::RemoteTarget;

use crate::error::{io_err, EngineError};
use crate::job::Job;
use crate::project::Project;

/// Difference between a job's `deployment.yml` and a fresh render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDiff {
    pub job_name: String,
    pub path: PathBuf,
    /// `None` when the file already matches.
    pub unified_diff: Option<String>,
}

/// Render `job` and compare the result with its current `deployment.yml`.
///
/// No files are written. A missing `deployment.yml` diffs against empty
/// content.
pub fn diff_deployment(
    project: &Project,
    job: &Job,
    target: &RemoteTarget,
) -> Result<DeploymentDiff, EngineError> {
    let documents = job.render(project, target)?;
    let rendered = normalize_line_endings(&job.deployment_yaml(&documents)?);
    let path = job.deployment_path();
    let existing = read_existing_or_empty(&path)?;

    let unified_diff = if existing == rendered {
        None
    } else {
        let relative = path.strip_prefix(project.root()).unwrap_or(path.as_path());
        let old_header = format!("a/{}", relative.display());
        let new_header = format!("b/{}", relative.display());
        Some(
            TextDiff::from_lines(&existing, &rendered)
                .unified_diff()
                .header(&old_header, &new_header)
                .context_radius(3)
                .to_string(),
        )
    };

    Ok(DeploymentDiff {
        job_name: job.base().name().0.clone(),
        path,
        unified_diff,
    })
}

fn read_existing_or_empty(path: &Path) -> Result<String, EngineError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(normalize_line_endings(&content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}
