//! Subcommand implementations and the project session they share.

pub mod check;
pub mod deploy;
pub mod diff;
pub mod lock;
pub mod new;
pub mod package;
pub mod status;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::Colorize;

use gantry_core::config::{load_at, read_dotenv_at, GantryConfig};
use gantry_sync::{BatchReport, Failure, LocalJobApi, LocalObjectStore, Project, Reconciler};

/// Resolved configuration plus the project it applies to.
pub struct Session {
    pub config: GantryConfig,
    pub project: Project,
}

impl Session {
    /// Load configuration for `root`. `config.yml` variables come from the
    /// project `.env`, overridden by the process environment.
    pub fn open(root: &Path) -> Result<Self> {
        let config = load_at(root)
            .with_context(|| format!("failed to load configuration for '{}'", root.display()))?;
        let mut vars: HashMap<String, String> = read_dotenv_at(root)
            .with_context(|| format!("failed to read .env in '{}'", root.display()))?;
        vars.extend(std::env::vars());
        let project = Project::open(root).with_vars(vars);
        tracing::debug!(
            "project {} (namespace {}, store {})",
            root.display(),
            config.namespace,
            config.store_dir.display()
        );
        Ok(Session { config, project })
    }

    /// Reconciler over the local object store for the configured bucket.
    pub fn reconciler(&self) -> Result<Reconciler> {
        let target = self
            .config
            .remote_target()
            .context("a bucket is required to compare with the remote store")?;
        let store = LocalObjectStore::new(&self.config.store_dir, &target.bucket);
        Ok(Reconciler::new(Arc::new(store), target))
    }

    pub fn job_api(&self) -> LocalJobApi {
        LocalJobApi::new(&self.config.store_dir)
    }
}

pub fn print_failures(failures: &[Failure]) {
    for failure in failures {
        eprintln!(
            "{} {} '{}': {}",
            "✗".red().bold(),
            failure.kind,
            failure.name,
            failure.error
        );
    }
}

/// Print every failure of a batch to stderr and fail if there was any.
pub fn finish<T>(report: &BatchReport<T>, action: &str) -> Result<()> {
    print_failures(&report.failures);
    if !report.is_success() {
        bail!("{action} failed for {} component(s)", report.failures.len());
    }
    Ok(())
}
