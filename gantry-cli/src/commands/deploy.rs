//! `gantry deploy [--dry-run]`

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;

use gantry_sync::{pipeline, Applied, DeployOutcome};

use super::{check::print_report, finish, Session};

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Render and compare without uploading or calling the job API.
    #[arg(long)]
    pub dry_run: bool,
}

impl DeployArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let session = Session::open(root)?;
        session.config.validate()?;
        let components = session
            .project
            .components()
            .context("failed to discover components")?;

        // Unreadable components are reported by `deploy_all` below.
        let check = pipeline::check(&components);
        if check.has_blockers() {
            print_report(&check);
            bail!("refusing to deploy until every component is locked and packaged");
        }

        let reconciler = session.reconciler()?;
        let api = session.job_api();
        let report =
            pipeline::deploy_all(&session.project, &components, &reconciler, &api, self.dry_run);

        let prefix = if self.dry_run { "[dry-run] " } else { "" };
        for (component, outcome) in &report.completed {
            let (kind, name) = (component.kind(), component.name());
            match outcome {
                DeployOutcome::Deployed {
                    version_number,
                    uploaded,
                    applied,
                } => {
                    println!(
                        "✓ {kind} '{name}' version {version_number}: {uploaded} file(s) uploaded"
                    );
                    for action in applied {
                        match action {
                            Applied::Created(job) => println!("  +  created job '{job}'"),
                            Applied::Updated(job) => println!("  ~  updated job '{job}'"),
                        }
                    }
                }
                DeployOutcome::WouldDeploy {
                    version_number,
                    documents,
                } => {
                    println!(
                        "{prefix}~ {kind} '{name}' version {version_number} would deploy \
                         ({documents} job definition(s))"
                    );
                }
                DeployOutcome::UpToDate { version_number } => {
                    println!("{prefix}· {kind} '{name}' is in sync at version {version_number}");
                }
            }
        }
        finish(&report, "deploy")
    }
}
