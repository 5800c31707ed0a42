//! `gantry diff <job>` — show what deploy would write to `deployment.yml`.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use gantry_core::types::ComponentName;
use gantry_sync::diff_deployment;

use super::Session;

/// Arguments for `gantry diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Job name to diff.
    pub job: String,
}

impl DiffArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let session = Session::open(root)?;
        let target = session.config.remote_target()?;
        let job = session
            .project
            .job(&ComponentName::from(self.job.as_str()))
            .with_context(|| format!("unknown job '{}'", self.job))?;

        let result = diff_deployment(&session.project, &job, &target)
            .with_context(|| format!("diff failed for '{}'", self.job))?;

        match result.unified_diff {
            None => println!("No differences for '{}'.", result.job_name),
            Some(diff) => {
                print!("{diff}");
                if !diff.ends_with('\n') {
                    println!();
                }
            }
        }
        Ok(())
    }
}
