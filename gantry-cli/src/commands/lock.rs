//! `gantry lock` — freeze edits in progress as new versions.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use gantry_sync::{pipeline, LockOutcome};

use super::{finish, Session};

#[derive(Args, Debug)]
pub struct LockArgs {}

impl LockArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let session = Session::open(root)?;
        let components = session
            .project
            .components()
            .context("failed to discover components")?;

        let report = pipeline::lock_all(&components);
        let mut locked = 0;
        for (component, outcome) in &report.completed {
            if let LockOutcome::Locked { version_number } = outcome {
                locked += 1;
                println!(
                    "  ✎  {} '{}' → version {version_number}",
                    component.kind(),
                    component.name()
                );
            }
        }
        if locked == 0 && report.is_success() {
            println!("✓ Everything is already locked.");
        } else {
            println!("✓ Locked {locked} component(s).");
        }
        finish(&report, "lock")
    }
}
