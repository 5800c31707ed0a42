//! `gantry package [--purge]`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use gantry_sync::{pipeline, PackageOutcome, PackageResult};

use super::{finish, Session};

#[derive(Args, Debug)]
pub struct PackageArgs {
    /// Delete every module package artifact instead of building.
    #[arg(long)]
    pub purge: bool,
}

impl PackageArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let session = Session::open(root)?;
        let components = session
            .project
            .modules()
            .context("failed to discover modules")?;

        let report = pipeline::package_all(&components, self.purge);
        for (component, result) in &report.completed {
            let name = component.name();
            match result {
                PackageResult::Packaged(PackageOutcome::Packaged {
                    version_number,
                    locked,
                }) => {
                    let note = if *locked { " (locked)" } else { "" };
                    println!("  ✎  '{name}' packaged at version {version_number}{note}");
                }
                PackageResult::Packaged(PackageOutcome::UpToDate { version_number }) => {
                    println!("  ·  '{name}' up to date at version {version_number}");
                }
                PackageResult::Purged(true) => println!("  ✗  '{name}' artifact removed"),
                PackageResult::Purged(false) | PackageResult::Skipped => {}
            }
        }
        if components.is_empty() {
            println!("No modules found.");
        }
        finish(&report, if self.purge { "purge" } else { "package" })
    }
}
