//! `gantry check` — list what blocks a deploy.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use gantry_sync::pipeline::{self, CheckReport};

use super::{print_failures, Session};

#[derive(Args, Debug)]
pub struct CheckArgs {}

impl CheckArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let session = Session::open(root)?;
        let components = session
            .project
            .components()
            .context("failed to discover components")?;
        let report = pipeline::check(&components);
        print_report(&report);
        if !report.failures.is_empty() {
            bail!("check failed for {} component(s)", report.failures.len());
        }
        if !report.is_ready() {
            bail!("project is not ready to deploy");
        }
        Ok(())
    }
}

pub fn print_report(report: &CheckReport) {
    if report.is_ready() {
        println!("{} All components are locked and packaged.", "✓".green().bold());
        return;
    }
    print_failures(&report.failures);
    for component in &report.unlocked {
        println!(
            "{} {} '{}' has edits in progress; run `gantry lock`",
            "■".red().bold(),
            component.kind(),
            component.name()
        );
    }
    for component in &report.unpackaged {
        println!(
            "{} module '{}' is not packaged; run `gantry package`",
            "■".yellow().bold(),
            component.name()
        );
    }
}
