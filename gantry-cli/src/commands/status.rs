//! `gantry status` — local and remote state of every component.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use gantry_sync::{pipeline, ComponentStatus, LocalState, RemoteState};

use super::{finish, Session};

/// Arguments for `gantry status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show jobs.
    #[arg(long, conflicts_with = "modules")]
    pub jobs: bool,

    /// Only show modules.
    #[arg(long)]
    pub modules: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let session = Session::open(root)?;
        let components = if self.jobs {
            session.project.jobs()
        } else if self.modules {
            session.project.modules()
        } else {
            session.project.components()
        }
        .context("failed to discover components")?;

        let reconciler = session.reconciler()?;
        let report = pipeline::status_all(&components, &reconciler);
        let rows: Vec<ComponentStatus> = report.completed.iter().map(|(_, s)| s.clone()).collect();

        if self.json {
            print_json(&rows)?;
        } else {
            print_table(&session.config.namespace, rows);
        }
        finish(&report, "status")
    }
}

#[derive(Serialize)]
struct StatusReportJson<'a> {
    summary: StatusSummaryJson,
    components: &'a [ComponentStatus],
}

#[derive(Serialize)]
struct StatusSummaryJson {
    components: usize,
    unlocked: usize,
    deployable: usize,
    in_sync: usize,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "name")]
    name: String,
    #[tabled(rename = "type")]
    kind: String,
    #[tabled(rename = "local")]
    local: String,
    #[tabled(rename = "remote")]
    remote: String,
    #[tabled(rename = "version")]
    version: u64,
}

fn summarize(rows: &[ComponentStatus]) -> StatusSummaryJson {
    StatusSummaryJson {
        components: rows.len(),
        unlocked: rows.iter().filter(|r| !r.is_locked()).count(),
        deployable: rows.iter().filter(|r| r.is_deployable()).count(),
        in_sync: rows.iter().filter(|r| r.is_in_sync()).count(),
    }
}

fn print_json(rows: &[ComponentStatus]) -> Result<()> {
    let payload = StatusReportJson {
        summary: summarize(rows),
        components: rows,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(namespace: &str, rows: Vec<ComponentStatus>) {
    let summary = summarize(&rows);
    println!(
        "Gantry v{} | {namespace} | {} components | {} unlocked | {} deployable",
        env!("CARGO_PKG_VERSION"),
        summary.components,
        summary.unlocked,
        summary.deployable,
    );

    if rows.is_empty() {
        println!("No components found.");
        return;
    }

    let table_rows: Vec<StatusTableRow> = rows
        .into_iter()
        .map(|row| StatusTableRow {
            local: local_label(row.local),
            remote: remote_label(&row),
            kind: row.kind.to_string(),
            name: row.name,
            version: row.version_number,
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");

    if summary.unlocked > 0 {
        println!("Run 'gantry lock' to version edits in progress.");
    } else if summary.deployable > 0 {
        println!("Run 'gantry deploy' to publish deployable components.");
    }
}

fn local_label(state: LocalState) -> String {
    match state {
        LocalState::Locked => format!("{} {state}", "■".green().bold()),
        LocalState::Unlocked => format!("{} {state}", "■".red().bold()),
    }
}

fn remote_label(row: &ComponentStatus) -> String {
    let indicator = match row.remote {
        RemoteState::InSync => "■".green().bold(),
        RemoteState::OutOfSync => "■".yellow().bold(),
        RemoteState::Missing => "■".bright_black().bold(),
    };
    format!("{indicator} {}", row.remote)
}
