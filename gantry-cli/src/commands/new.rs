//! `gantry new <job|module> --name <name>`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use gantry_core::types::{ComponentKind, ComponentName};

use super::Session;

/// Scaffold a new component.
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Component type: job | module.
    #[arg(value_name = "TYPE")]
    pub kind: ComponentKind,

    /// Name of the new component (letters, digits, `_` and `-`).
    #[arg(long, short = 'n')]
    pub name: String,
}

impl NewArgs {
    pub fn run(self, root: &Path) -> Result<()> {
        let name = ComponentName::parse(&self.name)?;
        let session = Session::open(root)?;
        let renderer = session
            .project
            .scaffold_renderer()
            .context("failed to load scaffolding templates")?;

        let base = match self.kind {
            ComponentKind::Job => {
                session.config.validate()?;
                let job = session
                    .project
                    .create_job(&name, &session.config, &renderer)
                    .with_context(|| format!("failed to create job '{name}'"))?;
                job.base().clone()
            }
            ComponentKind::Module => {
                let module = session
                    .project
                    .create_module(&name, &renderer)
                    .with_context(|| format!("failed to create module '{name}'"))?;
                module.base().clone()
            }
        };

        println!("✓ Created {} '{}' at version 0", self.kind, name);
        println!("  {}", base.component_path().display());
        Ok(())
    }
}
