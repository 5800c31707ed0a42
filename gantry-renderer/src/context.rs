//! Template context — serializable payload for scaffolding a new component.

use serde::{Deserialize, Serialize};

use gantry_core::types::{ComponentKind, ComponentName};

use crate::error::RenderError;

/// Values available to every scaffolding template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldContext {
    pub kind: ComponentKind,
    pub name: String,
    /// IAM role written into a job's `config.yml`. Empty for modules.
    pub iam_role: String,
    /// Remote URI of the job's entry script at version 0. Empty for modules.
    pub script_location: String,
    pub gantry_version: String,
}

impl ScaffoldContext {
    pub fn module(name: &ComponentName) -> Self {
        ScaffoldContext {
            kind: ComponentKind::Module,
            name: name.0.clone(),
            iam_role: String::new(),
            script_location: String::new(),
            gantry_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn job(name: &ComponentName, iam_role: &str, script_location: &str) -> Self {
        ScaffoldContext {
            kind: ComponentKind::Job,
            name: name.0.clone(),
            iam_role: iam_role.to_string(),
            script_location: script_location.to_string(),
            gantry_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}
