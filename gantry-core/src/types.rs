//! Domain types shared by every gantry crate.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed name for a job or module.
///
/// Names become directory names and path segments of remote keys, so
/// [`ComponentName::parse`] only admits ASCII letters, digits, `_` and `-`.
/// `From` conversions skip validation and are meant for names read back from
/// the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentName(pub String);

impl ComponentName {
    /// Validate a user-supplied name.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidName {
            name: name.to_string(),
            reason: reason.to_string(),
        };
        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.starts_with('-') || name.starts_with('.') {
            return Err(invalid("name must start with a letter, digit or '_'"));
        }
        if let Some(bad) = name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(invalid(&format!("character '{bad}' is not allowed")));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ComponentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ComponentName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ComponentName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// The two deployable component variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Job,
    Module,
}

impl ComponentKind {
    /// All kinds in a stable order. Modules come first so that a collection
    /// deploys dependencies before the jobs that reference them.
    pub fn all() -> &'static [ComponentKind] {
        &[ComponentKind::Module, ComponentKind::Job]
    }

    /// Directory under the project root holding every component of this kind.
    pub fn dir_name(&self) -> &'static str {
        match self {
            ComponentKind::Job => "jobs",
            ComponentKind::Module => "modules",
        }
    }

    /// Type segment used in remote keys.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ComponentKind::Job => "gantry_job",
            ComponentKind::Module => "gantry_module",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentKind::Job => write!(f, "job"),
            ComponentKind::Module => write!(f, "module"),
        }
    }
}

impl FromStr for ComponentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "job" => Ok(ComponentKind::Job),
            "module" => Ok(ComponentKind::Module),
            other => Err(format!(
                "unknown component type '{other}'; expected: job, module"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
