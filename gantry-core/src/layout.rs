//! Project layout on disk.
//!
//! # Storage layout
//!
//! ```text
//! <project>/
//!   gantry.yaml               (optional settings)
//!   .env                      (optional environment overrides)
//!   .gantry/remote/           (default directory for the local store adapters)
//!   jobs/
//!     <job>/
//!       .version              (version manifest)
//!       config.yml  overrides.yml  main.py  py/  jars/
//!       deployment.yml        (rendered, never fingerprinted)
//!   modules/
//!     <module>/
//!       .version
//!       <module>.zip          (package artifact, never fingerprinted)
//!       <module>/__init__.py  ...
//! ```
//!
//! # API pattern
//!
//! Every function takes the project root explicitly (`_at(root, …)`), so tests
//! can point it at a `TempDir`.

use std::path::{Path, PathBuf};

use crate::error::{io_err, ConfigError};
use crate::types::{ComponentKind, ComponentName};

// ---------------------------------------------------------------------------
// 1. Fixed file names
// ---------------------------------------------------------------------------

/// Version manifest, one per component directory.
pub const MANIFEST_FILE: &str = ".version";
/// Optional project settings file at the project root.
pub const PROJECT_CONFIG_FILE: &str = "gantry.yaml";
/// Optional dotenv file at the project root.
pub const DOTENV_FILE: &str = ".env";
/// Tool-owned state directory at the project root.
pub const STATE_DIR: &str = ".gantry";

pub const JOB_CONFIG_FILE: &str = "config.yml";
pub const JOB_OVERRIDES_FILE: &str = "overrides.yml";
pub const JOB_DEPLOYMENT_FILE: &str = "deployment.yml";
pub const JOB_SCRIPT_FILE: &str = "main.py";
pub const JOB_PY_DIR: &str = "py";
pub const JOB_JARS_DIR: &str = "jars";

/// Files the OS or editors drop into directories; never part of a component.
pub const OS_ARTIFACTS: &[&str] = &[".DS_Store", ".empty"];

// ---------------------------------------------------------------------------
// 2. Path helpers
// ---------------------------------------------------------------------------

/// `<root>/jobs` or `<root>/modules` — pure, no I/O.
pub fn kind_dir_at(project_root: &Path, kind: ComponentKind) -> PathBuf {
    project_root.join(kind.dir_name())
}

/// `<root>/<kind dir>/<name>` — pure, no I/O.
pub fn component_path_at(
    project_root: &Path,
    kind: ComponentKind,
    name: &ComponentName,
) -> PathBuf {
    kind_dir_at(project_root, kind).join(&name.0)
}

/// File name of a module's package artifact.
pub fn module_artifact_name(name: &ComponentName) -> String {
    format!("{}.zip", name.0)
}

/// `<root>/.gantry/remote` — where the local store adapters keep their data
/// unless configured otherwise.
pub fn default_store_dir_at(project_root: &Path) -> PathBuf {
    project_root.join(STATE_DIR).join("remote")
}

// ---------------------------------------------------------------------------
// 3. Discovery
// ---------------------------------------------------------------------------

/// Lists the names of every component directory of `kind`, sorted.
///
/// A missing kind directory yields an empty list. Hidden entries and plain
/// files are skipped.
pub fn list_component_names_at(
    project_root: &Path,
    kind: ComponentKind,
) -> Result<Vec<ComponentName>, ConfigError> {
    let dir = kind_dir_at(project_root, kind);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let entries = std::fs::read_dir(&dir).map_err(|e| io_err(&dir, e))?;
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(&dir, e))?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().into_owned();
        if !is_dir || name.starts_with('.') {
            continue;
        }
        names.push(ComponentName::from(name));
    }
    names.sort();
    Ok(names)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn component_path_is_correct() {
        let root = Path::new("/work/etl");
        let path = component_path_at(root, ComponentKind::Module, &ComponentName::from("utils"));
        assert_eq!(path, PathBuf::from("/work/etl/modules/utils"));
    }

    #[test]
    fn artifact_name_uses_component_name() {
        assert_eq!(module_artifact_name(&ComponentName::from("utils")), "utils.zip");
    }

    #[test]
    fn list_missing_kind_dir_is_empty() {
        let tmp = TempDir::new().expect("tempdir");
        let names = list_component_names_at(tmp.path(), ComponentKind::Job).expect("list");
        assert!(names.is_empty());
    }

    #[test]
    fn list_is_sorted_and_skips_files_and_hidden_dirs() {
        let tmp = TempDir::new().expect("tempdir");
        let jobs = tmp.path().join("jobs");
        std::fs::create_dir_all(jobs.join("zeta")).unwrap();
        std::fs::create_dir_all(jobs.join("alpha")).unwrap();
        std::fs::create_dir_all(jobs.join(".cache")).unwrap();
        std::fs::write(jobs.join(".DS_Store"), b"x").unwrap();

        let names = list_component_names_at(tmp.path(), ComponentKind::Job).expect("list");
        assert_eq!(
            names,
            vec![ComponentName::from("alpha"), ComponentName::from("zeta")]
        );
    }
}
