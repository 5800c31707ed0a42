//! Jobs: configuration loading, deployment rendering and `deployment.yml`.
//!
//! A job directory holds:
//!
//! - `config.yml` — `{ job_config: {...}, modules: { <module>: { version_number: N } } }`
//! - `overrides.yml` — optional `{ overrides: [ <partial job_config>, ... ] }`
//! - `main.py` — the entry script
//! - `py/**/*.py|*.jar` and `jars/**/*.jar` — extra files shipped with the job
//! - `deployment.yml` — rendered output, never fingerprinted

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use walkdir::WalkDir;

use gantry_core::keys::{object_key, object_uri, version_prefix};
use gantry_core::layout::{
    JOB_CONFIG_FILE, JOB_DEPLOYMENT_FILE, JOB_JARS_DIR, JOB_OVERRIDES_FILE, JOB_PY_DIR,
    JOB_SCRIPT_FILE,
};
use gantry_core::types::{ComponentKind, ComponentName};
use gantry_core::RemoteTarget;
use gantry_renderer::{expand, ComputedFields};

use crate::atomic::write_atomic;
use crate::component::ComponentBase;
use crate::error::{io_err, EngineError};
use crate::hasher::relative_key;
use crate::manifest::Manifest;
use crate::project::Project;

const PY_EXTENSIONS: &[&str] = &["py", "jar"];
const JAR_EXTENSIONS: &[&str] = &["jar"];

/// Parsed `config.yml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Base deployment document, passed to the job API after expansion.
    #[serde(default)]
    pub job_config: Value,
    /// Shared modules pinned to an exact version.
    #[serde(default)]
    pub modules: Option<BTreeMap<String, ModulePin>>,
}

impl JobConfig {
    pub fn referenced_modules(&self) -> impl Iterator<Item = (&String, &ModulePin)> {
        self.modules.iter().flat_map(|m| m.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModulePin {
    pub version_number: u64,
}

#[derive(Debug, Default, Deserialize)]
struct OverridesFile {
    #[serde(default)]
    overrides: Option<Vec<Value>>,
}

/// Shape of `deployment.yml`.
#[derive(Debug, Serialize)]
struct DeploymentFile<'a> {
    job_configs: &'a [Value],
}

/// Whether [`Job::write_deployment`] touched the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentWrite {
    Written,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    base: ComponentBase,
}

impl Job {
    /// Job `name` inside `root_dir` (the project's `jobs/` directory).
    pub fn new(root_dir: impl Into<PathBuf>, name: ComponentName) -> Self {
        Job {
            base: ComponentBase::new(ComponentKind::Job, name, root_dir),
        }
    }

    pub fn base(&self) -> &ComponentBase {
        &self.base
    }

    pub fn config_path(&self) -> PathBuf {
        self.base.component_path().join(JOB_CONFIG_FILE)
    }

    pub fn overrides_path(&self) -> PathBuf {
        self.base.component_path().join(JOB_OVERRIDES_FILE)
    }

    pub fn deployment_path(&self) -> PathBuf {
        self.base.component_path().join(JOB_DEPLOYMENT_FILE)
    }

    pub fn main_script_path(&self) -> PathBuf {
        self.base.component_path().join(JOB_SCRIPT_FILE)
    }

    /// Parse `config.yml` after expanding `$VAR` / `${VAR}` references from
    /// `vars`. Unknown variables are left as written; a missing file is an
    /// empty configuration.
    pub fn load_config(&self, vars: &HashMap<String, String>) -> Result<JobConfig, EngineError> {
        let path = self.config_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(JobConfig::default()),
            Err(e) => return Err(io_err(&path, e)),
        };
        let expanded = shellexpand::env_with_context_no_errors(raw.as_str(), |var| vars.get(var));
        if expanded.trim().is_empty() {
            return Ok(JobConfig::default());
        }
        serde_yaml::from_str(&expanded).map_err(|source| EngineError::Yaml { path, source })
    }

    /// Override fragments in file order. Missing file, empty file or missing
    /// `overrides` key all mean no overrides.
    pub fn load_overrides(&self) -> Result<Vec<Value>, EngineError> {
        let path = self.overrides_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(io_err(&path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(vec![]);
        }
        let file: Option<OverridesFile> =
            serde_yaml::from_str(&raw).map_err(|source| EngineError::Yaml { path, source })?;
        Ok(file.and_then(|f| f.overrides).unwrap_or_default())
    }

    /// `py/**/*.py` and `py/**/*.jar`, sorted.
    pub fn py_files(&self) -> Result<Vec<PathBuf>, EngineError> {
        files_with_extensions(&self.base.component_path().join(JOB_PY_DIR), PY_EXTENSIONS)
    }

    /// `jars/**/*.jar`, sorted.
    pub fn jar_files(&self) -> Result<Vec<PathBuf>, EngineError> {
        files_with_extensions(&self.base.component_path().join(JOB_JARS_DIR), JAR_EXTENSIONS)
    }

    /// Expand the job into its deployment documents for the persisted
    /// version.
    ///
    /// Referenced modules resolve to the artifact of their *declared*
    /// version, never the module's current one.
    pub fn render(
        &self,
        project: &Project,
        target: &RemoteTarget,
    ) -> Result<Vec<Value>, EngineError> {
        let config = self.load_config(project.vars())?;
        let version_number = Manifest::load_or_init(&self.base)?.version_number;
        let prefix = version_prefix(
            &target.namespace,
            ComponentKind::Job,
            self.base.name(),
            version_number,
        );
        let uri = |path: &Path| {
            let relative = relative_key(self.base.root_dir(), path);
            object_uri(&target.bucket, &object_key(&prefix, &relative))
        };

        let mut extra_py_files: Vec<String> =
            self.py_files()?.iter().map(|p| uri(p.as_path())).collect();
        for (module_name, pin) in config.referenced_modules() {
            extra_py_files.push(self.pinned_module_uri(project, target, module_name, *pin)?);
        }
        let computed = ComputedFields {
            script_location: uri(self.main_script_path().as_path()),
            extra_py_files,
            extra_jars: self.jar_files()?.iter().map(|p| uri(p.as_path())).collect(),
        };

        let base_document = match config.job_config {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };
        let overrides = self.load_overrides()?;
        expand(&base_document, &overrides, &computed).map_err(|e| EngineError::InvalidConfig {
            path: self.config_path(),
            reason: e.to_string(),
        })
    }

    /// `deployment.yml` content for `documents`.
    pub fn deployment_yaml(&self, documents: &[Value]) -> Result<String, EngineError> {
        serde_yaml::to_string(&DeploymentFile {
            job_configs: documents,
        })
        .map_err(|source| EngineError::Yaml {
            path: self.deployment_path(),
            source,
        })
    }

    /// Persist `documents` as `deployment.yml`. Identical content is not
    /// rewritten.
    pub fn write_deployment(&self, documents: &[Value]) -> Result<DeploymentWrite, EngineError> {
        let path = self.deployment_path();
        let content = self.deployment_yaml(documents)?;
        match std::fs::read_to_string(&path) {
            Ok(existing) if existing == content => {
                tracing::debug!("unchanged: {}", path.display());
                return Ok(DeploymentWrite::Unchanged);
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(io_err(&path, e)),
        }
        write_atomic(&path, content.as_bytes()).map_err(|e| io_err(&path, e))?;
        tracing::info!("wrote: {}", path.display());
        Ok(DeploymentWrite::Written)
    }

    fn pinned_module_uri(
        &self,
        project: &Project,
        target: &RemoteTarget,
        module_name: &str,
        pin: ModulePin,
    ) -> Result<String, EngineError> {
        let module = project.module(&ComponentName::from(module_name))?;
        let latest = Manifest::read(module.base())?.map_or(0, |m| m.version_number);
        if pin.version_number > latest {
            return Err(EngineError::InvalidConfig {
                path: self.config_path(),
                reason: format!(
                    "module '{module_name}' is pinned to version {} but its latest locked \
                     version is {latest}",
                    pin.version_number
                ),
            });
        }
        Ok(module.artifact_uri(target, pin.version_number))
    }
}

fn files_with_extensions(dir: &Path, extensions: &[&str]) -> Result<Vec<PathBuf>, EngineError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|source| EngineError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        let matches = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| extensions.contains(&e));
        if entry.file_type().is_file() && matches {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
