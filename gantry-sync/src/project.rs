//! Project discovery, component lookup and scaffolding.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use gantry_core::config::GantryConfig;
use gantry_core::keys::{object_key, object_uri, version_prefix};
use gantry_core::layout::{
    kind_dir_at, list_component_names_at, JOB_JARS_DIR, JOB_PY_DIR, JOB_SCRIPT_FILE, STATE_DIR,
};
use gantry_core::types::{ComponentKind, ComponentName};
use gantry_renderer::{ScaffoldContext, ScaffoldRenderer};

use crate::atomic::write_atomic;
use crate::collection::ComponentCollection;
use crate::component::{Component, ComponentBase};
use crate::error::{io_err, EngineError};
use crate::job::Job;
use crate::manifest::Manifest;
use crate::module::Module;

/// Placeholder that keeps otherwise empty scaffold directories in version
/// control. Never fingerprinted.
const PLACEHOLDER_FILE: &str = ".empty";
const USER_TEMPLATES_DIR: &str = "templates";

/// A project root plus the variables used to expand job configuration.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    vars: HashMap<String, String>,
}

impl Project {
    /// Project at `root` with no expansion variables.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Project {
            root: root.into(),
            vars: HashMap::new(),
        }
    }

    /// Variables substituted for `$VAR` / `${VAR}` in `config.yml`.
    pub fn with_vars(mut self, vars: HashMap<String, String>) -> Self {
        self.vars = vars;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// The job `name`, or [`EngineError::ComponentNotFound`].
    pub fn job(&self, name: &ComponentName) -> Result<Job, EngineError> {
        let job = Job::new(kind_dir_at(&self.root, ComponentKind::Job), name.clone());
        ensure_exists(job.base())?;
        Ok(job)
    }

    /// The module `name`, or [`EngineError::ComponentNotFound`].
    pub fn module(&self, name: &ComponentName) -> Result<Module, EngineError> {
        let module = Module::new(kind_dir_at(&self.root, ComponentKind::Module), name.clone());
        ensure_exists(module.base())?;
        Ok(module)
    }

    pub fn component(
        &self,
        kind: ComponentKind,
        name: &ComponentName,
    ) -> Result<Component, EngineError> {
        Ok(match kind {
            ComponentKind::Job => self.job(name)?.into(),
            ComponentKind::Module => self.module(name)?.into(),
        })
    }

    pub fn jobs(&self) -> Result<ComponentCollection, EngineError> {
        self.discover(ComponentKind::Job)
    }

    pub fn modules(&self) -> Result<ComponentCollection, EngineError> {
        self.discover(ComponentKind::Module)
    }

    /// Every component, modules first so jobs can reference freshly
    /// published module versions.
    pub fn components(&self) -> Result<ComponentCollection, EngineError> {
        let mut all = self.modules()?;
        all.extend(self.jobs()?);
        Ok(all)
    }

    /// Renderer using `.gantry/templates/` overrides when that directory
    /// exists.
    pub fn scaffold_renderer(&self) -> Result<ScaffoldRenderer, EngineError> {
        let dir = self.root.join(STATE_DIR).join(USER_TEMPLATES_DIR);
        let renderer = if dir.is_dir() {
            tracing::debug!("using user templates from {}", dir.display());
            ScaffoldRenderer::with_user_templates(&dir)?
        } else {
            ScaffoldRenderer::new()?
        };
        Ok(renderer)
    }

    /// Scaffold a job and lock it at version 0.
    pub fn create_job(
        &self,
        name: &ComponentName,
        config: &GantryConfig,
        renderer: &ScaffoldRenderer,
    ) -> Result<Job, EngineError> {
        let target = config.remote_target()?;
        let role = config.iam_role()?;
        let job = Job::new(kind_dir_at(&self.root, ComponentKind::Job), name.clone());
        ensure_absent(job.base())?;

        let prefix = version_prefix(&target.namespace, ComponentKind::Job, name, 0);
        let script_location = object_uri(
            &target.bucket,
            &object_key(&prefix, &format!("{name}/{JOB_SCRIPT_FILE}")),
        );
        let ctx = ScaffoldContext::job(name, role, &script_location);
        let dir = job.base().component_path();
        write_scaffold(&dir, renderer.render(&ctx)?)?;
        for sub in [JOB_PY_DIR, JOB_JARS_DIR] {
            let placeholder = dir.join(sub).join(PLACEHOLDER_FILE);
            write_atomic(&placeholder, b"").map_err(|e| io_err(&placeholder, e))?;
        }

        Manifest::load_or_init(job.base())?;
        tracing::info!("created job '{name}' at {}", dir.display());
        Ok(job)
    }

    /// Scaffold a module and lock it at version 0.
    pub fn create_module(
        &self,
        name: &ComponentName,
        renderer: &ScaffoldRenderer,
    ) -> Result<Module, EngineError> {
        let module = Module::new(kind_dir_at(&self.root, ComponentKind::Module), name.clone());
        ensure_absent(module.base())?;

        let dir = module.base().component_path();
        write_scaffold(&dir, renderer.render(&ScaffoldContext::module(name))?)?;

        Manifest::load_or_init(module.base())?;
        tracing::info!("created module '{name}' at {}", dir.display());
        Ok(module)
    }

    fn discover(&self, kind: ComponentKind) -> Result<ComponentCollection, EngineError> {
        Ok(list_component_names_at(&self.root, kind)?
            .into_iter()
            .map(|name| match kind {
                ComponentKind::Job => Component::Job(Job::new(kind_dir_at(&self.root, kind), name)),
                ComponentKind::Module => {
                    Component::Module(Module::new(kind_dir_at(&self.root, kind), name))
                }
            })
            .collect())
    }
}

fn ensure_exists(base: &ComponentBase) -> Result<(), EngineError> {
    if base.exists() {
        return Ok(());
    }
    Err(EngineError::ComponentNotFound {
        kind: base.kind(),
        name: base.name().0.clone(),
        path: base.component_path(),
    })
}

fn ensure_absent(base: &ComponentBase) -> Result<(), EngineError> {
    if !base.component_path().exists() {
        return Ok(());
    }
    Err(EngineError::ComponentExists {
        kind: base.kind(),
        name: base.name().0.clone(),
        path: base.component_path(),
    })
}

fn write_scaffold(dir: &Path, files: Vec<(PathBuf, String)>) -> Result<(), EngineError> {
    for (relative, content) in files {
        let path = dir.join(relative);
        write_atomic(&path, content.as_bytes()).map_err(|e| io_err(&path, e))?;
        tracing::debug!("wrote: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use tempfile::TempDir;

    use crate::component::LocalState;

    fn config(root: &Path) -> GantryConfig {
        let mut config = GantryConfig::defaults_at(root);
        config.bucket = Some("lake".to_string());
        config.iam_role = Some("arn:aws:iam::123456789012:role/glue".to_string());
        config
    }

    #[test]
    fn unknown_component_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let project = Project::open(tmp.path());
        let err = project.job(&ComponentName::from("ghost")).unwrap_err();
        assert!(matches!(err, EngineError::ComponentNotFound { kind: ComponentKind::Job, .. }));
        let err = project.module(&ComponentName::from("ghost")).unwrap_err();
        assert!(matches!(err, EngineError::ComponentNotFound { kind: ComponentKind::Module, .. }));
    }

    #[test]
    fn create_job_scaffolds_and_locks_version_zero() {
        let tmp = TempDir::new().unwrap();
        let project = Project::open(tmp.path());
        let renderer = project.scaffold_renderer().unwrap();
        let job = project
            .create_job(&ComponentName::from("etl"), &config(tmp.path()), &renderer)
            .unwrap();

        let dir = job.base().component_path();
        let expected = [
            "config.yml",
            "overrides.yml",
            "main.py",
            ".version",
            "py/.empty",
            "jars/.empty",
        ];
        for file in expected {
            assert!(dir.join(file).is_file(), "missing {file}");
        }
        assert_eq!(job.base().version_number().unwrap(), 0);
        assert_eq!(job.base().local_state().unwrap(), LocalState::Locked);

        let parsed = job.load_config(project.vars()).unwrap();
        assert_eq!(parsed.job_config["Name"], serde_json::json!("etl"));
        assert_eq!(
            parsed.job_config["Command"]["ScriptLocation"],
            serde_json::json!("s3://lake/gantry/gantry_job/etl/version=0/etl/main.py")
        );
    }

    #[test]
    fn create_job_requires_bucket_and_role() {
        let tmp = TempDir::new().unwrap();
        let project = Project::open(tmp.path());
        let renderer = project.scaffold_renderer().unwrap();
        let err = project
            .create_job(
                &ComponentName::from("etl"),
                &GantryConfig::defaults_at(tmp.path()),
                &renderer,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
        assert!(!tmp.path().join("jobs").exists());
    }

    #[test]
    fn create_twice_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let project = Project::open(tmp.path());
        let renderer = project.scaffold_renderer().unwrap();
        let name = ComponentName::from("utils");
        project.create_module(&name, &renderer).unwrap();
        let err = project.create_module(&name, &renderer).unwrap_err();
        assert!(matches!(err, EngineError::ComponentExists { .. }));
    }

    #[test]
    fn components_lists_modules_before_jobs() {
        let tmp = TempDir::new().unwrap();
        let project = Project::open(tmp.path());
        let renderer = project.scaffold_renderer().unwrap();
        let config = config(tmp.path());
        project.create_job(&ComponentName::from("b_job"), &config, &renderer).unwrap();
        project.create_module(&ComponentName::from("z_mod"), &renderer).unwrap();
        project.create_job(&ComponentName::from("a_job"), &config, &renderer).unwrap();

        let names: Vec<_> = project
            .components()
            .unwrap()
            .iter()
            .map(|c| (c.kind(), c.name().0.clone()))
            .collect();
        assert_eq!(
            names,
            vec![
                (ComponentKind::Module, "z_mod".to_string()),
                (ComponentKind::Job, "a_job".to_string()),
                (ComponentKind::Job, "b_job".to_string()),
            ]
        );
    }

    #[test]
    fn user_templates_override_embedded_ones() {
        let tmp = TempDir::new().unwrap();
        let templates = tmp.path().join(".gantry").join("templates").join("module");
        fs::create_dir_all(&templates).unwrap();
        fs::write(templates.join("__init__.py.tera"), "# custom {{ name }}\n").unwrap();

        let project = Project::open(tmp.path());
        let renderer = project.scaffold_renderer().unwrap();
        let module = project.create_module(&ComponentName::from("utils"), &renderer).unwrap();
        let init = fs::read_to_string(module.inner_path().join("__init__.py")).unwrap();
        assert_eq!(init, "# custom utils\n");
    }
}
