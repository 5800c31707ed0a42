//! Collection-wide operations shared by the CLI commands.
//!
//! Every operation visits each component in collection order and keeps
//! going after a component fails; failures are collected in the
//! [`BatchReport`] and logged.

use gantry_core::types::ComponentKind;

use crate::collection::ComponentCollection;
use crate::component::{Component, ComponentStatus, DeployOutcome, LocalState, LockOutcome};
use crate::error::EngineError;
use crate::module::PackageOutcome;
use crate::orchestration::JobApi;
use crate::project::Project;
use crate::remote::Reconciler;

/// A component that failed during a batch operation.
#[derive(Debug)]
pub struct Failure {
    pub kind: ComponentKind,
    pub name: String,
    pub error: EngineError,
}

/// Per-component results of one batch operation.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub completed: Vec<(Component, T)>,
    pub failures: Vec<Failure>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        BatchReport {
            completed: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, component: &Component, result: Result<T, EngineError>) {
        match result {
            Ok(value) => self.completed.push((component.clone(), value)),
            Err(error) => self.failures.push(Failure::logged(component, error)),
        }
    }
}

impl Failure {
    fn logged(component: &Component, error: EngineError) -> Self {
        tracing::warn!("{} '{}' failed: {error}", component.kind(), component.name());
        Failure {
            kind: component.kind(),
            name: component.name().0.clone(),
            error,
        }
    }
}

fn run_each<T>(
    components: &ComponentCollection,
    mut op: impl FnMut(&Component) -> Result<T, EngineError>,
) -> BatchReport<T> {
    let mut report = BatchReport::default();
    for component in components {
        report.record(component, op(component));
    }
    report
}

/// Lock every component. Modules lock by packaging.
pub fn lock_all(components: &ComponentCollection) -> BatchReport<LockOutcome> {
    run_each(components, Component::lock)
}

/// Package every module, or delete every artifact when `purge` is set.
/// Jobs are skipped.
pub fn package_all(components: &ComponentCollection, purge: bool) -> BatchReport<PackageResult> {
    run_each(&components.of_kind(ComponentKind::Module), |component| {
        let Component::Module(module) = component else {
            return Ok(PackageResult::Skipped);
        };
        if purge {
            return module.purge().map(PackageResult::Purged);
        }
        module.package().map(PackageResult::Packaged)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageResult {
    Packaged(PackageOutcome),
    /// `true` when an artifact was deleted.
    Purged(bool),
    Skipped,
}

pub fn status_all(
    components: &ComponentCollection,
    reconciler: &Reconciler,
) -> BatchReport<ComponentStatus> {
    run_each(components, |component| component.status(reconciler))
}

/// Deploy every component that is locked and packaged.
pub fn deploy_all(
    project: &Project,
    components: &ComponentCollection,
    reconciler: &Reconciler,
    api: &dyn JobApi,
    dry_run: bool,
) -> BatchReport<DeployOutcome> {
    run_each(components, |component| {
        component.deploy(project, reconciler, api, dry_run)
    })
}

/// Components that block a deploy, plus components whose state could not
/// be read.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub unlocked: Vec<Component>,
    pub unpackaged: Vec<Component>,
    pub failures: Vec<Failure>,
}

impl CheckReport {
    /// True when some readable component is unlocked or unpackaged.
    pub fn has_blockers(&self) -> bool {
        !self.unlocked.is_empty() || !self.unpackaged.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        !self.has_blockers() && self.failures.is_empty()
    }
}

/// Find unlocked components and modules whose artifact is stale or missing.
///
/// A component whose manifest or files cannot be read is recorded as a
/// failure and the remaining components are still checked.
pub fn check(components: &ComponentCollection) -> CheckReport {
    let mut report = CheckReport::default();
    for component in components {
        let state = component
            .local_state()
            .and_then(|local| Ok((local, component.is_packaged()?)));
        match state {
            Ok((local, packaged)) => {
                if local == LocalState::Unlocked {
                    report.unlocked.push(component.clone());
                }
                if !packaged {
                    report.unpackaged.push(component.clone());
                }
            }
            Err(error) => report.failures.push(Failure::logged(component, error)),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;

    use gantry_core::types::ComponentName;
    use gantry_core::RemoteTarget;
    use tempfile::TempDir;

    use super::*;
    use crate::error::JobApiError;
    use crate::orchestration::{Applied, MemoryJobApi};
    use crate::store::MemoryObjectStore;

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    fn reconciler(store: Arc<MemoryObjectStore>) -> Reconciler {
        Reconciler::new(
            store,
            RemoteTarget {
                bucket: "lake".to_string(),
                namespace: "gantry".to_string(),
            },
        )
        .with_workers(2)
    }

    /// Module `utils` and job `etl` pinned to `utils` version 0.
    fn project() -> (TempDir, Project) {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path();
        write(&root.join("modules/utils/utils/__init__.py"), "");
        write(
            &root.join("jobs/etl/config.yml"),
            "job_config:\n  Name: etl\n  Command: {}\nmodules:\n  utils:\n    version_number: 0\n",
        );
        write(&root.join("jobs/etl/main.py"), "print('etl')\n");
        let project = Project::open(root);
        (tmp, project)
    }

    #[test]
    fn lock_then_deploy_publishes_everything() {
        let (_tmp, project) = project();
        let components = project.components().expect("components");
        let store = Arc::new(MemoryObjectStore::new());
        let reconciler = reconciler(Arc::clone(&store));
        let api = MemoryJobApi::new();

        let locked = lock_all(&components);
        assert!(locked.is_success());
        assert!(check(&components).is_ready());

        let deployed = deploy_all(&project, &components, &reconciler, &api, false);
        assert!(deployed.is_success(), "{:?}", deployed.failures);
        assert_eq!(deployed.completed.len(), 2);
        assert!(store
            .object("gantry/gantry_module/utils/version=0/utils/utils.zip")
            .is_some());
        let applied = match &deployed.completed[1].1 {
            DeployOutcome::Deployed { applied, .. } => applied.clone(),
            other => panic!("unexpected outcome {other:?}"),
        };
        assert_eq!(applied, vec![Applied::Created("etl".to_string())]);
        let job = api.job("etl").expect("job registered");
        assert_eq!(
            job["DefaultArguments"]["--extra-py-files"],
            serde_json::json!("s3://lake/gantry/gantry_module/utils/version=0/utils/utils.zip")
        );

        let again = deploy_all(&project, &components, &reconciler, &api, false);
        assert!(again.is_success(), "{:?}", again.failures);
        assert_eq!(again.completed[0].1, DeployOutcome::UpToDate { version_number: 0 });
        assert_eq!(
            again.completed[1].1,
            DeployOutcome::Deployed {
                version_number: 0,
                uploaded: 0,
                applied: vec![Applied::Updated("etl".to_string())],
            }
        );
    }

    #[test]
    fn job_api_failure_after_upload_is_retried_on_next_deploy() {
        let (_tmp, project) = project();
        let components = project.components().expect("components");
        let store = Arc::new(MemoryObjectStore::new());
        let reconciler = reconciler(Arc::clone(&store));
        let api = MemoryJobApi::new();
        api.fail_next_creates(1);
        lock_all(&components);

        let first = deploy_all(&project, &components, &reconciler, &api, false);
        assert_eq!(first.failures.len(), 1);
        assert_eq!(first.failures[0].name, "etl");
        assert!(matches!(
            first.failures[0].error,
            EngineError::JobApi(JobApiError::Request { .. })
        ));
        assert!(api.job("etl").is_none());

        let retry = deploy_all(&project, &components, &reconciler, &api, false);
        assert!(retry.is_success(), "{:?}", retry.failures);
        assert_eq!(
            retry.completed[1].1,
            DeployOutcome::Deployed {
                version_number: 0,
                uploaded: 0,
                applied: vec![Applied::Created("etl".to_string())],
            }
        );
        assert!(api.job("etl").is_some());
    }

    #[test]
    fn failing_component_does_not_stop_the_batch() {
        let (tmp, project) = project();
        write(&tmp.path().join("jobs/broken/config.yml"), "job_config: [unterminated\n");
        write(&tmp.path().join("jobs/broken/main.py"), "");
        let components = project.components().expect("components");
        lock_all(&components);

        let store = Arc::new(MemoryObjectStore::new());
        let api = MemoryJobApi::new();
        let report = deploy_all(&project, &components, &reconciler(store), &api, false);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "broken");
        assert!(matches!(report.failures[0].error, EngineError::Yaml { .. }));
        let names: Vec<_> = report.completed.iter().map(|(c, _)| c.name().0.clone()).collect();
        assert_eq!(names, vec!["utils", "etl"]);
    }

    #[test]
    fn dry_run_publishes_nothing() {
        let (_tmp, project) = project();
        let components = project.components().expect("components");
        lock_all(&components);
        let store = Arc::new(MemoryObjectStore::new());
        let api = MemoryJobApi::new();

        let report = deploy_all(&project, &components, &reconciler(Arc::clone(&store)), &api, true);
        assert!(report.is_success(), "{:?}", report.failures);
        assert!(matches!(
            report.completed[1].1,
            DeployOutcome::WouldDeploy { version_number: 0, documents: 1 }
        ));
        assert!(store.keys().is_empty());
        assert!(api.calls().is_empty());
    }

    #[test]
    fn check_reports_unlocked_and_unpackaged() {
        let (tmp, project) = project();
        let components = project.components().expect("components");
        lock_all(&components);
        write(&tmp.path().join("jobs/etl/main.py"), "print('edited')\n");
        project
            .module(&ComponentName::from("utils"))
            .expect("module")
            .purge()
            .expect("purge");

        let report = check(&components);
        assert!(!report.is_ready());
        assert_eq!(report.unlocked.len(), 1);
        assert_eq!(report.unlocked[0].name().0, "etl");
        assert_eq!(report.unpackaged.len(), 1);
        assert_eq!(report.unpackaged[0].name().0, "utils");
    }

    #[test]
    fn check_keeps_going_past_a_corrupt_manifest() {
        let (tmp, project) = project();
        write(&tmp.path().join("jobs/broken/main.py"), "");
        write(&tmp.path().join("jobs/broken/.version"), "{corrupt");
        let components = project.components().expect("components");
        lock_all(&components);
        write(&tmp.path().join("jobs/etl/main.py"), "print('edited')\n");

        let report = check(&components);
        assert!(!report.is_ready());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, "broken");
        assert!(matches!(report.failures[0].error, EngineError::ManifestParse { .. }));
        let unlocked: Vec<_> = report.unlocked.iter().map(|c| c.name().0.clone()).collect();
        assert_eq!(unlocked, vec!["etl"]);
        assert!(report.unpackaged.is_empty());
    }

    #[test]
    fn package_purge_only_touches_modules() {
        let (_tmp, project) = project();
        let components = project.components().expect("components");
        let packaged = package_all(&components, false);
        assert_eq!(packaged.completed.len(), 1);
        assert!(matches!(
            packaged.completed[0].1,
            PackageResult::Packaged(PackageOutcome::Packaged { version_number: 0, locked: false })
        ));

        let purged = package_all(&components, true);
        assert_eq!(purged.completed[0].1, PackageResult::Purged(true));
        assert!(!components.are_packaged().expect("packaged"));
    }
}
