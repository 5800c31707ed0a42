//! Components and their lifecycle.
//!
//! State is always derived, never cached:
//!
//! | Local    | Remote manifest at the persisted version  | Meaning      |
//! |----------|-------------------------------------------|--------------|
//! | Unlocked | any                                       | edits in progress |
//! | Locked   | missing                                   | deployable   |
//! | Locked   | differs in files or version               | deployable   |
//! | Locked   | same files and version                    | in sync      |
//!
//! Local is `Locked` when the current fingerprint equals the persisted one.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use gantry_core::layout::{kind_dir_at, MANIFEST_FILE};
use gantry_core::types::{ComponentKind, ComponentName};

use crate::error::EngineError;
use crate::hasher::{self, Fingerprint};
use crate::job::Job;
use crate::manifest::Manifest;
use crate::module::{Module, PackageOutcome};
use crate::orchestration::{create_or_update, Applied, JobApi};
use crate::project::Project;
use crate::remote::Reconciler;

// ---------------------------------------------------------------------------
// ComponentBase
// ---------------------------------------------------------------------------

/// Identity and on-disk location shared by every component kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentBase {
    kind: ComponentKind,
    name: ComponentName,
    /// The kind directory; the component owns `root_dir/name`.
    root_dir: PathBuf,
}

impl ComponentBase {
    pub fn new(kind: ComponentKind, name: ComponentName, root_dir: impl Into<PathBuf>) -> Self {
        ComponentBase {
            kind,
            name,
            root_dir: root_dir.into(),
        }
    }

    /// Component `name` of `kind` inside the project at `project_root`.
    pub fn at(project_root: &Path, kind: ComponentKind, name: ComponentName) -> Self {
        ComponentBase::new(kind, name, kind_dir_at(project_root, kind))
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn name(&self) -> &ComponentName {
        &self.name
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn component_path(&self) -> PathBuf {
        self.root_dir.join(&self.name.0)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.component_path().join(MANIFEST_FILE)
    }

    pub fn exists(&self) -> bool {
        self.component_path().is_dir()
    }

    /// Fingerprint of the files currently on disk.
    pub fn fingerprint(&self) -> Result<Fingerprint, EngineError> {
        hasher::fingerprint(&self.root_dir, self.kind, &self.name)
    }

    /// Persisted version number, initialising the manifest if needed.
    pub fn version_number(&self) -> Result<u64, EngineError> {
        Ok(Manifest::load_or_init(self)?.version_number)
    }

    pub fn local_state(&self) -> Result<LocalState, EngineError> {
        let current = self.fingerprint()?;
        let persisted = Manifest::load_or_init(self)?;
        Ok(LocalState::compare(&persisted, &current))
    }

    /// Freeze the current fingerprint as version N+1.
    ///
    /// A locked component is left alone: its version is unchanged and the
    /// manifest file is not rewritten.
    pub fn lock(&self) -> Result<LockOutcome, EngineError> {
        let current = self.fingerprint()?;
        let persisted = Manifest::load_or_init(self)?;
        if persisted.same_files(&current) {
            tracing::debug!(
                "{} '{}' already locked at version {}",
                self.kind,
                self.name,
                persisted.version_number
            );
            return Ok(LockOutcome::Unchanged {
                version_number: persisted.version_number,
            });
        }
        let next = persisted.version_number + 1;
        let manifest = Manifest::save(self, Some(next))?;
        tracing::info!(
            "locked {} '{}' at version {}",
            self.kind,
            self.name,
            manifest.version_number
        );
        Ok(LockOutcome::Locked {
            version_number: manifest.version_number,
        })
    }

    pub(crate) fn unlocked_error(&self) -> EngineError {
        EngineError::Unlocked {
            kind: self.kind,
            name: self.name.0.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle states
// ---------------------------------------------------------------------------

/// Local content compared with the persisted manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalState {
    Unlocked,
    Locked,
}

impl LocalState {
    pub fn compare(persisted: &Manifest, current: &Fingerprint) -> LocalState {
        if persisted.same_files(current) {
            LocalState::Locked
        } else {
            LocalState::Unlocked
        }
    }
}

impl fmt::Display for LocalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalState::Unlocked => write!(f, "edits in progress"),
            LocalState::Locked => write!(f, "locked"),
        }
    }
}

/// Persisted manifest compared with the remote manifest at the same version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteState {
    /// No manifest has been published for the persisted version.
    Missing,
    OutOfSync,
    InSync,
}

impl fmt::Display for RemoteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteState::Missing => write!(f, "not deployed"),
            RemoteState::OutOfSync => write!(f, "out of sync"),
            RemoteState::InSync => write!(f, "in sync"),
        }
    }
}

/// Snapshot of one component's lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentStatus {
    pub kind: ComponentKind,
    pub name: String,
    pub version_number: u64,
    pub local: LocalState,
    pub remote: RemoteState,
}

impl ComponentStatus {
    pub fn is_locked(&self) -> bool {
        self.local == LocalState::Locked
    }

    pub fn is_deployable(&self) -> bool {
        self.is_locked() && self.remote != RemoteState::InSync
    }

    pub fn is_in_sync(&self) -> bool {
        self.is_locked() && self.remote == RemoteState::InSync
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    Locked { version_number: u64 },
    Unchanged { version_number: u64 },
}

impl LockOutcome {
    pub fn version_number(&self) -> u64 {
        match self {
            LockOutcome::Locked { version_number } | LockOutcome::Unchanged { version_number } => {
                *version_number
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Files and manifest published (`uploaded` is zero for a job already
    /// in sync); for jobs, every deployment document applied through the
    /// job API.
    Deployed {
        version_number: u64,
        uploaded: usize,
        applied: Vec<Applied>,
    },
    /// Dry run: what `Deployed` would have published.
    WouldDeploy {
        version_number: u64,
        documents: usize,
    },
    /// Module already published at its persisted version.
    UpToDate { version_number: u64 },
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// A job or a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Job(Job),
    Module(Module),
}

impl Component {
    pub fn base(&self) -> &ComponentBase {
        match self {
            Component::Job(job) => job.base(),
            Component::Module(module) => module.base(),
        }
    }

    pub fn kind(&self) -> ComponentKind {
        self.base().kind()
    }

    pub fn name(&self) -> &ComponentName {
        self.base().name()
    }

    pub fn local_state(&self) -> Result<LocalState, EngineError> {
        self.base().local_state()
    }

    /// Modules lock by packaging, so the artifact always matches the
    /// locked sources.
    pub fn lock(&self) -> Result<LockOutcome, EngineError> {
        match self {
            Component::Job(job) => job.base().lock(),
            Component::Module(module) => Ok(match module.package()? {
                PackageOutcome::Packaged {
                    version_number,
                    locked: true,
                } => LockOutcome::Locked { version_number },
                PackageOutcome::Packaged { version_number, .. }
                | PackageOutcome::UpToDate { version_number } => {
                    LockOutcome::Unchanged { version_number }
                }
            }),
        }
    }

    /// Jobs have no artifact and always count as packaged.
    pub fn is_packaged(&self) -> Result<bool, EngineError> {
        match self {
            Component::Job(_) => Ok(true),
            Component::Module(module) => module.is_packaged(),
        }
    }

    pub fn status(&self, reconciler: &Reconciler) -> Result<ComponentStatus, EngineError> {
        let base = self.base();
        let current = base.fingerprint()?;
        let persisted = Manifest::load_or_init(base)?;
        let remote = reconciler.remote_state(base, &persisted)?;
        Ok(ComponentStatus {
            kind: base.kind(),
            name: base.name().0.clone(),
            version_number: persisted.version_number,
            local: LocalState::compare(&persisted, &current),
            remote,
        })
    }

    /// Publish a locked component.
    ///
    /// Jobs render and persist `deployment.yml`, sync their files, then
    /// create or update one orchestration job per deployment document. A job
    /// already in sync skips the upload but its definitions are applied
    /// again, so a deploy whose job API calls failed can be retried.
    pub fn deploy(
        &self,
        project: &Project,
        reconciler: &Reconciler,
        api: &dyn JobApi,
        dry_run: bool,
    ) -> Result<DeployOutcome, EngineError> {
        let base = self.base();
        let status = self.status(reconciler)?;
        if !status.is_locked() {
            return Err(base.unlocked_error());
        }
        let version_number = status.version_number;

        match self {
            Component::Module(module) => {
                if !module.is_packaged()? {
                    return Err(EngineError::NotPackaged {
                        name: base.name().0.clone(),
                    });
                }
                if status.is_in_sync() {
                    tracing::info!(
                        "module '{}' is in sync at version {version_number}",
                        base.name()
                    );
                    return Ok(DeployOutcome::UpToDate { version_number });
                }
                if dry_run {
                    return Ok(DeployOutcome::WouldDeploy {
                        version_number,
                        documents: 0,
                    });
                }
                let report = reconciler.sync(base)?;
                Ok(DeployOutcome::Deployed {
                    version_number,
                    uploaded: report.uploaded.len(),
                    applied: vec![],
                })
            }
            Component::Job(job) => {
                let documents = job.render(project, reconciler.target())?;
                if dry_run {
                    return Ok(DeployOutcome::WouldDeploy {
                        version_number,
                        documents: documents.len(),
                    });
                }
                job.write_deployment(&documents)?;
                let uploaded = if status.is_in_sync() {
                    tracing::debug!(
                        "job '{}' files in sync at version {version_number}",
                        base.name()
                    );
                    0
                } else {
                    reconciler.sync(base)?.uploaded.len()
                };
                let mut applied = Vec::with_capacity(documents.len());
                for document in &documents {
                    applied.push(create_or_update(api, document)?);
                }
                Ok(DeployOutcome::Deployed {
                    version_number,
                    uploaded,
                    applied,
                })
            }
        }
    }
}

impl From<Job> for Component {
    fn from(job: Job) -> Self {
        Component::Job(job)
    }
}

impl From<Module> for Component {
    fn from(module: Module) -> Self {
        Component::Module(module)
    }
}
