//! # gantry-sync
//!
//! Version and deployment reconciliation for jobs and modules.
//!
//! A component's files are fingerprinted ([`hasher`]), frozen as a numbered
//! version in its `.version` manifest ([`manifest`]) and published to an
//! object store under a per-version prefix ([`remote`]). Lifecycle state is
//! always derived by comparing the three ([`component`]).
//!
//! [`Project`] discovers components; [`pipeline`] runs lock, package, status
//! and deploy over a [`ComponentCollection`] and reports every failure.

mod atomic;
mod util;

pub mod collection;
pub mod component;
pub mod diff;
pub mod error;
pub mod hasher;
pub mod job;
pub mod manifest;
pub mod module;
pub mod orchestration;
pub mod pipeline;
pub mod project;
pub mod remote;
pub mod store;

pub use collection::ComponentCollection;
pub use component::{
    Component, ComponentBase, ComponentStatus, DeployOutcome, LocalState, LockOutcome, RemoteState,
};
pub use diff::{diff_deployment, DeploymentDiff};
pub use error::{EngineError, JobApiError, StoreError};
pub use job::{Job, JobConfig};
pub use manifest::Manifest;
pub use module::{Module, PackageOutcome};
pub use orchestration::{create_or_update, Applied, JobApi, LocalJobApi, MemoryJobApi};
pub use pipeline::{BatchReport, CheckReport, Failure, PackageResult};
pub use project::Project;
pub use remote::{Reconciler, SyncReport};
pub use store::{LocalObjectStore, MemoryObjectStore, ObjectStore};
