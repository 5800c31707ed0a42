//! Remote reconciler — compares local manifests with the object store and
//! publishes component versions.
//!
//! ## `sync` ordering
//!
//! 1. Refuse an unlocked component.
//! 2. List the upload file set (fingerprint set plus module artifact).
//! 3. Upload every file on a worker pool; each worker holds its own store
//!    handle.
//! 4. On any failure, stop before the manifest and return the first error.
//! 5. Upload the manifest last. Its presence marks the version as complete.
//!
//! Re-running `sync` overwrites identical keys with identical bytes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use gantry_core::keys::{manifest_key, object_key, object_uri, version_prefix};
use gantry_core::RemoteTarget;

use crate::component::{ComponentBase, LocalState, RemoteState};
use crate::error::{scan_err, EngineError, StoreError};
use crate::hasher::{self, relative_key, FileSet};
use crate::manifest::Manifest;
use crate::store::ObjectStore;

/// Keys written by one [`Reconciler::sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub version_number: u64,
    /// File keys, in upload-list order. Excludes the manifest.
    pub uploaded: Vec<String>,
    pub manifest_key: String,
}

pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    target: RemoteTarget,
    workers: usize,
}

impl Reconciler {
    /// Uses one upload worker per available CPU.
    pub fn new(store: Arc<dyn ObjectStore>, target: RemoteTarget) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Reconciler {
            store,
            target,
            workers,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn target(&self) -> &RemoteTarget {
        &self.target
    }

    /// `<namespace>/<type>/<name>/version=<N>`
    pub fn prefix(&self, component: &ComponentBase, version_number: u64) -> String {
        version_prefix(
            &self.target.namespace,
            component.kind(),
            component.name(),
            version_number,
        )
    }

    /// Remote manifest at the component's persisted version.
    pub fn fetch_manifest(
        &self,
        component: &ComponentBase,
    ) -> Result<Option<Manifest>, EngineError> {
        let version_number = Manifest::load_or_init(component)?.version_number;
        self.fetch_manifest_at(component, version_number)
    }

    /// Remote manifest at `version_number`. A missing object is `None`;
    /// every other store error is returned.
    pub fn fetch_manifest_at(
        &self,
        component: &ComponentBase,
        version_number: u64,
    ) -> Result<Option<Manifest>, EngineError> {
        let key = manifest_key(&self.prefix(component, version_number), component.name());
        let bytes = match self.store.get(&key) {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { .. }) => {
                tracing::debug!("no remote manifest at {key}");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Manifest::from_slice(&bytes)
            .map(Some)
            .map_err(|source| EngineError::RemoteManifestParse { key, source })
    }

    pub fn remote_state(
        &self,
        component: &ComponentBase,
        persisted: &Manifest,
    ) -> Result<RemoteState, EngineError> {
        Ok(match self.fetch_manifest_at(component, persisted.version_number)? {
            None => RemoteState::Missing,
            Some(remote) if remote == *persisted => RemoteState::InSync,
            Some(_) => RemoteState::OutOfSync,
        })
    }

    /// Publish the persisted version of a locked component.
    pub fn sync(&self, component: &ComponentBase) -> Result<SyncReport, EngineError> {
        let current = component.fingerprint()?;
        let persisted = Manifest::load_or_init(component)?;
        if LocalState::compare(&persisted, &current) == LocalState::Unlocked {
            return Err(component.unlocked_error());
        }

        let prefix = self.prefix(component, persisted.version_number);
        let uploads: Vec<(PathBuf, String)> = hasher::list_files(
            component.root_dir(),
            component.kind(),
            component.name(),
            FileSet::Upload,
        )?
        .into_iter()
        .map(|path| {
            let key = object_key(&prefix, &relative_key(component.root_dir(), &path));
            (path, key)
        })
        .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()?;
        let results: Vec<Result<String, EngineError>> = pool.install(|| {
            uploads
                .par_iter()
                .map_init(
                    || Arc::clone(&self.store),
                    |store, (path, key)| upload_file(&**store, path, key),
                )
                .collect()
        });

        let mut uploaded = Vec::with_capacity(results.len());
        for result in results {
            uploaded.push(result?);
        }

        let manifest_path = component.manifest_path();
        let manifest_bytes =
            std::fs::read(&manifest_path).map_err(|e| scan_err(&manifest_path, e))?;
        let manifest_key = manifest_key(&prefix, component.name());
        self.store.put(&manifest_key, &manifest_bytes)?;
        tracing::info!(
            "synced {} '{}' version {}: {} file(s) to {}",
            component.kind(),
            component.name(),
            persisted.version_number,
            uploaded.len(),
            object_uri(&self.target.bucket, &prefix)
        );

        Ok(SyncReport {
            version_number: persisted.version_number,
            uploaded,
            manifest_key,
        })
    }
}

fn upload_file(store: &dyn ObjectStore, path: &Path, key: &str) -> Result<String, EngineError> {
    let bytes = std::fs::read(path).map_err(|e| scan_err(path, e))?;
    store.put(key, &bytes)?;
    tracing::debug!("uploaded {key}");
    Ok(key.to_string())
}
