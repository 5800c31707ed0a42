//! Job orchestration boundary.
//!
//! Deployment documents are applied with create-or-update: look the job up
//! by `Name`; create it when absent, otherwise update it with `Name` passed
//! separately and removed from the body.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use crate::atomic::write_atomic;
use crate::error::JobApiError;
use crate::util::lock;

const NAME: &str = "Name";

/// Minimal job orchestration API.
pub trait JobApi {
    /// The stored definition of `name`, or `None` if no such job exists.
    fn get_job(&self, name: &str) -> Result<Option<Value>, JobApiError>;

    fn create_job(&self, definition: &Value) -> Result<(), JobApiError>;

    /// Replace the definition of `name`. `update` carries no `Name` key.
    fn update_job(&self, name: &str, update: &Value) -> Result<(), JobApiError>;
}

/// What [`create_or_update`] did for one deployment document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "name", rename_all = "snake_case")]
pub enum Applied {
    Created(String),
    Updated(String),
}

pub fn create_or_update(api: &dyn JobApi, definition: &Value) -> Result<Applied, JobApiError> {
    let name = definition_name(definition)?.to_string();
    match api.get_job(&name)? {
        None => {
            tracing::info!("job '{name}' does not exist; creating it");
            api.create_job(definition)?;
            Ok(Applied::Created(name))
        }
        Some(_) => {
            tracing::info!("job '{name}' exists; updating it");
            let mut update = definition.clone();
            if let Some(body) = update.as_object_mut() {
                body.remove(NAME);
            }
            api.update_job(&name, &update)?;
            Ok(Applied::Updated(name))
        }
    }
}

fn definition_name(definition: &Value) -> Result<&str, JobApiError> {
    definition
        .get(NAME)
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| JobApiError::InvalidDefinition {
            reason: "definition has no Name".to_string(),
        })
}

fn with_name(name: &str, update: &Value) -> Result<Value, JobApiError> {
    let mut body = update
        .as_object()
        .cloned()
        .ok_or_else(|| JobApiError::InvalidDefinition {
            reason: format!("update for '{name}' is not a mapping"),
        })?;
    body.insert(NAME.to_string(), Value::String(name.to_string()));
    Ok(Value::Object(body))
}

// ---------------------------------------------------------------------------
// LocalJobApi
// ---------------------------------------------------------------------------

/// Job registry kept as one JSON file per job under `<store_dir>/jobs/`.
#[derive(Debug, Clone)]
pub struct LocalJobApi {
    dir: PathBuf,
}

impl LocalJobApi {
    pub fn new(store_dir: &Path) -> Self {
        LocalJobApi {
            dir: store_dir.join("jobs"),
        }
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, JobApiError> {
        let valid = !name.is_empty()
            && !name.starts_with('.')
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(JobApiError::InvalidDefinition {
                reason: format!("'{name}' cannot be used as a job name"),
            });
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    fn store(&self, name: &str, definition: &Value) -> Result<(), JobApiError> {
        let path = self.path_for(name)?;
        let request_err = |reason: String| JobApiError::Request {
            name: name.to_string(),
            reason,
        };
        let json = serde_json::to_vec_pretty(definition).map_err(|e| request_err(e.to_string()))?;
        write_atomic(&path, &json).map_err(|e| request_err(format!("{}: {e}", path.display())))
    }
}

impl JobApi for LocalJobApi {
    fn get_job(&self, name: &str) -> Result<Option<Value>, JobApiError> {
        let path = self.path_for(name)?;
        let request_err = |reason: String| JobApiError::Request {
            name: name.to_string(),
            reason,
        };
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(request_err(format!("{}: {e}", path.display()))),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| request_err(e.to_string()))
    }

    fn create_job(&self, definition: &Value) -> Result<(), JobApiError> {
        let name = definition_name(definition)?;
        if self.path_for(name)?.exists() {
            return Err(JobApiError::AlreadyExists {
                name: name.to_string(),
            });
        }
        self.store(name, definition)
    }

    fn update_job(&self, name: &str, update: &Value) -> Result<(), JobApiError> {
        if !self.path_for(name)?.exists() {
            return Err(JobApiError::NotFound {
                name: name.to_string(),
            });
        }
        self.store(name, &with_name(name, update)?)
    }
}

// ---------------------------------------------------------------------------
// MemoryJobApi
// ---------------------------------------------------------------------------

/// In-memory job registry that records every call and can be told to fail
/// creates.
#[derive(Debug, Default)]
pub struct MemoryJobApi {
    jobs: Mutex<BTreeMap<String, Value>>,
    calls: Mutex<Vec<String>>,
    failing_creates: Mutex<usize>,
}

impl MemoryJobApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job(&self, name: &str) -> Option<Value> {
        lock(&self.jobs).get(name).cloned()
    }

    /// Make the next `count` calls to `create_job` fail with a request error.
    pub fn fail_next_creates(&self, count: usize) {
        *lock(&self.failing_creates) += count;
    }

    /// Calls in order, as `"<method>:<name>"`.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }
}

impl JobApi for MemoryJobApi {
    fn get_job(&self, name: &str) -> Result<Option<Value>, JobApiError> {
        lock(&self.calls).push(format!("get_job:{name}"));
        Ok(self.job(name))
    }

    fn create_job(&self, definition: &Value) -> Result<(), JobApiError> {
        let name = definition_name(definition)?.to_string();
        lock(&self.calls).push(format!("create_job:{name}"));
        {
            let mut failing = lock(&self.failing_creates);
            if *failing > 0 {
                *failing -= 1;
                return Err(JobApiError::Request {
                    name,
                    reason: "injected failure".to_string(),
                });
            }
        }
        let mut jobs = lock(&self.jobs);
        if jobs.contains_key(&name) {
            return Err(JobApiError::AlreadyExists { name });
        }
        jobs.insert(name, definition.clone());
        Ok(())
    }

    fn update_job(&self, name: &str, update: &Value) -> Result<(), JobApiError> {
        lock(&self.calls).push(format!("update_job:{name}"));
        if update.get(NAME).is_some() {
            return Err(JobApiError::InvalidDefinition {
                reason: "update body must not carry Name".to_string(),
            });
        }
        let mut jobs = lock(&self.jobs);
        if !jobs.contains_key(name) {
            return Err(JobApiError::NotFound {
                name: name.to_string(),
            });
        }
        jobs.insert(name.to_string(), with_name(name, update)?);
        Ok(())
    }
}
