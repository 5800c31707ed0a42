//! Object store boundary.
//!
//! The reconciler only needs `put`, `get` and `list` on a single bucket.
//! [`LocalObjectStore`] keeps objects as files under
//! `<store_dir>/objects/<bucket>/<key>`; [`MemoryObjectStore`] keeps them in memory
//! and can be told to fail uploads.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use walkdir::WalkDir;

use crate::atomic::write_atomic;
use crate::error::StoreError;
use crate::hasher::relative_key;
use crate::util::lock;

/// A bucket-scoped key/value object store.
///
/// Implementations are shared across upload workers.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// The object at `key`, or [`StoreError::NotFound`].
    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Every key starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

// ---------------------------------------------------------------------------
// LocalObjectStore
// ---------------------------------------------------------------------------

/// Directory-backed store: the bucket is a directory under
/// `<store_dir>/objects`, keys are relative paths.
const OBJECTS_DIR: &str = "objects";

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(store_dir: &Path, bucket: &str) -> Self {
        LocalObjectStore {
            root: store_dir.join(OBJECTS_DIR).join(bucket),
        }
    }

    /// Directory holding the bucket's objects.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if key.is_empty() || escapes {
            return Err(StoreError::PermissionDenied {
                key: key.to_string(),
                reason: "key must be a relative path inside the bucket".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

fn map_io(key: &str, err: std::io::Error) -> StoreError {
    let key = key.to_string();
    match err.kind() {
        ErrorKind::NotFound => StoreError::NotFound { key },
        ErrorKind::PermissionDenied => StoreError::PermissionDenied {
            key,
            reason: err.to_string(),
        },
        _ => StoreError::Transport {
            key,
            reason: err.to_string(),
        },
    }
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        write_atomic(&path, bytes).map_err(|e| map_io(key, e))
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        std::fs::read(&path).map_err(|e| map_io(key, e))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        if !self.root.is_dir() {
            return Ok(vec![]);
        }
        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry.map_err(|e| StoreError::Transport {
                key: prefix.to_string(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let key = relative_key(&self.root, entry.path());
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    failing: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `put` whose key contains `fragment` fail with a transport
    /// error.
    pub fn fail_puts_containing(&self, fragment: &str) {
        lock(&self.failing).push(fragment.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        lock(&self.objects).keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects).get(key).cloned()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        if lock(&self.failing).iter().any(|f| key.contains(f.as_str())) {
            return Err(StoreError::Transport {
                key: key.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        lock(&self.objects).insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.object(key).ok_or_else(|| StoreError::NotFound {
            key: key.to_string(),
        })
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.objects)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn local_put_get_list() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path(), "lake");
        store.put("gantry/gantry_job/etl/version=0/etl/main.py", b"print()").unwrap();
        store.put("gantry/gantry_job/etl/version=1/etl/main.py", b"print(1)").unwrap();
        store.put("gantry/gantry_module/utils/version=0/utils/utils.zip", b"PK").unwrap();

        assert_eq!(
            store.get("gantry/gantry_job/etl/version=1/etl/main.py").unwrap(),
            b"print(1)"
        );
        assert_eq!(
            store.list("gantry/gantry_job/etl/").unwrap(),
            vec![
                "gantry/gantry_job/etl/version=0/etl/main.py".to_string(),
                "gantry/gantry_job/etl/version=1/etl/main.py".to_string(),
            ]
        );
        assert!(tmp.path().join("objects/lake/gantry").is_dir());
    }

    #[test]
    fn local_missing_key_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path(), "lake");
        assert!(matches!(store.get("nope/.version"), Err(StoreError::NotFound { .. })));
        assert!(store.list("").unwrap().is_empty());
    }

    #[test]
    fn local_rejects_keys_outside_bucket() {
        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path(), "lake");
        assert!(matches!(
            store.put("../escape", b"x"),
            Err(StoreError::PermissionDenied { .. })
        ));
        assert!(matches!(
            store.put("/abs/key", b"x"),
            Err(StoreError::PermissionDenied { .. })
        ));
    }

    #[test]
    fn memory_injected_failure_only_hits_matching_keys() {
        let store = MemoryObjectStore::new();
        store.fail_puts_containing("broken.py");
        assert!(matches!(
            store.put("p/broken.py", b"x"),
            Err(StoreError::Transport { .. })
        ));
        store.put("p/fine.py", b"x").unwrap();
        assert_eq!(store.keys(), vec!["p/fine.py".to_string()]);
        assert!(matches!(store.get("p/broken.py"), Err(StoreError::NotFound { .. })));
    }

    #[test]
    fn bucket_named_jobs_stays_apart_from_job_registry() {
        use crate::orchestration::{JobApi, LocalJobApi};

        let tmp = TempDir::new().unwrap();
        let store = LocalObjectStore::new(tmp.path(), "jobs");
        let api = LocalJobApi::new(tmp.path());
        store.put("etl.json", b"object").unwrap();
        api.create_job(&serde_json::json!({"Name": "etl"})).unwrap();

        assert_eq!(store.get("etl.json").unwrap(), b"object");
        assert_eq!(store.list("").unwrap(), vec!["etl.json".to_string()]);
        assert_eq!(
            api.get_job("etl").unwrap(),
            Some(serde_json::json!({"Name": "etl"}))
        );
    }
}
