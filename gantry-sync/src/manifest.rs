//! Version manifest — the persisted `(version_number, fingerprint)` pair of a
//! component.
//!
//! Stored as JSON at `<component>/.version`:
//!
//! ```json
//! { "version_number": 3, "locked_at": "2024-05-01T12:00:00Z", "files": { "etl/main.py": "…" } }
//! ```
//!
//! The legacy flat shape (`{ "<path>": "<digest>", …, "version_number": 3 }`)
//! is still accepted and is rewritten in the structured shape on the next
//! save. Writes use the atomic `.tmp` + rename pattern.

use std::collections::BTreeMap;
use std::io::ErrorKind;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;
use crate::component::ComponentBase;
use crate::error::{io_err, EngineError};
use crate::hasher::Fingerprint;

const LEGACY_VERSION_KEY: &str = "version_number";

/// On-disk manifest payload.
///
/// Equality compares `version_number` and `files`; `locked_at` is
/// informational only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version_number: u64,
    pub locked_at: DateTime<Utc>,
    pub files: Fingerprint,
}

impl PartialEq for Manifest {
    fn eq(&self, other: &Self) -> bool {
        self.version_number == other.version_number && self.files == other.files
    }
}

impl Eq for Manifest {}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestCompat {
    Structured(ManifestStructuredCompat),
    Legacy(BTreeMap<String, serde_json::Value>),
}

#[derive(Debug, Deserialize)]
struct ManifestStructuredCompat {
    #[serde(default)]
    version_number: u64,
    locked_at: Option<DateTime<Utc>>,
    files: Fingerprint,
}

impl Manifest {
    pub fn new(version_number: u64, files: Fingerprint) -> Self {
        Manifest {
            version_number,
            locked_at: Utc::now(),
            files,
        }
    }

    /// True when `files` is exactly the persisted fingerprint.
    pub fn same_files(&self, files: &Fingerprint) -> bool {
        &self.files == files
    }

    /// Parse either manifest shape.
    pub fn from_slice(bytes: &[u8]) -> Result<Manifest, serde_json::Error> {
        match serde_json::from_slice::<ManifestCompat>(bytes)? {
            ManifestCompat::Structured(m) => Ok(Manifest {
                version_number: m.version_number,
                locked_at: m.locked_at.unwrap_or_else(Utc::now),
                files: m.files,
            }),
            ManifestCompat::Legacy(entries) => {
                let mut version_number = 0;
                let mut files = Fingerprint::new();
                for (key, value) in entries {
                    if key == LEGACY_VERSION_KEY {
                        version_number = serde_json::from_value(value)?;
                    } else {
                        files.insert(key, serde_json::from_value(value)?);
                    }
                }
                Ok(Manifest {
                    version_number,
                    locked_at: Utc::now(),
                    files,
                })
            }
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, EngineError> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Read the manifest of `component`, or `None` if it has none yet.
    pub fn read(component: &ComponentBase) -> Result<Option<Manifest>, EngineError> {
        let path = component.manifest_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err(&path, e)),
        };
        Manifest::from_slice(&bytes)
            .map(Some)
            .map_err(|source| EngineError::ManifestParse { path, source })
    }

    /// Write this manifest to `component` atomically.
    pub fn write(&self, component: &ComponentBase) -> Result<(), EngineError> {
        let path = component.manifest_path();
        let bytes = self.to_bytes()?;
        write_atomic(&path, &bytes).map_err(|e| io_err(&path, e))
    }

    /// Read the manifest, creating it at version 0 from the current
    /// fingerprint when the component has none.
    pub fn load_or_init(component: &ComponentBase) -> Result<Manifest, EngineError> {
        if let Some(manifest) = Manifest::read(component)? {
            return Ok(manifest);
        }
        let manifest = Manifest::new(0, component.fingerprint()?);
        manifest.write(component)?;
        tracing::info!("initialised {} '{}' at version 0", component.kind(), component.name());
        Ok(manifest)
    }

    /// Snapshot the current fingerprint under `version_number`, or under the
    /// persisted version when `None`.
    pub fn save(
        component: &ComponentBase,
        version_number: Option<u64>,
    ) -> Result<Manifest, EngineError> {
        let files = component.fingerprint()?;
        let version_number = match version_number {
            Some(v) => v,
            None => Manifest::read(component)?.map_or(0, |m| m.version_number),
        };
        let manifest = Manifest::new(version_number, files);
        manifest.write(component)?;
        tracing::debug!(
            "saved manifest for {} '{}' at version {}",
            component.kind(),
            component.name(),
            version_number
        );
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use gantry_core::types::{ComponentKind, ComponentName};
    use tempfile::TempDir;

    fn job_fixture() -> (TempDir, ComponentBase) {
        let tmp = TempDir::new().unwrap();
        let jobs = tmp.path().join("jobs");
        fs::create_dir_all(jobs.join("etl")).unwrap();
        fs::write(jobs.join("etl").join("main.py"), "print('etl')\n").unwrap();
        let base = ComponentBase::new(ComponentKind::Job, ComponentName::from("etl"), jobs);
        (tmp, base)
    }

    #[test]
    fn load_or_init_writes_version_zero() {
        let (_tmp, base) = job_fixture();
        assert!(!base.manifest_path().exists());

        let manifest = Manifest::load_or_init(&base).unwrap();
        assert_eq!(manifest.version_number, 0);
        assert!(manifest.files.contains_key("etl/main.py"));
        assert!(base.manifest_path().exists());
    }

    #[test]
    fn save_then_read_round_trips_fingerprint() {
        let (_tmp, base) = job_fixture();
        let saved = Manifest::save(&base, Some(4)).unwrap();
        let loaded = Manifest::read(&base).unwrap().expect("manifest");
        assert_eq!(loaded, saved);
        assert_eq!(loaded.files, base.fingerprint().unwrap());
    }

    #[test]
    fn save_without_version_keeps_persisted_number() {
        let (_tmp, base) = job_fixture();
        Manifest::save(&base, Some(7)).unwrap();
        fs::write(base.component_path().join("main.py"), "print('v8')\n").unwrap();
        let manifest = Manifest::save(&base, None).unwrap();
        assert_eq!(manifest.version_number, 7);
    }

    #[test]
    fn equality_ignores_locked_at() {
        let mut files = Fingerprint::new();
        files.insert("etl/main.py".to_string(), "abc".to_string());
        let a = Manifest::new(1, files.clone());
        let mut b = Manifest::new(1, files);
        b.locked_at = a.locked_at - chrono::Duration::days(3);
        assert_eq!(a, b);
        b.version_number = 2;
        assert_ne!(a, b);
    }

    #[test]
    fn legacy_flat_manifest_is_accepted_and_migrated() {
        let (_tmp, base) = job_fixture();
        fs::write(
            base.manifest_path(),
            r#"{"etl/main.py": "deadbeef", "version_number": 5}"#,
        )
        .unwrap();

        let loaded = Manifest::read(&base).unwrap().expect("manifest");
        assert_eq!(loaded.version_number, 5);
        assert_eq!(loaded.files.get("etl/main.py").map(String::as_str), Some("deadbeef"));

        Manifest::save(&base, None).unwrap();
        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(base.manifest_path()).unwrap()).unwrap();
        assert_eq!(raw["version_number"], 5);
        assert!(raw["files"].is_object());
        assert!(raw.get("etl/main.py").is_none());
    }

    #[test]
    fn corrupt_manifest_is_a_parse_error() {
        let (_tmp, base) = job_fixture();
        fs::write(base.manifest_path(), "{not json").unwrap();
        let err = Manifest::load_or_init(&base).unwrap_err();
        assert!(matches!(err, EngineError::ManifestParse { .. }));
    }

    #[test]
    fn tmp_file_cleaned_up_after_write() {
        let (_tmp, base) = job_fixture();
        Manifest::save(&base, Some(1)).unwrap();
        assert!(!base.component_path().join(".version.tmp").exists());
    }
}
