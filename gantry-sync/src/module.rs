//! Shared modules and their package artifact.
//!
//! A module lives at `modules/<name>/` with its importable package in
//! `modules/<name>/<name>/`. The artifact `modules/<name>/<name>.zip` holds
//! every `*.py` file of the module, with entry names relative to the module
//! directory, so the zip root contains the `<name>` package.
//!
//! Archives are deterministic: entries are sorted by path, every entry gets
//! the same timestamp and permissions, and compression is fixed. Identical
//! sources always produce byte-identical archives, which is what
//! [`Module::is_packaged`] relies on.

use std::io::{Cursor, ErrorKind, Write};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use gantry_core::keys::{object_key, object_uri, version_prefix};
use gantry_core::layout::module_artifact_name;
use gantry_core::types::{ComponentKind, ComponentName};
use gantry_core::RemoteTarget;

use crate::atomic::write_atomic;
use crate::component::{ComponentBase, LocalState};
use crate::error::{io_err, scan_err, EngineError};
use crate::hasher::{self, relative_key, FileSet};
use crate::manifest::Manifest;

const PY_EXTENSION: &str = "py";
const ENTRY_PERMISSIONS: u32 = 0o644;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageOutcome {
    /// The artifact was rebuilt. `locked` is true when the sources had
    /// changed and the module moved to a new version.
    Packaged { version_number: u64, locked: bool },
    /// Sources locked and artifact current; nothing written.
    UpToDate { version_number: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    base: ComponentBase,
}

impl Module {
    /// Module `name` inside `root_dir` (the project's `modules/` directory).
    pub fn new(root_dir: impl Into<PathBuf>, name: ComponentName) -> Self {
        Module {
            base: ComponentBase::new(ComponentKind::Module, name, root_dir),
        }
    }

    pub fn base(&self) -> &ComponentBase {
        &self.base
    }

    /// `modules/<name>/<name>`, the importable package.
    pub fn inner_path(&self) -> PathBuf {
        self.base.component_path().join(&self.base.name().0)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.base
            .component_path()
            .join(module_artifact_name(self.base.name()))
    }

    /// Remote URI of the artifact published for `version_number`.
    pub fn artifact_uri(&self, target: &RemoteTarget, version_number: u64) -> String {
        let prefix = version_prefix(
            &target.namespace,
            ComponentKind::Module,
            self.base.name(),
            version_number,
        );
        let relative = relative_key(self.base.root_dir(), &self.artifact_path());
        object_uri(&target.bucket, &object_key(&prefix, &relative))
    }

    /// Every `*.py` file of the module, sorted by path.
    pub fn source_files(&self) -> Result<Vec<PathBuf>, EngineError> {
        let files = hasher::list_files(
            self.base.root_dir(),
            ComponentKind::Module,
            self.base.name(),
            FileSet::Fingerprint,
        )?;
        Ok(files
            .into_iter()
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(PY_EXTENSION))
            .collect())
    }

    /// Build the archive in memory.
    pub fn build_archive(&self) -> Result<Vec<u8>, EngineError> {
        let artifact = self.artifact_path();
        let component_path = self.base.component_path();
        let zip_err = |source: zip::result::ZipError| EngineError::Zip {
            path: artifact.clone(),
            source,
        };

        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(ENTRY_PERMISSIONS);

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for path in self.source_files()? {
            let entry = relative_key(&component_path, &path);
            let content = std::fs::read(&path).map_err(|e| scan_err(&path, e))?;
            writer.start_file(entry, options).map_err(zip_err)?;
            writer.write_all(&content).map_err(|e| io_err(&artifact, e))?;
        }
        let cursor = writer.finish().map_err(zip_err)?;
        Ok(cursor.into_inner())
    }

    /// True when the artifact exists and matches a fresh build of the
    /// current sources.
    pub fn is_packaged(&self) -> Result<bool, EngineError> {
        let Some(existing) = self.read_artifact()? else {
            return Ok(false);
        };
        Ok(existing == self.build_archive()?)
    }

    /// Rebuild the artifact when it is missing or stale, and lock the module
    /// when its sources changed since the last lock.
    pub fn package(&self) -> Result<PackageOutcome, EngineError> {
        let current = self.base.fingerprint()?;
        let persisted = Manifest::load_or_init(&self.base)?;
        let unlocked = LocalState::compare(&persisted, &current) == LocalState::Unlocked;

        let archive = self.build_archive()?;
        let up_to_date = self.read_artifact()?.as_deref() == Some(archive.as_slice());
        if !unlocked && up_to_date {
            tracing::debug!("module '{}' package is up to date", self.base.name());
            return Ok(PackageOutcome::UpToDate {
                version_number: persisted.version_number,
            });
        }

        let artifact = self.artifact_path();
        write_atomic(&artifact, &archive).map_err(|e| io_err(&artifact, e))?;

        let version_number = if unlocked {
            Manifest::save(&self.base, Some(persisted.version_number + 1))?.version_number
        } else {
            persisted.version_number
        };
        tracing::info!(
            "packaged module '{}' at version {version_number}",
            self.base.name()
        );
        Ok(PackageOutcome::Packaged {
            version_number,
            locked: unlocked,
        })
    }

    /// Delete the artifact. Returns whether there was one.
    pub fn purge(&self) -> Result<bool, EngineError> {
        let artifact = self.artifact_path();
        match std::fs::remove_file(&artifact) {
            Ok(()) => {
                tracing::info!("removed {}", artifact.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(&artifact, e)),
        }
    }

    fn read_artifact(&self) -> Result<Option<Vec<u8>>, EngineError> {
        read_optional(&self.artifact_path())
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, EngineError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;

    use tempfile::TempDir;

    fn module_fixture() -> (TempDir, Module) {
        let tmp = TempDir::new().unwrap();
        let modules = tmp.path().join("modules");
        let inner = modules.join("utils").join("utils");
        fs::create_dir_all(inner.join("io")).unwrap();
        fs::write(inner.join("__init__.py"), "").unwrap();
        fs::write(inner.join("io").join("reader.py"), "def read():\n    pass\n").unwrap();
        fs::write(inner.join("README.md"), "not packaged\n").unwrap();
        (tmp, Module::new(modules, ComponentName::from("utils")))
    }

    fn entry_names(bytes: &[u8]) -> Vec<String> {
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    #[test]
    fn archive_contains_only_python_sources_sorted() {
        let (_tmp, module) = module_fixture();
        let bytes = module.build_archive().unwrap();
        let mut names = entry_names(&bytes);
        let listed = names.clone();
        names.sort();
        assert_eq!(names, listed);
        assert_eq!(names, vec!["utils/__init__.py", "utils/io/reader.py"]);
    }

    #[test]
    fn archive_is_byte_identical_across_packagings() {
        let (_tmp, module) = module_fixture();
        module.package().unwrap();
        let first = fs::read(module.artifact_path()).unwrap();

        module.purge().unwrap();
        module.package().unwrap();
        let second = fs::read(module.artifact_path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn archive_entry_content_matches_source() {
        let (_tmp, module) = module_fixture();
        let bytes = module.build_archive().unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut entry = archive.by_name("utils/io/reader.py").unwrap();
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content, "def read():\n    pass\n");
    }

    #[test]
    fn package_fresh_module_builds_without_new_version() {
        let (_tmp, module) = module_fixture();
        let outcome = module.package().unwrap();
        assert_eq!(
            outcome,
            PackageOutcome::Packaged {
                version_number: 0,
                locked: false
            }
        );
        assert!(module.is_packaged().unwrap());
    }

    #[test]
    fn package_twice_is_up_to_date() {
        let (_tmp, module) = module_fixture();
        module.package().unwrap();
        assert_eq!(
            module.package().unwrap(),
            PackageOutcome::UpToDate { version_number: 0 }
        );
    }

    #[test]
    fn package_after_edit_locks_next_version() {
        let (_tmp, module) = module_fixture();
        module.package().unwrap();
        fs::write(module.inner_path().join("__init__.py"), "VERSION = 2\n").unwrap();
        assert!(!module.is_packaged().unwrap());

        let outcome = module.package().unwrap();
        assert_eq!(
            outcome,
            PackageOutcome::Packaged {
                version_number: 1,
                locked: true
            }
        );
        assert_eq!(module.base().local_state().unwrap(), LocalState::Locked);
        assert!(module.is_packaged().unwrap());
    }

    #[test]
    fn artifact_does_not_affect_fingerprint() {
        let (_tmp, module) = module_fixture();
        let before = module.base().fingerprint().unwrap();
        module.package().unwrap();
        assert_eq!(module.base().fingerprint().unwrap(), before);
    }

    #[test]
    fn purge_missing_artifact_is_false() {
        let (_tmp, module) = module_fixture();
        assert!(!module.purge().unwrap());
        module.package().unwrap();
        assert!(module.purge().unwrap());
        assert!(!module.artifact_path().exists());
    }

    #[test]
    fn artifact_uri_uses_requested_version() {
        let (_tmp, module) = module_fixture();
        let target = RemoteTarget {
            bucket: "lake".to_string(),
            namespace: "gantry".to_string(),
        };
        assert_eq!(
            module.artifact_uri(&target, 3),
            "s3://lake/gantry/gantry_module/utils/version=3/utils/utils.zip"
        );
    }
}
