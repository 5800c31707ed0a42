//! Content hasher — per-file SHA-256 digests and component fingerprints.
//!
//! A fingerprint maps every qualifying file of a component to its digest.
//! Keys are relative to the kind directory (`jobs/` or `modules/`), so they
//! start with the component name, and always use `/` separators.
//!
//! Never part of a fingerprint:
//! - the manifest (`.version`) at the component root
//! - OS artifacts (`.DS_Store`, `.empty`) anywhere
//! - `*.tmp` siblings left by atomic writes
//! - a job's rendered `deployment.yml`
//! - a module's package artifact (`<name>.zip`)
//!
//! The upload file set is the same except that it keeps the package artifact.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use gantry_core::layout::{module_artifact_name, JOB_DEPLOYMENT_FILE, MANIFEST_FILE, OS_ARTIFACTS};
use gantry_core::types::{ComponentKind, ComponentName};

use crate::error::{scan_err, EngineError};

/// Relative path → hex SHA-256 digest. Ordered for deterministic output.
pub type Fingerprint = BTreeMap<String, String>;

/// Suffix of temporary siblings written before an atomic rename.
pub const TMP_SUFFIX: &str = ".tmp";

const CHUNK_SIZE: usize = 8192;

/// Which files of a component a scan should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSet {
    /// Files that define the component's content state.
    Fingerprint,
    /// Files shipped to the object store: the fingerprint set plus the
    /// module package artifact.
    Upload,
}

/// SHA-256 of a file's full content, streamed in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<String, EngineError> {
    let mut file = File::open(path).map_err(|e| scan_err(path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer).map_err(|e| scan_err(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Fingerprint key for `path`: relative to `root_dir`, `/`-separated.
pub fn relative_key(root_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root_dir).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Every qualifying regular file under `<root_dir>/<name>`, sorted by path.
pub fn list_files(
    root_dir: &Path,
    kind: ComponentKind,
    name: &ComponentName,
    set: FileSet,
) -> Result<Vec<PathBuf>, EngineError> {
    let component_path = root_dir.join(&name.0);
    if !component_path.is_dir() {
        return Err(EngineError::ComponentNotFound {
            kind,
            name: name.0.clone(),
            path: component_path,
        });
    }

    let artifact = module_artifact_name(name);
    let mut files = Vec::new();
    for entry in WalkDir::new(&component_path)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| walk_err(&component_path, e))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy();
        if is_excluded(&file_name, entry.depth() == 1, kind, &artifact, set) {
            continue;
        }
        files.push(entry.into_path());
    }
    Ok(files)
}

/// Current fingerprint of the component at `<root_dir>/<name>`.
pub fn fingerprint(
    root_dir: &Path,
    kind: ComponentKind,
    name: &ComponentName,
) -> Result<Fingerprint, EngineError> {
    let mut fingerprint = Fingerprint::new();
    for path in list_files(root_dir, kind, name, FileSet::Fingerprint)? {
        let digest = hash_file(&path)?;
        let key = relative_key(root_dir, &path);
        tracing::debug!("hashed {key}: {digest}");
        fingerprint.insert(key, digest);
    }
    Ok(fingerprint)
}

fn is_excluded(
    file_name: &str,
    top_level: bool,
    kind: ComponentKind,
    artifact: &str,
    set: FileSet,
) -> bool {
    if OS_ARTIFACTS.contains(&file_name) || file_name.ends_with(TMP_SUFFIX) {
        return true;
    }
    if !top_level {
        return false;
    }
    match kind {
        _ if file_name == MANIFEST_FILE => true,
        ComponentKind::Job => file_name == JOB_DEPLOYMENT_FILE,
        ComponentKind::Module => file_name == artifact && set == FileSet::Fingerprint,
    }
}

fn walk_err(component_path: &Path, err: walkdir::Error) -> EngineError {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| component_path.to_path_buf());
    match err.io_error().map(std::io::Error::kind) {
        Some(std::io::ErrorKind::NotFound) => EngineError::FileVanished { path },
        _ => EngineError::Walk { path, source: err },
    }
}
