//! Atomic file replacement: write a `.tmp` sibling, then rename over the
//! target (atomic on POSIX).

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::hasher::TMP_SUFFIX;

/// `<path>.tmp`, next to `path`.
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(OsString::new);
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

/// Replace `path` with `bytes`, creating parent directories as needed.
///
/// Readers see either the old content or the new content, never a partial
/// write. The temporary file is removed if the rename fails.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, bytes)?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}
