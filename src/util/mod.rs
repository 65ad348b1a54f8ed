//! Filesystem helpers shared by the write-through entry points.

pub mod atomic;

use std::path::{Path, PathBuf};

use crate::error::{DiffError, DiffResult};

/// Resolve `path` to an absolute path without touching the filesystem.
///
/// Relative paths are joined onto the current directory and `.`/`..`
/// components are folded lexically, so a file and its archive directory are
/// always named the same way whichever form the caller used.
pub fn normalize_path(path: &Path) -> DiffResult<PathBuf> {
    if path.as_os_str().is_empty() || path.as_os_str().to_string_lossy().contains('\0') {
        return Err(DiffError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid path"),
        ));
    }

    let absolute = std::path::absolute(path).map_err(|e| DiffError::io(path, e))?;

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}
