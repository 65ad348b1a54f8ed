//! Atomic file writing via tempfile + rename.
//!
//! Uses [`tempfile::NamedTempFile`] to write to a temporary file in the same
//! directory as the target, syncs it, then atomically renames it over the
//! target. A crash mid-write leaves either the old or the new content, never
//! a mix.

use std::io::Write;
use std::path::Path;

use crate::error::{DiffError, DiffResult};

/// Atomically replace the content of `path` with `content`.
///
/// An existing file keeps its permissions. The parent directory must exist.
pub fn atomic_write(path: &Path, content: &[u8]) -> DiffResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| DiffError::io(parent, e))?;

    tmp.write_all(content).map_err(|e| DiffError::io(path, e))?;
    tmp.flush().map_err(|e| DiffError::io(path, e))?;

    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| DiffError::io(path, e))?;
    }
    tmp.as_file().sync_all().map_err(|e| DiffError::io(path, e))?;

    tmp.persist(path).map_err(|e| DiffError::io(path, e.error))?;
    sync_dir(parent)
}

/// Flush directory entries (new or renamed files) to disk.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> DiffResult<()> {
    std::fs::File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(|e| DiffError::io(dir, e))
}

/// Directory handles cannot be synced here; renames are already durable.
#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> DiffResult<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_and_replaces() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("out.txt");

        atomic_write(&path, b"first").expect("first write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "first");

        atomic_write(&path, b"second").expect("second write");
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "second");

        // No temp files left behind.
        let count = std::fs::read_dir(tmp.path()).expect("list").count();
        assert_eq!(count, 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("script.sh");
        std::fs::write(&path, "echo hi").expect("seed");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");

        atomic_write(&path, b"echo bye").expect("write");
        let mode = std::fs::metadata(&path).expect("meta").permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_missing_parent_fails() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("no/such/dir/file.txt");
        assert!(atomic_write(&path, b"x").is_err());
    }
}
