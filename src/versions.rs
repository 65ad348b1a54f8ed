//! Versioned backups of individual files.
//!
//! Each file keeps its history in a hidden sibling directory,
//! `.{file_name}_versions/`, holding one byte-identical copy per version:
//!
//! ```text
//! src/app.py
//! src/.app.py_versions/v1_1760000000.backup
//! src/.app.py_versions/v2_1760000420.pre_restore.backup
//! ```
//!
//! The name encodes the version number, the creation time in epoch seconds
//! and an optional sanitized tag. Version numbers start at 1 and are assigned
//! as `max(existing) + 1`, so they are never reused, even after a restore.
//! Archives are never rewritten or deleted here.
//!
//! There is no locking: two concurrent snapshots of the same file can compute
//! the same number. Callers must serialize access per path.

use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{DiffError, DiffResult};
use crate::util::atomic::{atomic_write, sync_dir};

const ARCHIVE_NAME_PATTERN: &str = r"^v(\d+)_(\d+)(?:\.([\w-]+))?\.backup$";

/// Metadata of one archived version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
    /// Location of the archived copy.
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_tag: Option<String>,
}

/// The live file, listed ahead of its archived versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentFile {
    pub modified_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub path: PathBuf,
}

/// One row of [`list_versions`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VersionEntry {
    Current(CurrentFile),
    Archived(VersionRecord),
}

impl VersionEntry {
    /// `None` for the live file.
    pub const fn version_number(&self) -> Option<u32> {
        match self {
            Self::Current(_) => None,
            Self::Archived(record) => Some(record.version),
        }
    }
}

/// Confirmation of a successful restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    pub path: PathBuf,
    pub restored_version: u32,
}

/// Hidden archive directory for `file`.
pub fn archive_dir(file: &Path) -> PathBuf {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parent = file.parent().unwrap_or_else(|| Path::new(""));
    parent.join(format!(".{name}_versions"))
}

/// Replace every char outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_tag(tag: &str) -> String {
    tag.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Archived versions of `file`, newest first. Missing archive → empty.
pub fn archived_versions(file: &Path) -> DiffResult<Vec<VersionRecord>> {
    let dir = archive_dir(file);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let re = Regex::new(ARCHIVE_NAME_PATTERN)?;
    let mut records = Vec::new();

    for entry in fs::read_dir(&dir).map_err(|e| DiffError::io(&dir, e))? {
        let entry = entry.map_err(|e| DiffError::io(&dir, e))?;
        let path = entry.path();
        let name = entry.file_name();
        let Some(caps) = name.to_str().and_then(|n| re.captures(n)) else {
            continue;
        };
        let (Ok(version), Ok(epoch)) = (caps[1].parse::<u32>(), caps[2].parse::<i64>()) else {
            debug!(path = %path.display(), "skipping archive with unparsable name");
            continue;
        };

        let meta = entry.metadata().map_err(|e| DiffError::io(&path, e))?;
        if !meta.is_file() {
            continue;
        }

        records.push(VersionRecord {
            version,
            created_at: epoch_to_utc(epoch),
            size_bytes: meta.len(),
            change_tag: caps.get(3).map(|m| m.as_str().to_owned()),
            path,
        });
    }

    records.sort_by(|a, b| b.version.cmp(&a.version));
    Ok(records)
}

/// Number the next snapshot of `file` will get.
pub fn next_version(file: &Path) -> DiffResult<u32> {
    let records = archived_versions(file)?;
    Ok(records
        .iter()
        .map(|r| r.version)
        .max()
        .map_or(1, |max| max.saturating_add(1)))
}

/// Copy the current bytes of `file` into a new numbered archive.
///
/// The copy keeps the source's modification time and is synced to disk
/// before this returns, so a write that follows can always be rolled back.
pub fn snapshot(file: &Path, change_tag: Option<&str>) -> DiffResult<VersionRecord> {
    let source_meta = fs::metadata(file).map_err(|e| DiffError::io(file, e))?;
    let dir = archive_dir(file);
    fs::create_dir_all(&dir).map_err(|e| DiffError::io(&dir, e))?;

    let version = next_version(file)?;
    let epoch = Utc::now().timestamp();
    let tag = change_tag
        .filter(|t| !t.is_empty())
        .map(sanitize_tag);
    let name = match &tag {
        Some(tag) => format!("v{version}_{epoch}.{tag}.backup"),
        None => format!("v{version}_{epoch}.backup"),
    };
    let path = dir.join(name);

    fs::copy(file, &path).map_err(|e| DiffError::io(&path, e))?;
    let copy = File::options()
        .write(true)
        .open(&path)
        .map_err(|e| DiffError::io(&path, e))?;
    if let Ok(modified) = source_meta.modified() {
        copy.set_times(FileTimes::new().set_modified(modified))
            .map_err(|e| DiffError::io(&path, e))?;
    }
    copy.sync_all().map_err(|e| DiffError::io(&path, e))?;
    sync_dir(&dir)?;

    info!(file = %file.display(), version, backup = %path.display(), "created backup");

    Ok(VersionRecord {
        version,
        created_at: epoch_to_utc(epoch),
        size_bytes: source_meta.len(),
        path,
        change_tag: tag,
    })
}

/// The live file (if present) followed by archived versions, newest first.
pub fn list_versions(file: &Path) -> DiffResult<Vec<VersionEntry>> {
    let mut entries = Vec::new();

    match fs::metadata(file) {
        Ok(meta) => entries.push(VersionEntry::Current(CurrentFile {
            modified_at: meta.modified().map(DateTime::<Utc>::from).unwrap_or_default(),
            size_bytes: meta.len(),
            path: file.to_path_buf(),
        })),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(DiffError::io(file, e)),
    }

    entries.extend(archived_versions(file)?.into_iter().map(VersionEntry::Archived));
    Ok(entries)
}

/// Look up archived version `version` of `file`.
pub fn find_version(file: &Path, version: u32) -> DiffResult<VersionRecord> {
    let records = archived_versions(file)?;
    let mut available: Vec<u32> = records.iter().map(|r| r.version).collect();
    available.sort_unstable();

    records
        .into_iter()
        .find(|r| r.version == version)
        .ok_or_else(|| DiffError::VersionNotFound {
            path: file.to_path_buf(),
            requested: version,
            available,
        })
}

/// Text of archived version `version` of `file`.
pub fn read_version(file: &Path, version: u32) -> DiffResult<String> {
    let record = find_version(file, version)?;
    fs::read_to_string(&record.path).map_err(|e| DiffError::io(&record.path, e))
}

/// Overwrite `file` with archived version `version`.
///
/// Nothing is renumbered or deleted; the next [`snapshot`] continues from
/// the highest existing number.
pub fn restore(file: &Path, version: u32) -> DiffResult<RestoreOutcome> {
    let record = find_version(file, version)?;
    let bytes = fs::read(&record.path).map_err(|e| DiffError::io(&record.path, e))?;
    atomic_write(file, &bytes)?;

    if let Ok(modified) = fs::metadata(&record.path).and_then(|m| m.modified()) {
        let live = File::options()
            .write(true)
            .open(file)
            .map_err(|e| DiffError::io(file, e))?;
        live.set_times(FileTimes::new().set_modified(modified))
            .map_err(|e| DiffError::io(file, e))?;
    }

    info!(file = %file.display(), version, "restored version");
    Ok(RestoreOutcome {
        path: file.to_path_buf(),
        restored_version: version,
    })
}

fn epoch_to_utc(epoch: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(epoch, 0).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_dir_is_hidden_sibling() {
        let dir = archive_dir(Path::new("/work/src/app.py"));
        assert_eq!(dir, PathBuf::from("/work/src/.app.py_versions"));
    }

    #[test]
    fn test_sanitize_tag() {
        assert_eq!(sanitize_tag("fix bug #12"), "fix_bug__12");
        assert_eq!(sanitize_tag("pre_restore"), "pre_restore");
        assert_eq!(sanitize_tag("a-b.c"), "a-b_c");
        assert_eq!(sanitize_tag("naïve"), "na_ve");
    }

    #[test]
    fn test_archive_name_pattern() {
        let re = Regex::new(ARCHIVE_NAME_PATTERN).expect("pattern compiles");
        let caps = re.captures("v12_1760000000.pre_restore.backup").expect("matches");
        assert_eq!(&caps[1], "12");
        assert_eq!(&caps[3], "pre_restore");
        assert!(re.captures("v3_1760000000.backup").is_some());
        assert!(re.captures("notes.txt").is_none());
        assert!(re.captures("v1_x.backup").is_none());
    }

    #[test]
    fn test_missing_archive_is_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let file = tmp.path().join("absent.txt");
        assert!(archived_versions(&file).expect("listing").is_empty());
        assert_eq!(next_version(&file).expect("next"), 1);
        assert!(list_versions(&file).expect("listing").is_empty());
    }
}
