//! File-level entry points: patch a file on disk, restore it, search it.
//!
//! Every call re-reads the file; nothing is cached between calls. Writes
//! follow one order: compute the new text in memory, snapshot the current
//! file (when backups are on), then replace it atomically. A crash at any
//! point leaves a recoverable version.
//!
//! Callers must serialize calls per path; concurrent writers can overwrite
//! each other's edits.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::edit::diff::{self, EditDiff};
use crate::edit::locator::{self, MatchKind, Strategy};
use crate::edit::{self as engine, BlockResult};
use crate::error::{DiffError, DiffResult};
use crate::options::{SearchOptions, WriteOptions};
use crate::util::{self, atomic::atomic_write};
use crate::versions::{self, RestoreOutcome, VersionRecord};

/// Tag used for the snapshot taken before a restore.
const PRE_RESTORE_TAG: &str = "pre_restore";

/// How the edit was described.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMethod {
    /// Raw patch text parsed into blocks.
    Patch,
    /// One search/replace pair.
    Direct,
}

/// Result of a successful write-through edit.
#[derive(Debug, Clone, Serialize)]
pub struct WriteReport {
    pub path: PathBuf,
    pub method: WriteMethod,
    pub changes_applied: usize,
    pub blocks_found: usize,
    /// Per-block results; empty for direct edits.
    pub block_results: Vec<BlockResult>,
    pub warnings: Vec<String>,
    /// Snapshot taken before the write, if any.
    pub backup: Option<VersionRecord>,
    /// Size of the file after the edit.
    pub size_bytes: u64,
    pub diff: EditDiff,
}

/// Result of [`restore_file`].
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    #[serde(flatten)]
    pub outcome: RestoreOutcome,
    /// Snapshot of the content that was replaced.
    pub backup: Option<VersionRecord>,
}

/// Lines surrounding the first hit of [`read_around`].
#[derive(Debug, Clone, Serialize)]
pub struct AroundWindow {
    pub path: PathBuf,
    pub strategy: Strategy,
    pub similarity: f64,
    /// 1-based line of the hit.
    pub line_number: usize,
    pub start_line: usize,
    pub line_count: usize,
    pub content: String,
}

/// A literal occurrence found by [`search_fuzzy`].
#[derive(Debug, Clone, Serialize)]
pub struct ExactHit {
    pub line_number: usize,
    pub start: usize,
    pub end: usize,
    pub context: String,
}

/// A fuzzy candidate found by [`search_fuzzy`].
#[derive(Debug, Clone, Serialize)]
pub struct FuzzyHit {
    pub similarity: f64,
    pub line_number: usize,
    pub start: usize,
    pub end: usize,
    pub kind: MatchKind,
    pub context: String,
    pub below_threshold: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Result of [`search_fuzzy`]. Fuzzy hits are only gathered when there is no
/// exact hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport {
    pub path: PathBuf,
    pub exact: Vec<ExactHit>,
    pub fuzzy: Vec<FuzzyHit>,
    pub below_threshold_count: usize,
    pub highest_similarity: f64,
}

impl SearchReport {
    pub fn total_matches(&self) -> usize {
        self.exact.len() + self.fuzzy.len()
    }
}

/// Read `path` as UTF-8 text.
pub fn read_text(path: &Path) -> DiffResult<String> {
    std::fs::read_to_string(path).map_err(|e| DiffError::io(path, e))
}

/// Apply raw patch text to the file at `path`.
///
/// Fails with [`DiffError::InvalidPattern`] if no dialect matches and with
/// [`DiffError::NoChangesApplied`] if every block fails; the file is left
/// untouched and no backup is taken in both cases. Partial success writes
/// and reports the failed blocks as warnings.
pub fn write_patch(path: &Path, raw: &str, options: &WriteOptions) -> DiffResult<WriteReport> {
    let path = util::normalize_path(path)?;
    let original = read_text(&path)?;
    let outcome = engine::apply_patch(&original, raw, &options.edit)?;

    if !outcome.is_success() {
        return Err(DiffError::NoChangesApplied {
            path,
            blocks: outcome.blocks_processed,
            warnings: outcome.warnings,
        });
    }

    let (backup, size_bytes, diff) = commit(&path, &original, &outcome.text, options)?;
    info!(
        file = %path.display(),
        changes = outcome.changes_applied,
        failed = outcome.failed_blocks(),
        "patch written"
    );

    Ok(WriteReport {
        path,
        method: WriteMethod::Patch,
        changes_applied: outcome.changes_applied,
        blocks_found: outcome.blocks_processed,
        block_results: outcome.block_results,
        warnings: outcome.warnings,
        backup,
        size_bytes,
        diff,
    })
}

/// Replace `search` with `replace` in the file at `path`.
pub fn write_direct(
    path: &Path,
    search: &str,
    replace: &str,
    options: &WriteOptions,
) -> DiffResult<WriteReport> {
    let path = util::normalize_path(path)?;
    let original = read_text(&path)?;
    let outcome = engine::apply_edit(&original, search, replace, &options.edit)?;

    if !outcome.success {
        let search_preview = outcome
            .diagnostics
            .failure
            .map(|f| f.search_preview)
            .unwrap_or_default();
        return Err(DiffError::NoMatchFound {
            path,
            search_preview,
        });
    }

    let changes_applied = outcome.diagnostics.replaced_count.max(1);
    let (backup, size_bytes, diff) = commit(&path, &original, &outcome.text, options)?;
    info!(file = %path.display(), changes = changes_applied, "direct edit written");

    Ok(WriteReport {
        path,
        method: WriteMethod::Direct,
        changes_applied,
        blocks_found: 1,
        block_results: Vec::new(),
        warnings: Vec::new(),
        backup,
        size_bytes,
        diff,
    })
}

/// Snapshot then write `new` over `path`. Unchanged text is not rewritten.
fn commit(
    path: &Path,
    original: &str,
    new: &str,
    options: &WriteOptions,
) -> DiffResult<(Option<VersionRecord>, u64, EditDiff)> {
    if new == original {
        return Ok((None, original.len() as u64, EditDiff::default()));
    }

    let backup = if options.create_backup {
        Some(versions::snapshot(path, options.change_tag.as_deref())?)
    } else {
        None
    };

    atomic_write(path, new.as_bytes())?;

    let label = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok((backup, new.len() as u64, diff::edit_diff(&label, original, new)))
}

/// Restore archived `version` of `path`, optionally snapshotting the
/// current content first under the `pre_restore` tag.
pub fn restore_file(path: &Path, version: u32, create_backup: bool) -> DiffResult<RestoreReport> {
    let path = util::normalize_path(path)?;
    // Fail before taking a snapshot if the version is absent.
    versions::find_version(&path, version)?;

    let backup = if create_backup && path.exists() {
        Some(versions::snapshot(&path, Some(PRE_RESTORE_TAG))?)
    } else {
        None
    };

    let outcome = versions::restore(&path, version)?;
    Ok(RestoreReport { outcome, backup })
}

/// Find `search` in the file and return the lines around the first hit.
///
/// Tries a literal search first, then the fuzzy stages.
pub fn read_around(
    path: &Path,
    search: &str,
    threshold: f64,
    context_lines: usize,
) -> DiffResult<AroundWindow> {
    let path = util::normalize_path(path)?;
    let content = read_text(&path)?;

    let (pos, strategy, similarity) = match content.find(search).filter(|_| !search.is_empty()) {
        Some(pos) => (pos, Strategy::Exact, 1.0),
        None => {
            let candidates = locator::locate(search, &content, threshold, &Strategy::FUZZY);
            let Some(best) = candidates.into_iter().next() else {
                return Err(DiffError::NoMatchFound {
                    path,
                    search_preview: search.chars().take(100).collect(),
                });
            };
            (best.start, best.strategy, best.similarity)
        }
    };

    let lines: Vec<&str> = content.split('\n').collect();
    let line_number = line_of(&content, pos);
    let start_line = line_number.saturating_sub(context_lines).max(1);
    let end_line = line_number.saturating_add(context_lines).min(lines.len());

    Ok(AroundWindow {
        strategy,
        similarity,
        line_number,
        start_line,
        line_count: end_line + 1 - start_line,
        content: lines[start_line - 1..end_line].join("\n"),
        path,
    })
}

/// List literal occurrences of `search` in the file; if there are none,
/// list fuzzy candidates instead, flagging those under `fuzzy_threshold`.
pub fn search_fuzzy(path: &Path, search: &str, options: &SearchOptions) -> DiffResult<SearchReport> {
    let path = util::normalize_path(path)?;
    let content = read_text(&path)?;
    let lines: Vec<&str> = content.split('\n').collect();

    let mut report = SearchReport {
        path,
        exact: Vec::new(),
        fuzzy: Vec::new(),
        below_threshold_count: 0,
        highest_similarity: 0.0,
    };
    if search.is_empty() {
        return Ok(report);
    }

    let mut from = 0;
    while report.exact.len() < options.max_results {
        let Some(offset) = content[from..].find(search) else {
            break;
        };
        let start = from + offset;
        let line_number = line_of(&content, start);
        report.exact.push(ExactHit {
            line_number,
            start,
            end: start + search.len(),
            context: context_around(&lines, line_number, options.context_lines),
        });
        // Step one char so overlapping occurrences are found too.
        from = start + content[start..].chars().next().map_or(1, char::len_utf8);
    }

    if !report.exact.is_empty() {
        report.highest_similarity = 1.0;
        return Ok(report);
    }

    let candidates = locator::locate(search, &content, options.similarity_threshold, &Strategy::FUZZY);
    for candidate in candidates.into_iter().take(options.max_results) {
        let line_number = line_of(&content, candidate.start);
        let below_threshold = candidate.similarity < options.fuzzy_threshold;
        let show = if below_threshold {
            options.return_below_threshold
        } else {
            options.return_content
        };
        if below_threshold {
            report.below_threshold_count += 1;
        }

        report.fuzzy.push(FuzzyHit {
            similarity: (candidate.similarity * 1000.0).round() / 1000.0,
            line_number,
            start: candidate.start,
            end: candidate.end,
            kind: candidate.kind,
            context: context_around(&lines, line_number, options.context_lines),
            below_threshold,
            content: show.then_some(candidate.text),
        });
    }
    report.highest_similarity = report.fuzzy.first().map_or(0.0, |h| h.similarity);

    Ok(report)
}

/// 1-based line number of byte offset `pos`.
fn line_of(content: &str, pos: usize) -> usize {
    content[..pos].matches('\n').count() + 1
}

fn context_around(lines: &[&str], line_number: usize, radius: usize) -> String {
    let start = line_number.saturating_sub(radius.saturating_add(1));
    let end = line_number.saturating_add(radius).min(lines.len());
    lines[start..end].join("\n")
}
