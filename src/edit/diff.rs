//! Unified diff of an applied edit, using the `similar` crate.
//!
//! Write-through entry points attach this to their report so the caller can
//! see what actually changed after fuzzy matching.

use serde::Serialize;
use similar::{Algorithm, ChangeTag, TextDiff};

/// Context lines around each hunk.
const CONTEXT_RADIUS: usize = 3;

/// Rendered diff plus line counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EditDiff {
    pub unified: String,
    pub lines_added: usize,
    pub lines_removed: usize,
}

impl EditDiff {
    pub const fn is_empty(&self) -> bool {
        self.lines_added == 0 && self.lines_removed == 0
    }
}

/// Diff `old` against `new`, labelling both sides with `label`.
///
/// Patience keeps hunks aligned on unique lines, which reads better for
/// source code than plain Myers.
pub fn edit_diff(label: &str, old: &str, new: &str) -> EditDiff {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Patience)
        .diff_lines(old, new);

    let mut lines_added = 0;
    let mut lines_removed = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => lines_added += 1,
            ChangeTag::Delete => lines_removed += 1,
            ChangeTag::Equal => {}
        }
    }

    let unified = diff
        .unified_diff()
        .context_radius(CONTEXT_RADIUS)
        .header(&format!("a/{label}"), &format!("b/{label}"))
        .to_string();

    EditDiff {
        unified,
        lines_added,
        lines_removed,
    }
}
