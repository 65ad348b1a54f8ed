//! Fuzzy search/replace engine.
//!
//! Applies search/replace edits to in-memory text. Each search fragment is
//! handed to the match [`locator`]; the best candidate's *actual text in the
//! document* becomes the substitution anchor, so fuzzy matches replace what
//! is really there rather than the query.
//!
//! # Modules
//!
//! - [`similarity`]: ratio, token-sort and token-set scores
//! - [`locator`]: exact → normalized → multiline → single-line → token cascade
//! - [`blocks`]: six-dialect diff block extraction
//! - [`diff`]: unified diff of an edit for reporting
//!
//! Multi-block patches are applied strictly in order: block *i + 1* sees the
//! output of block *i*. A failing block is recorded as a warning and the
//! remaining blocks still run.

pub mod blocks;
pub mod diff;
pub mod locator;
pub mod similarity;

use serde::Serialize;
use tracing::{debug, warn};

use crate::edit::blocks::{BlockMeta, DiffBlock};
use crate::edit::locator::{MatchCandidate, MatchKind, Strategy};
use crate::error::{DiffError, DiffResult};
use crate::options::EditOptions;

/// Candidates kept in diagnostics.
const TOP_MATCHES: usize = 3;

/// Chars of the search fragment echoed back on failure.
const PREVIEW_CHARS: usize = 100;

const NO_MATCH_TIP: &str =
    "Try smaller diff blocks, lower similarity_threshold, or use custom_safe fences.";

/// What an edit did to the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Empty search fragment: replacement appended to the end.
    Append,
    /// Matched span(s) replaced.
    Replace,
}

/// Why an edit failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoMatchesFound,
}

/// Actionable detail for a failed edit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditFailure {
    pub kind: FailureKind,
    pub tip: &'static str,
    pub search_preview: String,
}

/// Diagnostics for one edit, kept whether it succeeded or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditDiagnostics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
    pub matches_found: usize,
    /// The best few candidates, best first.
    pub top_matches: Vec<MatchCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<MatchKind>,
    pub replaced_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<EditFailure>,
}

impl EditDiagnostics {
    fn empty() -> Self {
        Self {
            operation: None,
            matches_found: 0,
            top_matches: Vec::new(),
            match_kind: None,
            replaced_count: 0,
            failure: None,
        }
    }
}

/// Result of a single search/replace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditOutcome {
    /// The new document, or the untouched one on failure.
    pub text: String,
    pub success: bool,
    pub diagnostics: EditDiagnostics,
}

/// Result of one block inside a multi-block patch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockResult {
    /// 1-based position of the block in the patch.
    pub index: usize,
    pub success: bool,
    pub diagnostics: EditDiagnostics,
    pub meta: BlockMeta,
}

/// Result of applying an ordered sequence of blocks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchOutcome {
    pub text: String,
    pub blocks_processed: usize,
    pub changes_applied: usize,
    pub block_results: Vec<BlockResult>,
    pub warnings: Vec<String>,
}

impl PatchOutcome {
    /// At least one change landed.
    pub const fn is_success(&self) -> bool {
        self.changes_applied > 0
    }

    pub fn successful_blocks(&self) -> usize {
        self.block_results.iter().filter(|b| b.success).count()
    }

    pub fn failed_blocks(&self) -> usize {
        self.block_results.iter().filter(|b| !b.success).count()
    }
}

/// Replace `search` with `replace` in `document`.
///
/// - Empty or whitespace-only `search` appends `replace`, adding a newline
///   first if the document lacks a trailing one.
/// - `exact` and `normalized` always run; the partial stages run when
///   `allow_partial_matches` is set.
/// - With `replace_all`, every literal occurrence of the matched text is
///   replaced; otherwise only the first. A matched span whose text does not
///   occur literally is replaced on its own.
///
/// No match is not an error: the outcome carries `success = false` and the
/// original text.
pub fn apply_edit(
    document: &str,
    search: &str,
    replace: &str,
    options: &EditOptions,
) -> DiffResult<EditOutcome> {
    options.validate()?;
    Ok(edit_once(document, search, replace, options))
}

fn edit_once(document: &str, search: &str, replace: &str, options: &EditOptions) -> EditOutcome {
    let mut diagnostics = EditDiagnostics::empty();

    if search.trim().is_empty() {
        let mut text = String::with_capacity(document.len() + replace.len() + 1);
        text.push_str(document);
        if !document.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(replace);

        diagnostics.operation = Some(Operation::Append);
        diagnostics.replaced_count = 1;
        return EditOutcome {
            text,
            success: true,
            diagnostics,
        };
    }

    let strategies: &[Strategy] = if options.allow_partial_matches {
        &Strategy::ALL
    } else {
        &Strategy::STRICT
    };

    let candidates = locator::locate(search, document, options.similarity_threshold, strategies);
    diagnostics.matches_found = candidates.len();
    diagnostics.top_matches = candidates.iter().take(TOP_MATCHES).cloned().collect();

    let Some(best) = candidates.first() else {
        debug!(threshold = options.similarity_threshold, "no candidates");
        diagnostics.failure = Some(EditFailure {
            kind: FailureKind::NoMatchesFound,
            tip: NO_MATCH_TIP,
            search_preview: preview(search),
        });
        return EditOutcome {
            text: document.to_owned(),
            success: false,
            diagnostics,
        };
    };

    let (text, replaced) = substitute(document, best, replace, options.replace_all);
    debug!(
        strategy = best.strategy.name(),
        similarity = best.similarity,
        replaced,
        "edit applied"
    );

    diagnostics.operation = Some(Operation::Replace);
    diagnostics.match_kind = Some(best.kind);
    diagnostics.replaced_count = replaced;
    EditOutcome {
        text,
        success: true,
        diagnostics,
    }
}

/// Replace the candidate's text; returns the new document and the count.
fn substitute(
    document: &str,
    best: &MatchCandidate,
    replace: &str,
    replace_all: bool,
) -> (String, usize) {
    let anchor = best.text.as_str();

    if !anchor.is_empty() && document.contains(anchor) {
        if replace_all {
            let count = document.matches(anchor).count();
            return (document.replace(anchor, replace), count.max(1));
        }
        return (document.replacen(anchor, replace, 1), 1);
    }

    let mut result = String::with_capacity(document.len() + replace.len());
    result.push_str(&document[..best.start]);
    result.push_str(replace);
    result.push_str(&document[best.end..]);
    (result, 1)
}

fn preview(search: &str) -> String {
    let mut chars = search.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Apply `blocks` in order against the progressively updated document.
pub fn apply_blocks(
    document: &str,
    blocks: &[DiffBlock],
    options: &EditOptions,
) -> DiffResult<PatchOutcome> {
    options.validate()?;

    let mut text = document.to_owned();
    let mut changes_applied = 0;
    let mut warnings = Vec::new();
    let mut block_results = Vec::with_capacity(blocks.len());

    for (i, block) in blocks.iter().enumerate() {
        let index = i + 1;
        let outcome = edit_once(&text, &block.search, &block.replace, options);

        if outcome.success {
            changes_applied += outcome.diagnostics.replaced_count.max(1);
            text = outcome.text;
        } else {
            warn!(block = index, dialect = block.meta.method.name(), "diff block failed");
            warnings.push(format!("Block {index} failed: no_matches_found"));
        }

        block_results.push(BlockResult {
            index,
            success: outcome.success,
            diagnostics: outcome.diagnostics,
            meta: block.meta.clone(),
        });
    }

    Ok(PatchOutcome {
        text,
        blocks_processed: blocks.len(),
        changes_applied,
        block_results,
        warnings,
    })
}

/// Extract blocks from `raw` and apply them to `document`.
///
/// Fails with [`DiffError::InvalidPattern`] when no dialect matches. Block
/// failures never fail the call; inspect [`PatchOutcome::warnings`].
pub fn apply_patch(document: &str, raw: &str, options: &EditOptions) -> DiffResult<PatchOutcome> {
    let blocks = blocks::extract_blocks(raw)?;
    if blocks.is_empty() {
        return Err(DiffError::InvalidPattern {
            supported: blocks::supported_dialects(),
        });
    }
    apply_blocks(document, &blocks, options)
}

/// Apply `raw` with default options, falling back to the untouched document
/// if nothing could be applied.
pub fn apply_patch_or_original(document: &str, raw: &str) -> String {
    match apply_patch(document, raw, &EditOptions::default()) {
        Ok(outcome) if outcome.is_success() => outcome.text,
        Ok(_) => document.to_owned(),
        Err(e) => {
            warn!(error = %e, "patch not applied");
            document.to_owned()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(replace_all: bool) -> EditOptions {
        EditOptions {
            replace_all,
            ..EditOptions::default()
        }
    }

    #[test]
    fn test_exact_replace() {
        let out = apply_edit("The quick brown fox", "quick brown", "slow red", &opts(false))
            .expect("valid options");
        assert!(out.success);
        assert_eq!(out.text, "The slow red fox");
        assert_eq!(out.diagnostics.match_kind, Some(MatchKind::Exact));
        assert_eq!(out.diagnostics.replaced_count, 1);
    }

    #[test]
    fn test_append_adds_newline() {
        let out = apply_edit("line", "", "tail", &opts(false)).expect("valid options");
        assert!(out.success);
        assert_eq!(out.text, "line\ntail");
        assert_eq!(out.diagnostics.operation, Some(Operation::Append));

        let out = apply_edit("line\n", "  \n ", "tail", &opts(false)).expect("valid options");
        assert_eq!(out.text, "line\ntail");
    }

    #[test]
    fn test_first_occurrence_only() {
        let doc = "aaa bbb aaa";
        let out = apply_edit(doc, "aaa", "c", &opts(false)).expect("valid options");
        assert_eq!(out.text, "c bbb aaa");
        assert_eq!(out.text.len(), doc.len() - 3 + 1);
    }

    #[test]
    fn test_replace_all_counts() {
        let out = apply_edit("aaa bbb aaa", "aaa", "ccc", &opts(true)).expect("valid options");
        assert_eq!(out.text, "ccc bbb ccc");
        assert_eq!(out.diagnostics.replaced_count, 2);
    }

    #[test]
    fn test_fuzzy_replaces_actual_text() {
        let doc = "fn main() {\n    println!(\"hi\");\n}\n";
        let search = "fn main() {\n  println!(\"hello\");\n}";
        let out = apply_edit(doc, search, "fn main() {}", &opts(false)).expect("valid options");
        assert!(out.success);
        assert_eq!(out.text, "fn main() {}\n");
        assert_eq!(out.diagnostics.match_kind, Some(MatchKind::FuzzyMultiline));
    }

    #[test]
    fn test_strict_mode_skips_partial_stages() {
        let doc = "fn main() {\n    println!(\"hi\");\n}\n";
        let search = "fn main() {\n  println!(\"hello\");\n}";
        let strict = EditOptions {
            allow_partial_matches: false,
            ..EditOptions::default()
        };
        let out = apply_edit(doc, search, "x", &strict).expect("valid options");
        assert!(!out.success);
        assert_eq!(out.text, doc);
        let failure = out.diagnostics.failure.expect("failure detail");
        assert_eq!(failure.kind, FailureKind::NoMatchesFound);
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(150);
        let p = preview(&long);
        assert_eq!(p.len(), 103);
        assert!(p.ends_with("..."));
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_blocks_sequential() {
        let blocks = blocks::extract_blocks(
            "<<<<<<< SEARCH\none\n=======\ntwo\n>>>>>>> REPLACE\n\
             <<<<<<< SEARCH\ntwo\n=======\nthree\n>>>>>>> REPLACE",
        )
        .expect("patterns compile");
        let out = apply_blocks("one", &blocks, &EditOptions::default()).expect("valid options");
        // The second block only matches because it sees the first block's output.
        assert_eq!(out.text, "three");
        assert_eq!(out.changes_applied, 2);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_failed_block_continues() {
        let raw = "<<<<<<< SEARCH\nmissing entirely\n=======\nx\n>>>>>>> REPLACE\n\
                   <<<<<<< SEARCH\nalpha\n=======\nbeta\n>>>>>>> REPLACE";
        let out = apply_patch("alpha gamma", raw, &EditOptions::default()).expect("blocks found");
        assert_eq!(out.text, "beta gamma");
        assert_eq!(out.blocks_processed, 2);
        assert_eq!(out.changes_applied, 1);
        assert_eq!(out.failed_blocks(), 1);
        assert_eq!(out.successful_blocks(), 1);
        assert_eq!(out.warnings, vec!["Block 1 failed: no_matches_found".to_owned()]);
    }

    #[test]
    fn test_invalid_pattern() {
        let err = apply_patch("doc", "not a diff", &EditOptions::default())
            .expect_err("no dialect matches");
        match err {
            DiffError::InvalidPattern { supported } => assert_eq!(supported.len(), 6),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_apply_patch_or_original() {
        assert_eq!(apply_patch_or_original("keep", "garbage"), "keep");
        let raw = "<<<<<<< SEARCH\nkeep\n=======\nchanged\n>>>>>>> REPLACE";
        assert_eq!(apply_patch_or_original("keep", raw), "changed");
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let bad = EditOptions {
            similarity_threshold: -0.1,
            ..EditOptions::default()
        };
        assert!(matches!(
            apply_edit("a", "a", "b", &bad),
            Err(DiffError::InvalidThreshold(_))
        ));
    }
}
