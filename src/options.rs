//! Per-call options for matching, writing and searching.
//!
//! Every operation takes its options explicitly; nothing is read from the
//! environment. All option types deserialize from camelCase JSON with
//! defaults for omitted fields, so a host can pass tool arguments straight
//! through.

use serde::{Deserialize, Serialize};

use crate::error::{DiffError, DiffResult};

const fn default_threshold() -> f64 {
    0.8
}

const fn default_true() -> bool {
    true
}

/// Options for applying search/replace edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOptions {
    /// Minimum similarity for fuzzy candidates. Default: 0.8.
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
    /// Enable the multiline, single-line and token stages. Default: true.
    #[serde(default = "default_true")]
    pub allow_partial_matches: bool,
    /// Replace every literal occurrence of the matched text. Default: false.
    #[serde(default)]
    pub replace_all: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: default_threshold(),
            allow_partial_matches: true,
            replace_all: false,
        }
    }
}

impl EditOptions {
    /// Reject thresholds outside `[0, 1]` (including NaN).
    pub fn validate(&self) -> DiffResult<()> {
        if (0.0..=1.0).contains(&self.similarity_threshold) {
            Ok(())
        } else {
            Err(DiffError::InvalidThreshold(self.similarity_threshold))
        }
    }
}

/// Options for edits that are written through to a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteOptions {
    #[serde(flatten)]
    pub edit: EditOptions,
    /// Snapshot the file before writing. Default: true.
    #[serde(default = "default_true")]
    pub create_backup: bool,
    /// Short label stored in the backup's name.
    #[serde(default)]
    pub change_tag: Option<String>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            edit: EditOptions::default(),
            create_backup: true,
            change_tag: None,
        }
    }
}

/// Options for fuzzy search inside a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    /// Minimum similarity for a candidate to be located at all. Default: 0.8.
    #[serde(default = "default_threshold")]
    pub similarity_threshold: f64,
    /// Candidates scoring below this are flagged. Default: 0.7.
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    /// Maximum number of results. Default: 10.
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    /// Lines of context around each hit. Default: 2.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    /// Include matched text for candidates at or above `fuzzy_threshold`.
    #[serde(default)]
    pub return_content: bool,
    /// Include matched text for candidates below `fuzzy_threshold`.
    #[serde(default)]
    pub return_below_threshold: bool,
}

const fn default_fuzzy_threshold() -> f64 {
    0.7
}
const fn default_max_results() -> usize {
    10
}
const fn default_context_lines() -> usize {
    2
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: default_threshold(),
            fuzzy_threshold: default_fuzzy_threshold(),
            max_results: default_max_results(),
            context_lines: default_context_lines(),
            return_content: false,
            return_below_threshold: false,
        }
    }
}
