//! `oa-diffedit`: fuzzy diff-patch engine with versioned backups.
//!
//! Applies search/replace edits to text files even when the search fragment
//! only approximately matches the file (whitespace drift, reindentation,
//! small wording changes). Edits can be described in six common patch
//! dialects, and every write-through edit can be preceded by a numbered,
//! restorable snapshot of the file.
//!
//! # Modules
//!
//! - `edit`: similarity scores, the match cascade, block extraction and the
//!   in-memory patch engine
//! - `versions`: per-file archive of numbered snapshots
//! - `files`: read, patch and restore files on disk
//! - `options`: per-call option structs
//!
//! # Flow
//!
//! ```text
//! raw patch ─→ extract_blocks ─→ apply_blocks ─→ snapshot ─→ atomic_write
//!                                   │
//!                                   └─ locate (exact → … → token)
//! ```
//!
//! The library never installs a `tracing` subscriber; hosts choose where
//! the `debug!`/`info!`/`warn!` events go.

pub mod edit;
pub mod error;
pub mod files;
pub mod options;
pub mod util;
pub mod versions;

pub use edit::blocks::{DiffBlock, Dialect, diff_formats, extract_blocks};
pub use edit::locator::{MatchCandidate, MatchKind, Strategy, locate};
pub use edit::similarity::{SimilarityMethod, similarity};
pub use edit::{EditOutcome, PatchOutcome, apply_blocks, apply_edit, apply_patch};
pub use error::{DiffError, DiffResult};
pub use files::{read_around, restore_file, search_fuzzy, write_direct, write_patch};
pub use options::{EditOptions, SearchOptions, WriteOptions};
