//! Error types for the oa-diffedit crate.

use std::path::PathBuf;

/// Diff-edit error types.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// No dialect matched any block in the raw patch text.
    #[error("no valid diff blocks found; supported formats: {}", supported.join(", "))]
    InvalidPattern { supported: Vec<&'static str> },

    /// No candidate cleared the similarity threshold for a search fragment.
    #[error("no match found in {path} for: {search_preview}")]
    NoMatchFound {
        path: PathBuf,
        search_preview: String,
    },

    /// Every block of a multi-block patch failed against the file.
    #[error("no changes applied to {path}: all {blocks} block(s) failed")]
    NoChangesApplied {
        path: PathBuf,
        blocks: usize,
        warnings: Vec<String>,
    },

    /// Restore or read requested a version absent from the archive.
    #[error("version {requested} not found for {path} (available: {available:?})")]
    VersionNotFound {
        path: PathBuf,
        requested: u32,
        available: Vec<u32>,
    },

    /// File not found at the specified path.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Similarity threshold outside `[0, 1]`.
    #[error("similarity threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    /// A dialect or search pattern failed to compile.
    #[error("pattern error: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error with context.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DiffError {
    /// Wrap an I/O error, promoting `NotFound` to [`DiffError::FileNotFound`].
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound { path }
        } else {
            Self::Io { path, source }
        }
    }
}

/// Convenience result type for oa-diffedit operations.
pub type DiffResult<T> = Result<T, DiffError>;
