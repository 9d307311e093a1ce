//! Error types shared by the engine, persistence and sources.

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::Level;

/// Engine and persistence errors. None of them leave [`LoadState`](crate::LoadState)
/// partially modified.
#[derive(Debug, Error)]
pub enum Error {
    /// Sort input that maps to no metric ordinal.
    #[error("unknown sort key '{0}'")]
    UnknownSortKey(String),

    /// Dashboard command key with no binding.
    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    /// Saved-file selector that is not a number.
    #[error("invalid selector '{0}', expected a saved-file index")]
    InvalidSelector(String),

    /// Saved-file index past the end of the listing.
    #[error("no saved file at index {index} ({available} available)")]
    SelectorOutOfRange { index: usize, available: usize },

    /// A source reporting entities at a different grouping level than the
    /// dashboard it feeds.
    #[error("source reports {found} rows, dashboard shows {expected}")]
    LevelMismatch { found: Level, expected: Level },

    /// A cell that does not parse as its metric's canonical form.
    #[error("invalid value '{0}'")]
    InvalidValue(String),

    /// Malformed CSV content.
    #[error("{}:{line}: {message}", path.display())]
    Csv {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Failures reported by a [`LoadSource`](crate::LoadSource) while collecting a batch.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The source could not reach or read its data.
    #[error("refresh failed: {0}")]
    Refresh(String),

    /// A finite source (e.g. a replayed log) has nothing left to report.
    #[error("source exhausted")]
    Exhausted,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
