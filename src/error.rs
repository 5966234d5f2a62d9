//! Error types for the lyric pipeline.
//!
//! Source failures are recoverable: the orchestrator logs them and moves on to
//! the next source. Cancellation and contract violations get their own variants
//! so callers can tell them apart from "nothing found".

use std::path::PathBuf;
use thiserror::Error;

/// Failure raised by an individual lyric source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The search was aborted through its cancellation token.
    #[error("operation cancelled")]
    Cancelled,

    /// Transport-level failure (connection, timeout, DNS, body decoding).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an unexpected HTTP status.
    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("malformed provider response: {0}")]
    Json(#[from] serde_json::Error),

    /// Local storage I/O failure with path context.
    #[error("io error at {path:?}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The source has no follow-up lookup step.
    #[error("operation not implemented by this source")]
    NotImplemented,

    /// The source can be searched but never written to.
    #[error("source is read-only")]
    ReadOnly,

    /// A blocking storage task panicked or was cancelled by the runtime.
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl SourceError {
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Self::Io {
            source,
            path: path.into(),
        }
    }

    #[cfg(test)]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Failure raised by the handle, orchestrator and persistence layers.
#[derive(Debug, Error)]
pub enum LyricError {
    #[error("operation cancelled")]
    Cancelled,

    /// A programming error: the caller asked for something the target can
    /// never do (saving to a remote source, deleting a remote result, ...).
    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error(transparent)]
    Source(#[from] SourceError),
}

impl LyricError {
    pub fn contract(message: impl Into<String>) -> Self {
        Self::ContractViolation(message.into())
    }
}

pub type SourceResult<T> = std::result::Result<T, SourceError>;
