//! Error taxonomy for the code-intelligence engine.
//!
//! Library code returns `Result<T, EngineError>` throughout; `anyhow` is
//! reserved for the CLI boundary (`src/bin/cli.rs`). `NotFound` is
//! deliberately not a variant here — lookups that can legitimately miss
//! return `Option<T>` instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The parser could not produce a usable AST for a file. Recoverable:
    /// the caller skips the file and continues the batch.
    #[error("failed to parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    /// A store operation failed in a way a retry might resolve (lock
    /// contention, a busy WAL checkpoint).
    #[error("store operation failed (transient): {0}")]
    StoreTransient(String),

    /// A store operation failed in a way no retry can fix (corruption,
    /// schema mismatch, disk full).
    #[error("store operation failed (fatal): {0}")]
    StoreFatal(String),

    /// An embedding request failed but may succeed on retry (timeout,
    /// 429/5xx from a remote provider).
    #[error("embedding request failed (transient): {0}")]
    EmbeddingTransient(String),

    /// An embedding request failed permanently (bad credential, 4xx other
    /// than rate limiting, malformed request).
    #[error("embedding request failed (terminal): {0}")]
    EmbeddingTerminal(String),

    /// An in-flight operation was cancelled (shutdown, watcher stop).
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant the engine relies on was violated; indicates
    /// a bug rather than bad input.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    /// Whether retrying the same operation again is plausibly worthwhile.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StoreTransient(_) | Self::EmbeddingTransient(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
