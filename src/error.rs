// src/error.rs
//! Error kinds shared by adapters, the reconciler and the stores.

use thiserror::Error;

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A post with the same `(source, external_id)` already exists.
    #[error("post {source_name}/{external_id} already exists")]
    UniqueViolation { source_name: String, external_id: String },
    #[error("record {0} not found")]
    NotFound(i64),
    #[error("storage backend: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Errors raised while ingesting one source.
///
/// `Display` output is what ends up after `"error: "` in the source status,
/// so messages are kept short and operator-readable.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed per-source config. Never fatal: callers log it and fall back to defaults.
    #[error("config: {0}")]
    Config(String),
    /// Network failure, timeout or non-2xx response.
    #[error("{0}")]
    Transport(String),
    /// Body could not be parsed as the expected JSON/HTML/feed.
    #[error("{what}: {message}")]
    Format { what: String, message: String },
    /// The source cannot be served by its adapter (bad URL and the like).
    #[error("{0}")]
    InvalidSource(String),
    /// A single item lacks required fields; the item is skipped.
    #[error("invalid item: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    pub fn format(what: impl Into<String>, message: impl ToString) -> Self {
        IngestError::Format {
            what: what.into(),
            message: message.to_string(),
        }
    }
}
