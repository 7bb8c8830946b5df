// src/store/mod.rs
//! Persistence seams used by the reconciler and the runner.

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::post::{NewPost, Post, PostAttributes, PostStatus};
use crate::source::{NewSource, Source, SourceStatus};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Post persistence. `(source, external_id)` is unique.
pub trait PostStore: Send + Sync {
    fn find_by_source_and_external_id(
        &self,
        source: &str,
        external_id: &str,
    ) -> Result<Option<Post>, StoreError>;

    /// Insert a post. Must return [`StoreError::UniqueViolation`] when the key already exists.
    fn create(&self, new: NewPost<'_>) -> Result<Post, StoreError>;

    /// Overwrite all attributes (never the status) and bump `updated_at` to `at`.
    fn update(&self, id: i64, attrs: &PostAttributes, at: DateTime<Utc>)
        -> Result<Post, StoreError>;

    /// User triage action (mark read/ignored/responded).
    fn set_status(&self, id: i64, status: PostStatus) -> Result<(), StoreError>;

    fn get(&self, id: i64) -> Result<Option<Post>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;

    fn list_by_source(&self, source: &str) -> Result<Vec<Post>, StoreError>;
}

/// Source persistence.
pub trait SourceStore: Send + Sync {
    fn list_sources(&self) -> Result<Vec<Source>, StoreError>;

    fn get_source(&self, id: i64) -> Result<Option<Source>, StoreError>;

    /// Insert by name, or refresh type/url/config/flags of the existing row.
    fn upsert_source(&self, new: &NewSource) -> Result<Source, StoreError>;

    /// Record the run status; `fetched_at` is only written when `Some`.
    fn record_status(
        &self,
        id: i64,
        status: &SourceStatus,
        fetched_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;
}
