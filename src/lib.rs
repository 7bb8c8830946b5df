// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod ingest;
pub mod legacy;
pub mod metrics;
pub mod post;
pub mod reconcile;
pub mod source;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::error::{IngestError, StoreError};
pub use crate::ingest::{IngestionRunner, RunResult};
pub use crate::post::{Post, PostAttributes, PostStatus};
pub use crate::reconcile::{PostReconciler, ReconcileAction, Reconciled};
pub use crate::source::{NewSource, Source, SourceStatus, SourceType};
