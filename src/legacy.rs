// src/legacy.rs
//! Source type for posts whose `source` string predates the sources table.

use crate::source::{Source, SourceType};

/// Literal source names written by older ingestion code.
const LEGACY_SOURCE_TYPES: &[(&str, SourceType)] = &[
    ("hackernews", SourceType::Rss),
    ("huggingface", SourceType::Discourse),
    ("pytorch", SourceType::Discourse),
    ("github", SourceType::Github),
    ("reddit", SourceType::Reddit),
];

/// Type of the source that produced a post: the live source with that name
/// if one exists, else the legacy table.
pub fn source_type_for(post_source: &str, sources: &[Source]) -> Option<SourceType> {
    if let Some(s) = sources.iter().find(|s| s.name == post_source) {
        return Some(s.source_type);
    }
    let key = post_source.trim().to_ascii_lowercase();
    LEGACY_SOURCE_TYPES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, t)| *t)
}
