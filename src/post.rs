// src/post.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IngestError;

/// Triage state of a post. Only `Unread` is ever set by ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Unread,
    Read,
    Ignored,
    Responded,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Unread => "unread",
            PostStatus::Read => "read",
            PostStatus::Ignored => "ignored",
            PostStatus::Responded => "responded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "unread" => Some(PostStatus::Unread),
            "read" => Some(PostStatus::Read),
            "ignored" => Some(PostStatus::Ignored),
            "responded" => Some(PostStatus::Responded),
            _ => None,
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized attributes produced by an adapter for one upstream item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostAttributes {
    pub title: String,
    pub url: String,
    pub author: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub tags: Vec<String>,
    pub priority_score: f64,
}

impl PostAttributes {
    /// Required-field check run before reconciliation.
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.title.trim().is_empty() {
            return Err(IngestError::Validation("missing title".into()));
        }
        if self.url.trim().is_empty() {
            return Err(IngestError::Validation("missing url".into()));
        }
        if !self.priority_score.is_finite() {
            return Err(IngestError::Validation("non-finite priority score".into()));
        }
        Ok(())
    }
}

/// A stored post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub source: String,
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub author: String,
    pub posted_at: Option<DateTime<Utc>>,
    pub summary: String,
    pub tags: Vec<String>,
    pub status: PostStatus,
    pub priority_score: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    pub fn attributes(&self) -> PostAttributes {
        PostAttributes {
            title: self.title.clone(),
            url: self.url.clone(),
            author: self.author.clone(),
            posted_at: self.posted_at,
            summary: self.summary.clone(),
            tags: self.tags.clone(),
            priority_score: self.priority_score,
        }
    }

    pub(crate) fn apply(&mut self, attrs: &PostAttributes, at: DateTime<Utc>) {
        self.title = attrs.title.clone();
        self.url = attrs.url.clone();
        self.author = attrs.author.clone();
        self.posted_at = attrs.posted_at;
        self.summary = attrs.summary.clone();
        self.tags = attrs.tags.clone();
        self.priority_score = attrs.priority_score;
        self.updated_at = at;
    }
}

/// Insert payload for [`crate::store::PostStore::create`].
#[derive(Debug, Clone)]
pub struct NewPost<'a> {
    pub source: &'a str,
    pub external_id: &'a str,
    pub attrs: &'a PostAttributes,
    pub status: PostStatus,
    pub at: DateTime<Utc>,
}
