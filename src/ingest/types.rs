// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::IngestError;
use crate::ingest::http::HttpFetcher;
use crate::post::PostAttributes;

/// Concrete adapter chosen for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterKind {
    GitHub,
    GitHubTrendingApi,
    GitHubTrendingScrape,
    Rss,
    HackerNews,
    Reddit,
    Discourse,
}

impl AdapterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdapterKind::GitHub => "github",
            AdapterKind::GitHubTrendingApi => "github_trending_api",
            AdapterKind::GitHubTrendingScrape => "github_trending_scrape",
            AdapterKind::Rss => "rss",
            AdapterKind::HackerNews => "hackernews",
            AdapterKind::Reddit => "reddit",
            AdapterKind::Discourse => "discourse",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One upstream item ready for reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct PostCandidate {
    pub external_id: String,
    pub attrs: PostAttributes,
}

/// Fetch/parse/score contract for one upstream.
///
/// `fetch_items` failures are source-level; `to_post_attributes` failures
/// only drop the item.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    type Item: Send + Sync;

    fn kind(&self) -> AdapterKind;

    async fn fetch_items(
        &self,
        http: &dyn HttpFetcher,
        now: DateTime<Utc>,
    ) -> Result<Vec<Self::Item>, IngestError>;

    /// External id plus normalized attributes. `priority_score` is filled in from [`Self::score`].
    fn to_post_attributes(&self, item: &Self::Item)
        -> Result<(String, PostAttributes), IngestError>;

    fn score(&self, item: &Self::Item, now: DateTime<Utc>) -> f64;
}

/// Object-safe face of every [`SourceAdapter`], used by the runner.
#[async_trait]
pub trait Ingest: Send + Sync {
    fn kind(&self) -> AdapterKind;

    async fn collect(
        &self,
        http: &dyn HttpFetcher,
        now: DateTime<Utc>,
    ) -> Result<Vec<PostCandidate>, IngestError>;
}

#[async_trait]
impl<A> Ingest for A
where
    A: SourceAdapter,
{
    fn kind(&self) -> AdapterKind {
        SourceAdapter::kind(self)
    }

    async fn collect(
        &self,
        http: &dyn HttpFetcher,
        now: DateTime<Utc>,
    ) -> Result<Vec<PostCandidate>, IngestError> {
        let items = self.fetch_items(http, now).await?;
        let mut out = Vec::with_capacity(items.len());
        for item in &items {
            let score = self.score(item, now);
            let converted = self.to_post_attributes(item).and_then(|(external_id, mut attrs)| {
                attrs.priority_score = score;
                attrs.validate()?;
                Ok(PostCandidate { external_id, attrs })
            });
            match converted {
                Ok(c) if c.external_id.trim().is_empty() => {
                    tracing::warn!(target: "ingest", adapter = %SourceAdapter::kind(self), "item without external id skipped");
                }
                Ok(c) => out.push(c),
                Err(e) => {
                    tracing::warn!(target: "ingest", adapter = %SourceAdapter::kind(self), error = %e, "item skipped");
                    metrics::counter!("ingest_items_skipped_total").increment(1);
                }
            }
        }
        Ok(out)
    }
}
