// src/ingest/providers/reddit.rs
//! Subreddit listings via the public `.json` endpoints.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::IngestError;
use crate::ingest::config::{adapter_config, lenient, string_list};
use crate::ingest::http::{fetch_json, HttpFetcher, HttpRequest};
use crate::ingest::scoring::{hours_since, matches_keywords};
use crate::ingest::types::{AdapterKind, SourceAdapter};
use crate::ingest::{clean_text, decode_items, truncate, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
use crate::post::PostAttributes;
use crate::source::Source;

const DEFAULT_SORT: &str = "hot";
const DEFAULT_LIMIT: usize = 25;
const SORTS: &[&str] = &["hot", "new", "top", "rising", "controversial"];

static SUBREDDIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"reddit\.com/r/([^/?#]+)").expect("subreddit regex"));

/// Subreddit name from a listing URL.
pub fn parse_subreddit(url: &str) -> Option<String> {
    SUBREDDIT_RE
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditConfig {
    pub sort: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub limit: Option<usize>,
    #[serde(deserialize_with = "string_list")]
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    #[serde(default)]
    data: Value,
}

/// `data` of one `t3` listing child.
#[derive(Debug, Clone, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub permalink: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub selftext: String,
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub is_video: bool,
    #[serde(default)]
    pub stickied: bool,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub num_comments: i64,
    #[serde(default)]
    pub created_utc: Option<f64>,
    #[serde(default)]
    pub link_flair_text: Option<String>,
}

impl RedditPost {
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.created_utc
            .and_then(|t| DateTime::from_timestamp(t as i64, 0))
    }

    fn external_url(&self) -> Option<&str> {
        if self.is_self {
            return None;
        }
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    fn discussion_url(&self) -> String {
        format!("https://www.reddit.com{}", self.permalink)
    }

    /// text-post / video / image / github, from the post shape and URL.
    pub fn content_tag(&self) -> Option<&'static str> {
        if self.is_self {
            return Some("text-post");
        }
        let url = self.external_url()?.to_ascii_lowercase();
        let path = url.split('?').next().unwrap_or_default();
        if self.is_video || ["youtube.com", "youtu.be", "v.redd.it", "vimeo.com"].iter().any(|h| url.contains(h)) {
            Some("video")
        } else if [".jpg", ".jpeg", ".png", ".gif", ".webp"].iter().any(|e| path.ends_with(e))
            || url.contains("i.redd.it")
            || url.contains("imgur.com")
        {
            Some("image")
        } else if url.contains("github.com") {
            Some("github")
        } else {
            None
        }
    }
}

pub struct RedditAdapter {
    subreddit: String,
    cfg: RedditConfig,
}

impl RedditAdapter {
    pub fn from_source(source: &Source) -> Result<Self, IngestError> {
        let subreddit = parse_subreddit(source.url_str())
            .ok_or_else(|| IngestError::InvalidSource("invalid subreddit URL".into()))?;
        Ok(Self {
            subreddit,
            cfg: adapter_config(source),
        })
    }

    pub fn subreddit(&self) -> &str {
        &self.subreddit
    }

    pub fn listing_url(&self) -> String {
        let sort = self
            .cfg
            .sort
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| SORTS.contains(&s.as_str()))
            .unwrap_or_else(|| DEFAULT_SORT.to_string());
        let limit = self.cfg.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 100);
        format!(
            "https://www.reddit.com/r/{}/{sort}.json?limit={limit}",
            self.subreddit
        )
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    type Item = RedditPost;

    fn kind(&self) -> AdapterKind {
        AdapterKind::Reddit
    }

    async fn fetch_items(
        &self,
        http: &dyn HttpFetcher,
        _now: DateTime<Utc>,
    ) -> Result<Vec<RedditPost>, IngestError> {
        let req = HttpRequest::get(self.listing_url()).header("Accept", "application/json");
        let listing: Listing = fetch_json(http, &req, "Reddit listing").await?;
        let posts: Vec<RedditPost> = decode_items(
            listing.data.children.into_iter().map(|c| c.data).collect(),
            "Reddit post",
        );
        Ok(posts
            .into_iter()
            .filter(|p| !p.stickied)
            .filter(|p| p.external_url().is_some() || !p.selftext.trim().is_empty())
            .filter(|p| matches_keywords(&self.cfg.keywords, &[&p.title, &p.selftext]))
            .collect())
    }

    fn to_post_attributes(&self, item: &RedditPost) -> Result<(String, PostAttributes), IngestError> {
        let mut tags = vec![format!("r/{}", self.subreddit)];
        if let Some(flair) = item.link_flair_text.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
            tags.push(flair.to_string());
        }
        if let Some(tag) = item.content_tag() {
            tags.push(tag.to_string());
        }

        let summary = if item.selftext.trim().is_empty() {
            item.external_url().unwrap_or_default().to_string()
        } else {
            clean_text(&item.selftext)
        };

        let attrs = PostAttributes {
            title: truncate(&clean_text(&item.title), TITLE_MAX_CHARS),
            url: item
                .external_url()
                .map(str::to_string)
                .unwrap_or_else(|| item.discussion_url()),
            author: item.author.clone().unwrap_or_default(),
            posted_at: item.posted_at(),
            summary: truncate(&summary, SUMMARY_MAX_CHARS),
            tags,
            priority_score: 0.0,
        };
        Ok((item.id.clone(), attrs))
    }

    fn score(&self, item: &RedditPost, now: DateTime<Utc>) -> f64 {
        let engagement = 0.1 * item.score as f64 + 0.5 * item.num_comments as f64;
        let hours_old = item.posted_at().map(|t| hours_since(t, now)).unwrap_or(0.0);
        (engagement / (1.0 + hours_old / 24.0)).max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subreddit_extraction() {
        assert_eq!(parse_subreddit("https://www.reddit.com/r/rust/"), Some("rust".into()));
        assert_eq!(parse_subreddit("https://old.reddit.com/r/MachineLearning/top?t=day"), Some("MachineLearning".into()));
        assert_eq!(parse_subreddit("https://www.reddit.com/user/someone"), None);
        assert_eq!(parse_subreddit(""), None);
    }

    fn post(is_self: bool, url: &str) -> RedditPost {
        RedditPost {
            id: "abc".into(),
            title: "t".into(),
            author: None,
            permalink: "/r/rust/comments/abc/t/".into(),
            url: Some(url.into()),
            selftext: String::new(),
            is_self,
            is_video: false,
            stickied: false,
            score: 0,
            num_comments: 0,
            created_utc: None,
            link_flair_text: None,
        }
    }

    #[test]
    fn content_tags() {
        assert_eq!(post(true, "").content_tag(), Some("text-post"));
        assert_eq!(post(false, "https://youtu.be/x").content_tag(), Some("video"));
        assert_eq!(post(false, "https://i.redd.it/a.png").content_tag(), Some("image"));
        assert_eq!(post(false, "https://github.com/a/b").content_tag(), Some("github"));
        assert_eq!(post(false, "https://blog.example.com").content_tag(), None);
    }
}
