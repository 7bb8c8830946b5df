// src/ingest/providers/hacker_news.rs
//! Hacker News through the public Firebase API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashSet;

use crate::error::IngestError;
use crate::ingest::config::{adapter_config, lenient, string_list};
use crate::ingest::http::{fetch_json, HttpFetcher, HttpRequest};
use crate::ingest::scoring::{contains_any, dev_keyword_matches, matches_keywords, recency_bonus};
use crate::ingest::types::{AdapterKind, SourceAdapter};
use crate::ingest::{clean_text, truncate, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
use crate::post::PostAttributes;
use crate::source::Source;

const API_BASE: &str = "https://hacker-news.firebaseio.com/v0";
const DEFAULT_MAX_ITEMS: usize = 30;
const STORY_TYPES: &[&str] = &["top", "new", "best", "ask", "show"];

/// Hosts that make an `rss` source a Hacker News source.
pub const HN_HOSTS: &[&str] = &[
    "news.ycombinator.com",
    "hacker-news.firebaseio.com",
    "hnrss.org",
];

pub fn is_hacker_news(source: &Source) -> bool {
    let url = source.url_str().to_ascii_lowercase();
    HN_HOSTS.iter().any(|h| url.contains(h)) || source.name.trim().eq_ignore_ascii_case("hackernews")
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HackerNewsConfig {
    #[serde(deserialize_with = "string_list")]
    pub story_types: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub max_items: Option<usize>,
    #[serde(deserialize_with = "lenient")]
    pub min_score: Option<i64>,
    #[serde(deserialize_with = "string_list")]
    pub keywords: Vec<String>,
}

/// Raw `item/{id}.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct HnItem {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub descendants: i64,
    #[serde(default)]
    pub dead: bool,
    #[serde(default)]
    pub deleted: bool,
}

/// A story plus the list it was first seen in.
#[derive(Debug, Clone)]
pub struct HnStory {
    pub item: HnItem,
    pub list: &'static str,
}

impl HnStory {
    fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.item.time.and_then(|t| DateTime::from_timestamp(t, 0))
    }

    fn text(&self) -> String {
        format!(
            "{} {}",
            self.item.title.as_deref().unwrap_or_default(),
            clean_text(self.item.text.as_deref().unwrap_or_default())
        )
    }
}

pub struct HackerNewsAdapter {
    cfg: HackerNewsConfig,
    lists: Vec<&'static str>,
}

impl HackerNewsAdapter {
    pub fn from_source(source: &Source) -> Self {
        Self::with_config(adapter_config(source))
    }

    pub fn with_config(cfg: HackerNewsConfig) -> Self {
        let mut lists = Vec::new();
        for t in &cfg.story_types {
            let t = t.trim().to_ascii_lowercase();
            match STORY_TYPES.iter().find(|s| **s == t) {
                Some(s) if !lists.contains(s) => lists.push(*s),
                Some(_) => {}
                None => tracing::warn!(target: "ingest", story_type = %t, "unknown HN story type ignored"),
            }
        }
        if lists.is_empty() {
            lists.push("top");
        }
        Self { cfg, lists }
    }

    fn max_items(&self) -> usize {
        self.cfg.max_items.unwrap_or(DEFAULT_MAX_ITEMS)
    }

    async fn fetch_item(&self, http: &dyn HttpFetcher, id: u64) -> Option<HnItem> {
        let req = HttpRequest::get(format!("{API_BASE}/item/{id}.json"));
        match fetch_json::<Option<HnItem>>(http, &req, "HN item").await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(target: "ingest", id, error = %e, "HN item skipped");
                None
            }
        }
    }

    fn keep(&self, item: &HnItem) -> bool {
        if item.dead || item.deleted || item.kind != "story" {
            return false;
        }
        if item.score < self.cfg.min_score.unwrap_or(0) {
            return false;
        }
        let title = item.title.as_deref().unwrap_or_default();
        let text = item.text.as_deref().unwrap_or_default();
        matches_keywords(&self.cfg.keywords, &[title, text])
    }
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    type Item = HnStory;

    fn kind(&self) -> AdapterKind {
        AdapterKind::HackerNews
    }

    async fn fetch_items(
        &self,
        http: &dyn HttpFetcher,
        _now: DateTime<Utc>,
    ) -> Result<Vec<HnStory>, IngestError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for &list in &self.lists {
            let req = HttpRequest::get(format!("{API_BASE}/{list}stories.json"));
            let ids: Vec<u64> = fetch_json(http, &req, "HN story list").await?;
            for id in ids.into_iter().take(self.max_items()) {
                if !seen.insert(id) {
                    continue;
                }
                if let Some(item) = self.fetch_item(http, id).await {
                    if self.keep(&item) {
                        out.push(HnStory { item, list });
                    }
                }
            }
        }
        Ok(out)
    }

    fn to_post_attributes(&self, story: &HnStory) -> Result<(String, PostAttributes), IngestError> {
        let item = &story.item;
        let url = item
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", item.id));
        let attrs = PostAttributes {
            title: truncate(&clean_text(item.title.as_deref().unwrap_or_default()), TITLE_MAX_CHARS),
            url,
            author: item.by.clone().unwrap_or_default(),
            posted_at: story.posted_at(),
            summary: truncate(
                &clean_text(item.text.as_deref().unwrap_or_default()),
                SUMMARY_MAX_CHARS,
            ),
            tags: vec![story.list.to_string()],
            priority_score: 0.0,
        };
        Ok((item.id.to_string(), attrs))
    }

    fn score(&self, story: &HnStory, now: DateTime<Utc>) -> f64 {
        let item = &story.item;
        let text = story.text().to_lowercase();

        let mut score = 0.1 * item.score as f64 + 0.05 * item.descendants as f64;
        score += recency_bonus(story.posted_at(), now, 10.0, 0.3);
        score += match story.list {
            "ask" => 3.0,
            "show" => 2.5,
            "top" => 1.0,
            _ => 0.0,
        };
        score += 0.8 * dev_keyword_matches(&text) as f64;
        if contains_any(&text, &["tutorial", "guide"]) {
            score += 2.0;
        }
        if contains_any(&text, &["release", "version"]) {
            score += 1.5;
        }
        if text.contains("open source") {
            score += 1.0;
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceType;

    fn source(name: &str, url: &str) -> Source {
        Source {
            id: 1,
            name: name.into(),
            source_type: SourceType::Rss,
            url: Some(url.into()),
            config: "{}".into(),
            active: true,
            auto_fetch_enabled: true,
            last_fetched_at: None,
            status: None,
        }
    }

    #[test]
    fn detects_hn_sources() {
        assert!(is_hacker_news(&source("HN", "https://news.ycombinator.com/")));
        assert!(is_hacker_news(&source("HN", "https://hnrss.org/frontpage")));
        assert!(is_hacker_news(&source("HackerNews", "")));
        assert!(!is_hacker_news(&source("Blog", "https://blog.rust-lang.org/feed.xml")));
    }

    #[test]
    fn story_types_are_validated() {
        let a = HackerNewsAdapter::with_config(HackerNewsConfig {
            story_types: vec!["Show".into(), "jobs".into(), "show".into(), "ask".into()],
            ..Default::default()
        });
        assert_eq!(a.lists, vec!["show", "ask"]);
        let a = HackerNewsAdapter::with_config(HackerNewsConfig::default());
        assert_eq!(a.lists, vec!["top"]);
    }
}
