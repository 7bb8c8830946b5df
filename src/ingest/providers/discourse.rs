// src/ingest/providers/discourse.rs
//! Discourse forums: `/latest.json`, optionally authenticated, with optional
//! first-post and category enrichment.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::IngestError;
use crate::ingest::config::{adapter_config, lenient, string_list};
use crate::ingest::http::{fetch_json, HttpFetcher, HttpRequest};
use crate::ingest::scoring::{in_list, recency_bonus};
use crate::ingest::types::{AdapterKind, SourceAdapter};
use crate::ingest::{clean_text, decode_items, truncate, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
use crate::post::PostAttributes;
use crate::source::Source;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DiscourseConfig {
    pub api_key: Option<String>,
    pub api_username: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub fetch_full_content: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    pub include_category_as_tag: Option<bool>,
    #[serde(deserialize_with = "string_list")]
    pub priority_tags: Vec<String>,
}

/// Forum flavor, fixed when the adapter is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    Generic,
    /// discuss.pytorch.org and friends: unanswered questions get a boost.
    PyTorch,
}

/// Tags come as plain strings on older forums and as objects on newer ones.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagRef {
    Name(String),
    Object { name: String },
}

impl TagRef {
    pub fn name(&self) -> &str {
        match self {
            TagRef::Name(n) => n,
            TagRef::Object { name } => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopicPoster {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub description: String,
}

/// One entry of `topic_list.topics`.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscourseTopic {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub reply_count: i64,
    #[serde(default)]
    pub like_count: i64,
    #[serde(default)]
    pub views: i64,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_posted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_poster_username: Option<String>,
    #[serde(default)]
    pub posters: Vec<TopicPoster>,
}

impl DiscourseTopic {
    /// Activity timestamp: last reply when known, creation otherwise.
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.last_posted_at.or(self.created_at)
    }
}

#[derive(Debug, Deserialize)]
struct LatestUser {
    id: i64,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Latest {
    #[serde(default)]
    users: Vec<LatestUser>,
    topic_list: TopicList,
}

#[derive(Debug, Deserialize)]
struct TopicList {
    #[serde(default)]
    topics: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct TopicDetail {
    post_stream: PostStream,
}

#[derive(Debug, Deserialize)]
struct PostStream {
    #[serde(default)]
    posts: Vec<FirstPost>,
}

#[derive(Debug, Deserialize)]
struct FirstPost {
    #[serde(default)]
    cooked: String,
}

#[derive(Debug, Deserialize)]
struct Categories {
    category_list: CategoryList,
}

#[derive(Debug, Deserialize)]
struct CategoryList {
    #[serde(default)]
    categories: Vec<Category>,
}

#[derive(Debug, Deserialize)]
struct Category {
    id: i64,
    name: String,
}

/// A topic with everything resolved during the fetch.
#[derive(Debug, Clone)]
pub struct TopicItem {
    pub topic: DiscourseTopic,
    pub author: Option<String>,
    pub category: Option<String>,
    /// Cleaned first post, when full content was requested and fetched.
    pub content: Option<String>,
}

pub struct DiscourseAdapter {
    base: String,
    flavor: Flavor,
    cfg: DiscourseConfig,
}

/// Forum root from a configured URL (`.../latest.json` and trailing `/` dropped).
pub fn base_url(url: &str) -> String {
    let url = url.trim().trim_end_matches('/');
    let url = url
        .strip_suffix("/latest.json")
        .or_else(|| url.strip_suffix("/latest"))
        .unwrap_or(url);
    url.to_string()
}

impl DiscourseAdapter {
    pub fn from_source(source: &Source) -> Result<Self, IngestError> {
        let base = base_url(source.url_str());
        let parsed = reqwest::Url::parse(&base)
            .map_err(|_| IngestError::InvalidSource("invalid Discourse URL".into()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| IngestError::InvalidSource("invalid Discourse URL".into()))?;
        let flavor = if host == "pytorch.org"
            || host.ends_with(".pytorch.org")
            || source.name.to_ascii_lowercase().contains("pytorch")
        {
            Flavor::PyTorch
        } else {
            Flavor::Generic
        };
        Ok(Self {
            base,
            flavor,
            cfg: adapter_config(source),
        })
    }

    pub fn flavor(&self) -> Flavor {
        self.flavor
    }

    fn request(&self, path: &str) -> HttpRequest {
        let req = HttpRequest::get(format!("{}{path}", self.base)).header("Accept", "application/json");
        match (self.cfg.api_key.as_deref(), self.cfg.api_username.as_deref()) {
            (Some(key), Some(user)) if !key.is_empty() && !user.is_empty() => {
                req.header("Api-Key", key).header("Api-Username", user)
            }
            _ => req,
        }
    }

    async fn categories(&self, http: &dyn HttpFetcher) -> HashMap<i64, String> {
        match fetch_json::<Categories>(http, &self.request("/categories.json"), "Discourse categories").await {
            Ok(c) => c
                .category_list
                .categories
                .into_iter()
                .map(|c| (c.id, c.name))
                .collect(),
            Err(e) => {
                tracing::warn!(target: "ingest", forum = %self.base, error = %e, "categories unavailable");
                HashMap::new()
            }
        }
    }

    async fn first_post(&self, http: &dyn HttpFetcher, id: u64) -> Option<String> {
        let path = format!("/t/{id}.json");
        match fetch_json::<TopicDetail>(http, &self.request(&path), "Discourse topic").await {
            Ok(d) => d
                .post_stream
                .posts
                .into_iter()
                .next()
                .map(|p| clean_text(&p.cooked))
                .filter(|c| !c.is_empty()),
            Err(e) => {
                tracing::warn!(target: "ingest", topic = id, error = %e, "keeping excerpt");
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for DiscourseAdapter {
    type Item = TopicItem;

    fn kind(&self) -> AdapterKind {
        AdapterKind::Discourse
    }

    async fn fetch_items(
        &self,
        http: &dyn HttpFetcher,
        _now: DateTime<Utc>,
    ) -> Result<Vec<TopicItem>, IngestError> {
        let latest: Latest = fetch_json(http, &self.request("/latest.json"), "Discourse latest").await?;
        let users: HashMap<i64, String> = latest.users.into_iter().map(|u| (u.id, u.username)).collect();
        let topics: Vec<DiscourseTopic> = decode_items(latest.topic_list.topics, "Discourse topic");

        let categories = if self.cfg.include_category_as_tag.unwrap_or(false) {
            self.categories(http).await
        } else {
            HashMap::new()
        };
        let full = self.cfg.fetch_full_content.unwrap_or(false);

        let mut out = Vec::with_capacity(topics.len());
        for topic in topics {
            let author = topic
                .posters
                .iter()
                .find(|p| p.description.contains("Original Poster"))
                .or_else(|| topic.posters.first())
                .and_then(|p| p.user_id)
                .and_then(|id| users.get(&id).cloned())
                .or_else(|| topic.last_poster_username.clone());
            let category = topic.category_id.and_then(|id| categories.get(&id).cloned());
            let content = if full {
                self.first_post(http, topic.id).await
            } else {
                None
            };
            out.push(TopicItem {
                topic,
                author,
                category,
                content,
            });
        }
        Ok(out)
    }

    fn to_post_attributes(&self, item: &TopicItem) -> Result<(String, PostAttributes), IngestError> {
        let t = &item.topic;
        let slug = if t.slug.is_empty() { "topic" } else { t.slug.as_str() };
        let summary = item
            .content
            .clone()
            .unwrap_or_else(|| clean_text(t.excerpt.as_deref().unwrap_or_default()));
        let mut tags: Vec<String> = t.tags.iter().map(|x| x.name().to_string()).collect();
        if let Some(c) = &item.category {
            if !tags.contains(c) {
                tags.push(c.clone());
            }
        }
        let attrs = PostAttributes {
            title: truncate(&clean_text(&t.title), TITLE_MAX_CHARS),
            url: format!("{}/t/{slug}/{}", self.base, t.id),
            author: item.author.clone().unwrap_or_default(),
            posted_at: t.posted_at(),
            summary: truncate(&summary, SUMMARY_MAX_CHARS),
            tags,
            priority_score: 0.0,
        };
        Ok((t.id.to_string(), attrs))
    }

    fn score(&self, item: &TopicItem, now: DateTime<Utc>) -> f64 {
        let t = &item.topic;
        let mut score = 0.1 * t.reply_count as f64 + 0.2 * t.like_count as f64 + 0.001 * t.views as f64;
        score += recency_bonus(t.posted_at(), now, 10.0, 0.5);
        if self.flavor == Flavor::PyTorch && t.reply_count == 0 && t.title.contains('?') {
            score += 5.0;
        }
        if t.pinned {
            score += 2.0;
        }
        let hits = t
            .tags
            .iter()
            .filter(|tag| in_list(tag.name(), &self.cfg.priority_tags))
            .count();
        score + hits as f64
    }
}
