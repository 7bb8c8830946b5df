// src/ingest/providers/github_trending_api.rs
//! "Trending" approximated through the GitHub search API: three searches per
//! window, merged by repo id and ranked by a popularity heuristic.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::IngestError;
use crate::ingest::config::{adapter_config, string_list};
use crate::ingest::http::{fetch_json, HttpFetcher, HttpRequest};
use crate::ingest::scoring::{hours_since, in_list};
use crate::ingest::types::{AdapterKind, SourceAdapter};
use crate::ingest::{clean_text, decode_items, truncate, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
use crate::post::PostAttributes;
use crate::source::Source;

const SEARCH_URL: &str = "https://api.github.com/search/repositories";
const TOP_N: usize = 30;
const PER_QUERY: usize = 50;

const HELPFUL_TOPICS: &[&str] = &[
    "machine-learning",
    "deep-learning",
    "llm",
    "developer-tools",
    "cli",
    "rust",
    "python",
    "webassembly",
    "database",
    "compiler",
    "good-first-issue",
    "hacktoberfest",
    "tutorial",
];

/// Trending window, shared with the scraping adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Since {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Since {
    pub fn as_str(&self) -> &'static str {
        match self {
            Since::Daily => "daily",
            Since::Weekly => "weekly",
            Since::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Since::Weekly,
            "monthly" => Since::Monthly,
            _ => Since::Daily,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Since::Daily => 1,
            Since::Weekly => 7,
            Since::Monthly => 30,
        }
    }
}

/// Config shared by both trending adapters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TrendingConfig {
    pub since: Option<String>,
    pub language: Option<String>,
    #[serde(deserialize_with = "string_list")]
    pub preferred_languages: Vec<String>,
    pub token: Option<String>,
    #[serde(deserialize_with = "crate::ingest::config::lenient")]
    pub use_scraper: Option<bool>,
}

impl TrendingConfig {
    pub fn since(&self) -> Since {
        self.since.as_deref().map(Since::parse).unwrap_or_default()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepoOwner {
    pub login: String,
}

/// Raw item from the search API.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRepo {
    pub id: u64,
    pub full_name: String,
    pub html_url: String,
    #[serde(default)]
    pub owner: Option<RepoOwner>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Value>,
}

/// One search: `q` qualifiers plus sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendingQuery {
    pub q: String,
    pub sort: &'static str,
}

/// The three searches for a window. Thresholds grow with the window so
/// monthly results are not drowned by day-old toy repos.
pub fn queries_for(since: Since, language: Option<&str>, now: DateTime<Utc>) -> Vec<TrendingQuery> {
    let day = |n: i64| (now - Duration::days(n)).format("%Y-%m-%d").to_string();
    let (w, min_new, min_pushed, wide, min_wide) = match since {
        Since::Daily => (1, 10, 500, 7, 50),
        Since::Weekly => (7, 50, 1000, 30, 200),
        Since::Monthly => (30, 100, 2000, 90, 500),
    };
    let lang = language
        .map(|l| format!(" language:{l}"))
        .unwrap_or_default();
    vec![
        TrendingQuery {
            q: format!("created:>{} stars:>{min_new}{lang}", day(w)),
            sort: "stars",
        },
        TrendingQuery {
            q: format!("pushed:>{} stars:>{min_pushed}{lang}", day(w)),
            sort: "updated",
        },
        TrendingQuery {
            q: format!("created:>{} stars:>{min_wide}{lang}", day(wide)),
            sort: "stars",
        },
    ]
}

pub struct GitHubTrendingApiAdapter {
    cfg: TrendingConfig,
    token: Option<String>,
}

impl GitHubTrendingApiAdapter {
    pub fn from_source(source: &Source) -> Self {
        Self::with_config(adapter_config(source))
    }

    pub fn with_config(cfg: TrendingConfig) -> Self {
        let token = cfg
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()));
        Self { cfg, token }
    }

    pub fn search_url(query: &TrendingQuery) -> String {
        let params = [
            ("q", query.q.as_str()),
            ("sort", query.sort),
            ("order", "desc"),
            ("per_page", "50"),
        ];
        match reqwest::Url::parse_with_params(SEARCH_URL, &params) {
            Ok(u) => u.to_string(),
            Err(_) => SEARCH_URL.to_string(),
        }
    }

    async fn search(
        &self,
        http: &dyn HttpFetcher,
        query: &TrendingQuery,
    ) -> Result<Vec<SearchRepo>, IngestError> {
        let mut req = HttpRequest::get(Self::search_url(query))
            .header("Accept", "application/vnd.github+json");
        if let Some(t) = &self.token {
            req = req.header("Authorization", format!("Bearer {t}"));
        }
        let resp: SearchResponse = fetch_json(http, &req, "GitHub search").await?;
        let mut repos: Vec<SearchRepo> = decode_items(resp.items, "GitHub repository");
        repos.truncate(PER_QUERY);
        Ok(repos)
    }

    /// Popularity heuristic used for ranking and as the priority score.
    pub fn trending_score(&self, repo: &SearchRepo, now: DateTime<Utc>) -> f64 {
        let stars = repo.stargazers_count as f64;
        let mut score = 10.0 * stars.max(1.0).log10();

        if let Some(created) = repo.created_at {
            let age_days = hours_since(created, now) / 24.0;
            let horizon = 3.0 * self.cfg.since().days() as f64;
            score += 20.0 * (1.0 - age_days / horizon).max(0.0);
        }

        if stars > 0.0 {
            let ratio = repo.forks_count as f64 / stars;
            if (0.05..=0.3).contains(&ratio) {
                score += 10.0 * ratio;
            }
        }

        if let Some(lang) = &repo.language {
            if in_list(lang, &self.cfg.preferred_languages) {
                score += 15.0;
            }
        }

        let helpful = repo
            .topics
            .iter()
            .filter(|t| HELPFUL_TOPICS.contains(&t.to_lowercase().as_str()))
            .count();
        score += 3.0 * helpful as f64;

        if repo
            .description
            .as_deref()
            .is_some_and(|d| d.trim().chars().count() >= 50)
        {
            score += 5.0;
        }

        if let Some(pushed) = repo.pushed_at {
            score += 5.0 * (24.0 - hours_since(pushed, now)).max(0.0) / 24.0;
        }
        score
    }
}

#[async_trait]
impl SourceAdapter for GitHubTrendingApiAdapter {
    type Item = SearchRepo;

    fn kind(&self) -> AdapterKind {
        AdapterKind::GitHubTrendingApi
    }

    async fn fetch_items(
        &self,
        http: &dyn HttpFetcher,
        now: DateTime<Utc>,
    ) -> Result<Vec<SearchRepo>, IngestError> {
        let qs = queries_for(self.cfg.since(), self.cfg.language(), now);
        let (a, b, c) = tokio::join!(
            self.search(http, &qs[0]),
            self.search(http, &qs[1]),
            self.search(http, &qs[2]),
        );

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for repo in a?.into_iter().chain(b?).chain(c?) {
            if seen.insert(repo.id) {
                merged.push(repo);
            }
        }

        let mut scored: Vec<(f64, SearchRepo)> = merged
            .into_iter()
            .map(|r| (self.trending_score(&r, now), r))
            .collect();
        scored.sort_by(|x, y| y.0.total_cmp(&x.0));
        scored.truncate(TOP_N);
        Ok(scored.into_iter().map(|(_, r)| r).collect())
    }

    fn to_post_attributes(&self, item: &SearchRepo) -> Result<(String, PostAttributes), IngestError> {
        let mut tags = vec!["trending".to_string()];
        if let Some(lang) = &item.language {
            tags.push(lang.clone());
        }
        tags.extend(item.topics.iter().take(5).cloned());

        let summary = clean_text(item.description.as_deref().unwrap_or_default());
        let attrs = PostAttributes {
            title: truncate(&item.full_name, TITLE_MAX_CHARS),
            url: item.html_url.clone(),
            author: item
                .owner
                .as_ref()
                .map(|o| o.login.clone())
                .or_else(|| item.full_name.split('/').next().map(str::to_string))
                .unwrap_or_default(),
            posted_at: item.created_at,
            summary: truncate(&summary, SUMMARY_MAX_CHARS),
            tags,
            priority_score: 0.0,
        };
        Ok((item.id.to_string(), attrs))
    }

    fn score(&self, item: &SearchRepo, now: DateTime<Utc>) -> f64 {
        self.trending_score(item, now)
    }
}
