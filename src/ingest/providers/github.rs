// src/ingest/providers/github.rs
//! Open issues of one repository via the GitHub REST API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::IngestError;
use crate::ingest::config::{adapter_config, lenient, string_list};
use crate::ingest::http::{fetch_json, HttpFetcher, HttpRequest};
use crate::ingest::scoring::{normalize_label, recency_bonus};
use crate::ingest::types::{AdapterKind, SourceAdapter};
use crate::ingest::{clean_text, decode_items, truncate, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
use crate::post::PostAttributes;
use crate::source::Source;

const API_BASE: &str = "https://api.github.com";
const DEFAULT_MAX_ITEMS: usize = 30;

const BEGINNER_LABELS: &[&str] = &[
    "good first issue",
    "help wanted",
    "beginner friendly",
    "easy",
    "starter",
];

static REPO_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"github\.com[/:]([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)").expect("repo url regex")
});
static REPO_SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)$").expect("repo slug regex"));

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,
    #[serde(deserialize_with = "string_list")]
    pub labels: Vec<String>,
    #[serde(deserialize_with = "string_list")]
    pub priority_labels: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubUser {
    pub login: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitHubReactions {
    #[serde(default)]
    pub total_count: u64,
}

/// Raw item from `GET /repos/{owner}/{repo}/issues`.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubIssue {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    #[serde(default)]
    pub user: Option<GitHubUser>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub comments: u64,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    #[serde(default)]
    pub reactions: Option<GitHubReactions>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Present only on pull requests.
    #[serde(default)]
    pub pull_request: Option<Value>,
}

impl GitHubIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }
}

/// `(owner, repo)` from a GitHub URL or an `owner/repo` slug.
pub fn parse_repo(url: &str) -> Option<(String, String)> {
    let url = url.trim();
    let caps = REPO_URL_RE
        .captures(url)
        .or_else(|| REPO_SLUG_RE.captures(url))?;
    let owner = caps.get(1)?.as_str().to_string();
    let repo = caps.get(2)?.as_str().trim_end_matches(".git").to_string();
    if repo.is_empty() {
        return None;
    }
    Some((owner, repo))
}

pub struct GitHubAdapter {
    owner: String,
    repo: String,
    cfg: GitHubConfig,
    token: Option<String>,
}

impl GitHubAdapter {
    pub fn from_source(source: &Source) -> Result<Self, IngestError> {
        let (owner, repo) = parse_repo(source.url_str())
            .ok_or_else(|| IngestError::InvalidSource("invalid GitHub repository URL".into()))?;
        let cfg: GitHubConfig = adapter_config(source);
        let token = cfg
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty()));
        Ok(Self {
            owner,
            repo,
            cfg,
            token,
        })
    }

    pub fn repo_slug(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn issues_url(&self) -> String {
        let per_page = self
            .cfg
            .max_items
            .unwrap_or(DEFAULT_MAX_ITEMS)
            .clamp(1, 100)
            .to_string();
        let mut params = vec![
            ("state", "open".to_string()),
            ("sort", "updated".to_string()),
            ("direction", "desc".to_string()),
            ("per_page", per_page),
        ];
        if !self.cfg.labels.is_empty() {
            params.push(("labels", self.cfg.labels.join(",")));
        }
        let base = format!("{API_BASE}/repos/{}/{}/issues", self.owner, self.repo);
        match reqwest::Url::parse_with_params(&base, &params) {
            Ok(u) => u.to_string(),
            Err(_) => base,
        }
    }

    fn request(&self) -> HttpRequest {
        let req = HttpRequest::get(self.issues_url())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        match &self.token {
            Some(t) => req.header("Authorization", format!("Bearer {t}")),
            None => req,
        }
    }
}

#[async_trait]
impl SourceAdapter for GitHubAdapter {
    type Item = GitHubIssue;

    fn kind(&self) -> AdapterKind {
        AdapterKind::GitHub
    }

    async fn fetch_items(
        &self,
        http: &dyn HttpFetcher,
        _now: DateTime<Utc>,
    ) -> Result<Vec<GitHubIssue>, IngestError> {
        let raw: Vec<Value> = fetch_json(http, &self.request(), "GitHub issues").await?;
        let issues: Vec<GitHubIssue> = decode_items(raw, "GitHub issue");
        let total = issues.len();
        let out: Vec<GitHubIssue> = issues
            .into_iter()
            .filter(|i| !i.is_pull_request())
            .collect();
        tracing::debug!(
            target: "ingest",
            repo = %self.repo_slug(),
            issues = out.len(),
            pull_requests = total - out.len(),
            "github issues fetched"
        );
        Ok(out)
    }

    fn to_post_attributes(
        &self,
        item: &GitHubIssue,
    ) -> Result<(String, PostAttributes), IngestError> {
        let attrs = PostAttributes {
            title: truncate(&clean_text(&item.title), TITLE_MAX_CHARS),
            url: item.html_url.clone(),
            author: item.user.as_ref().map(|u| u.login.clone()).unwrap_or_default(),
            posted_at: item.created_at,
            summary: truncate(
                &clean_text(item.body.as_deref().unwrap_or_default()),
                SUMMARY_MAX_CHARS,
            ),
            tags: item.labels.iter().map(|l| l.name.clone()).collect(),
            priority_score: 0.0,
        };
        Ok((item.number.to_string(), attrs))
    }

    fn score(&self, item: &GitHubIssue, now: DateTime<Utc>) -> f64 {
        let labels: Vec<String> = item.labels.iter().map(|l| normalize_label(&l.name)).collect();
        let has = |pred: &dyn Fn(&str) -> bool| labels.iter().any(|l| pred(l.as_str()));

        let mut score = 0.5 * item.comments as f64;
        score += 0.3
            * item
                .reactions
                .as_ref()
                .map(|r| r.total_count)
                .unwrap_or(0) as f64;
        if has(&|l: &str| BEGINNER_LABELS.contains(&l)) {
            score += 5.0;
        }
        if has(&|l: &str| l.contains("bug")) {
            score += 3.0;
        }
        if has(&|l: &str| l.contains("enhancement") || l.contains("feature")) {
            score += 2.0;
        }
        score += recency_bonus(item.created_at, now, 10.0, 0.3);
        score += recency_bonus(item.updated_at, now, 5.0, 0.2);

        let priority: Vec<String> = self
            .cfg
            .priority_labels
            .iter()
            .map(|p| normalize_label(p))
            .collect();
        let priority_hits = labels.iter().filter(|l| priority.contains(l)).count();
        score + 2.0 * priority_hits as f64
    }
}
