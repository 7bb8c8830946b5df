// src/ingest/providers/github_trending_scrape.rs
//! Scrapes `github.com/trending`. Only the documented extraction contract is
//! relied upon: one `article.Box-row` per repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tl::{HTMLTag, NodeHandle, Parser, ParserOptions};

use crate::error::IngestError;
use crate::ingest::config::adapter_config;
use crate::ingest::http::{fetch_text, HttpFetcher, HttpRequest};
use crate::ingest::providers::github_trending_api::TrendingConfig;
use crate::ingest::scoring::in_list;
use crate::ingest::types::{AdapterKind, SourceAdapter};
use crate::ingest::{clean_text, truncate, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
use crate::post::PostAttributes;
use crate::source::Source;

const TRENDING_URL: &str = "https://github.com/trending";

#[derive(Debug, Clone, PartialEq)]
pub struct TrendingRepo {
    pub owner: String,
    pub name: String,
    pub description: String,
    pub language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub stars_today: u64,
    /// 1-based position on the page.
    pub rank: usize,
}

impl TrendingRepo {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/* ----------------------------
tl helpers
---------------------------- */

fn html_tag_iterator<'a, T: IntoIterator<Item = NodeHandle> + 'a>(
    p: &'a Parser<'a>,
    it: Option<T>,
) -> impl Iterator<Item = &'a HTMLTag<'a>> + 'a {
    let it = Iterator::flatten(it.into_iter().map(|x| x.into_iter()));
    it.filter_map(|node| node.get(p).and_then(|node| node.as_tag()))
}

fn find_first<'a>(
    p: &'a Parser<'a>,
    parent: &'a HTMLTag,
    selector: &'static str,
) -> Option<&'a HTMLTag<'a>> {
    html_tag_iterator(p, parent.query_selector(p, selector)).next()
}

fn get_attribute(tag: &HTMLTag, attribute: &'static str) -> Option<String> {
    tag.attributes()
        .get(attribute)
        .unwrap_or_default()
        .map(|f| f.as_utf8_str().into())
}

/// "1,234" / " 56 stars today " -> number; no digits means 0.
fn parse_count(text: &str) -> u64 {
    let digits: String = text
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

fn map_row(p: &Parser, row: &HTMLTag, rank: usize) -> Result<TrendingRepo, String> {
    let heading = find_first(p, row, "h2").ok_or("missing h2")?;
    let link = find_first(p, heading, "a").ok_or("missing h2 link")?;
    let href = get_attribute(link, "href").ok_or("missing repo href")?;
    let mut parts = href.trim_matches('/').split('/');
    let (owner, name) = match (parts.next(), parts.next(), parts.next()) {
        (Some(o), Some(n), None) if !o.is_empty() && !n.is_empty() => (o.to_string(), n.to_string()),
        _ => return Err(format!("unexpected repo href {href:?}")),
    };

    let description = find_first(p, row, "p")
        .map(|d| clean_text(&d.inner_text(p)))
        .unwrap_or_default();

    let language = html_tag_iterator(p, row.query_selector(p, "span"))
        .find(|s| get_attribute(s, "itemprop").as_deref() == Some("programmingLanguage"))
        .map(|s| clean_text(&s.inner_text(p)))
        .filter(|l| !l.is_empty());

    let mut stars = 0;
    let mut forks = 0;
    for a in html_tag_iterator(p, row.query_selector(p, "a")) {
        let Some(h) = get_attribute(a, "href") else {
            continue;
        };
        if h.ends_with("/stargazers") {
            stars = parse_count(&a.inner_text(p));
        } else if h.ends_with("/forks") {
            forks = parse_count(&a.inner_text(p));
        }
    }

    let stars_today = find_first(p, row, "span.float-sm-right")
        .map(|s| parse_count(&s.inner_text(p)))
        .unwrap_or(0);

    Ok(TrendingRepo {
        owner,
        name,
        description,
        language,
        stars,
        forks,
        stars_today,
        rank,
    })
}

/// Every well-formed `article.Box-row` on the page, in page order.
pub fn parse_trending_html(html: &str) -> Result<Vec<TrendingRepo>, IngestError> {
    let dom = tl::parse(html, ParserOptions::default())
        .map_err(|e| IngestError::format("GitHub trending page", e.to_string()))?;
    let p = dom.parser();
    let mut out = Vec::new();
    for (i, row) in html_tag_iterator(p, dom.query_selector("article.Box-row")).enumerate() {
        match map_row(p, row, i + 1) {
            Ok(repo) => out.push(repo),
            Err(e) => {
                tracing::warn!(target: "ingest", rank = i + 1, error = %e, "trending row skipped")
            }
        }
    }
    Ok(out)
}

pub struct GitHubTrendingScrapeAdapter {
    cfg: TrendingConfig,
}

impl GitHubTrendingScrapeAdapter {
    pub fn from_source(source: &Source) -> Self {
        Self {
            cfg: adapter_config(source),
        }
    }

    pub fn with_config(cfg: TrendingConfig) -> Self {
        Self { cfg }
    }

    pub fn page_url(&self) -> String {
        let since = self.cfg.since().as_str();
        let mut params = vec![];
        if let Some(lang) = self.cfg.language() {
            params.push(("language", lang));
        }
        params.push(("since", since));
        match reqwest::Url::parse_with_params(TRENDING_URL, &params) {
            Ok(u) => u.to_string(),
            Err(_) => format!("{TRENDING_URL}?since={since}"),
        }
    }
}

#[async_trait]
impl SourceAdapter for GitHubTrendingScrapeAdapter {
    type Item = TrendingRepo;

    fn kind(&self) -> AdapterKind {
        AdapterKind::GitHubTrendingScrape
    }

    async fn fetch_items(
        &self,
        http: &dyn HttpFetcher,
        _now: DateTime<Utc>,
    ) -> Result<Vec<TrendingRepo>, IngestError> {
        let req = HttpRequest::get(self.page_url()).header("Accept", "text/html");
        let html = fetch_text(http, &req).await?;
        parse_trending_html(&html)
    }

    fn to_post_attributes(
        &self,
        item: &TrendingRepo,
    ) -> Result<(String, PostAttributes), IngestError> {
        let full_name = item.full_name();
        // live counters stay out of the summary; they only move the score
        let summary = item.description.clone();

        let mut tags = vec!["trending".to_string()];
        if let Some(lang) = &item.language {
            tags.push(lang.clone());
        }

        let attrs = PostAttributes {
            title: truncate(&full_name, TITLE_MAX_CHARS),
            url: format!("https://github.com/{full_name}"),
            author: item.owner.clone(),
            posted_at: None,
            summary: truncate(&summary, SUMMARY_MAX_CHARS),
            tags,
            priority_score: 0.0,
        };
        Ok((full_name, attrs))
    }

    fn score(&self, item: &TrendingRepo, _now: DateTime<Utc>) -> f64 {
        let mut score = 10.0 * (item.stars.max(1) as f64).log10();
        score += 0.5 * item.stars_today as f64;
        score += 5.0 * (item.forks.max(1) as f64).log10();
        if item
            .language
            .as_deref()
            .is_some_and(|l| in_list(l, &self.cfg.preferred_languages))
        {
            score += 20.0;
        }
        score + 2.0 * 26usize.saturating_sub(item.rank) as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_tolerate_commas_and_suffixes() {
        assert_eq!(parse_count(" 12,345 "), 12345);
        assert_eq!(parse_count("321 stars today"), 321);
        assert_eq!(parse_count("n/a"), 0);
    }

    #[test]
    fn page_url_omits_missing_language() {
        let a = GitHubTrendingScrapeAdapter::with_config(TrendingConfig::default());
        assert_eq!(a.page_url(), "https://github.com/trending?since=daily");

        let a = GitHubTrendingScrapeAdapter::with_config(TrendingConfig {
            since: Some("weekly".into()),
            language: Some("rust".into()),
            ..Default::default()
        });
        assert_eq!(a.page_url(), "https://github.com/trending?language=rust&since=weekly");
    }
}
