// src/ingest/registry.rs
//! Source → adapter dispatch. Sub-variants (rss that is really Hacker News,
//! scraped vs API trending) are decided here once, never per call.

use crate::error::IngestError;
use crate::ingest::config::adapter_config;
use crate::ingest::providers::{
    discourse::DiscourseAdapter,
    github::GitHubAdapter,
    github_trending_api::{GitHubTrendingApiAdapter, TrendingConfig},
    github_trending_scrape::GitHubTrendingScrapeAdapter,
    hacker_news::{is_hacker_news, HackerNewsAdapter},
    reddit::RedditAdapter,
    rss::RssAdapter,
};
use crate::ingest::types::Ingest;
use crate::source::{Source, SourceType};

/// Build the adapter serving `source`.
pub fn adapter_for(source: &Source) -> Result<Box<dyn Ingest>, IngestError> {
    let adapter: Box<dyn Ingest> = match source.source_type {
        SourceType::Github => Box::new(GitHubAdapter::from_source(source)?),
        SourceType::GithubTrending => {
            let cfg: TrendingConfig = adapter_config(source);
            if cfg.use_scraper.unwrap_or(false) {
                Box::new(GitHubTrendingScrapeAdapter::with_config(cfg))
            } else {
                Box::new(GitHubTrendingApiAdapter::with_config(cfg))
            }
        }
        SourceType::Rss if is_hacker_news(source) => Box::new(HackerNewsAdapter::from_source(source)),
        SourceType::Rss => Box::new(RssAdapter::from_source(source)?),
        SourceType::Reddit => Box::new(RedditAdapter::from_source(source)?),
        SourceType::Discourse => Box::new(DiscourseAdapter::from_source(source)?),
    };
    Ok(adapter)
}
