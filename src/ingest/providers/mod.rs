// src/ingest/providers/mod.rs
pub mod discourse;
pub mod github;
pub mod github_trending_api;
pub mod github_trending_scrape;
pub mod hacker_news;
pub mod reddit;
pub mod rss;
