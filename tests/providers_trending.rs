// tests/providers_trending.rs
use chrono::{DateTime, Duration, TimeZone, Utc};
use sourcewatch::ingest::http::FixtureFetcher;
use sourcewatch::ingest::providers::github_trending_api::{GitHubTrendingApiAdapter, TrendingQuery};
use sourcewatch::ingest::providers::github_trending_scrape::parse_trending_html;
use sourcewatch::ingest::registry::adapter_for;
use sourcewatch::ingest::types::AdapterKind;
use sourcewatch::ingest::IngestionRunner;
use sourcewatch::store::{MemoryStore, PostStore, SourceStore};
use sourcewatch::{NewSource, PostStatus, Source, SourceType};
use std::fs;
use std::sync::Arc;

const SEARCH: &str = "https://api.github.com/search/repositories";
const TRENDING: &str = "https://github.com/trending";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

fn fixture(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{name}")).expect("fixture")
}

fn source(store: &MemoryStore, config: &str) -> Source {
    store
        .upsert_source(&NewSource::new("GitHub Trending", SourceType::GithubTrending, None).with_config(config))
        .unwrap()
}

#[tokio::test]
async fn search_results_are_merged_and_ranked() {
    let store = MemoryStore::new();
    let src = source(&store, r#"{"preferred_languages":"rust","token":"t0k"}"#);
    let adapter = adapter_for(&src).unwrap();
    assert_eq!(adapter.kind(), AdapterKind::GitHubTrendingApi);

    // every query gets the same page back
    let http = FixtureFetcher::new().with(SEARCH, fixture("github_search.json"));
    let c = adapter.collect(&http, now()).await.expect("ok");

    let ids: Vec<&str> = c.iter().map(|c| c.external_id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2"]);

    let top = &c[0].attrs;
    assert_eq!(top.title, "ferris/crab-db");
    assert_eq!(top.url, "https://github.com/ferris/crab-db");
    assert_eq!(top.author, "ferris");
    assert_eq!(top.posted_at, Some(Utc.with_ymd_and_hms(2026, 10, 17, 12, 0, 0).unwrap()));
    assert_eq!(top.tags, vec!["trending", "Rust", "database", "rust", "storage"]);
    assert_eq!(
        top.summary,
        "An embedded key-value store written in Rust with MVCC and a tiny footprint."
    );
    // stars 30 + age 40/3 + forks ratio 1 + preferred 15 + topics 6 + description 5 + pushed 3.75
    assert!((top.priority_score - (60.75 + 40.0 / 3.0)).abs() < 1e-6, "{}", top.priority_score);

    let small = &c[1].attrs;
    assert_eq!(small.summary, "tiny");
    assert!((small.priority_score - (10.0 + 50.0 / 3.0)).abs() < 1e-6);

    let reqs = http.requests.lock().unwrap();
    assert_eq!(reqs.len(), 3);
    assert!(reqs.iter().all(|r| r.url.starts_with(SEARCH)));
    assert!(reqs.iter().any(|r| r.url.contains("sort=updated")));
    assert!(reqs
        .iter()
        .all(|r| r.header_value("Authorization") == Some("Bearer t0k")));
}

#[test]
fn search_url_encodes_the_query() {
    let url = GitHubTrendingApiAdapter::search_url(&TrendingQuery {
        q: "created:>2026-10-17 stars:>10".into(),
        sort: "stars",
    });
    assert_eq!(
        url,
        format!("{SEARCH}?q=created%3A%3E2026-10-17+stars%3A%3E10&sort=stars&order=desc&per_page=50")
    );
}

#[tokio::test]
async fn failing_search_fails_the_source() {
    let store = Arc::new(MemoryStore::new());
    let src = source(&store, "{}");
    let http = FixtureFetcher::new().with_status(SEARCH, 422, r#"{"message":"Validation Failed"}"#);
    let runner = IngestionRunner::new(Arc::clone(&store), Arc::new(http));

    let r = runner.run_at(&src, now()).await;
    assert!(!r.is_ok());
    let status = store.get_source(src.id).unwrap().unwrap().status.unwrap_or_default();
    assert!(status.starts_with("error: HTTP 422 from https://api.github.com/search/repositories?"), "{status}");
}

#[test]
fn trending_page_rows_are_extracted() {
    let repos = parse_trending_html(&fixture("github_trending.html")).expect("html");
    // the sponsor row has no owner/name link
    assert_eq!(repos.len(), 2);

    let tokio = &repos[0];
    assert_eq!(tokio.full_name(), "tokio-rs/tokio");
    assert_eq!(
        tokio.description,
        "A runtime for writing reliable asynchronous applications with Rust."
    );
    assert_eq!(tokio.language.as_deref(), Some("Rust"));
    assert_eq!((tokio.stars, tokio.forks, tokio.stars_today), (28_123, 2_601, 150));
    assert_eq!(tokio.rank, 1);

    let notes = &repos[1];
    assert_eq!(notes.full_name(), "someone/notes");
    assert!(notes.language.is_none());
    assert!(notes.description.is_empty());
    assert_eq!((notes.stars, notes.forks, notes.stars_today), (12, 0, 3));
    assert_eq!(notes.rank, 3);
}

#[tokio::test]
async fn scraper_is_used_when_configured() {
    let store = Arc::new(MemoryStore::new());
    let src = source(
        &store,
        r#"{"use_scraper":"true","preferred_languages":["Rust"],"since":"weekly"}"#,
    );
    let adapter = adapter_for(&src).unwrap();
    assert_eq!(adapter.kind(), AdapterKind::GitHubTrendingScrape);

    let http = FixtureFetcher::new().with(TRENDING, fixture("github_trending.html"));
    let c = adapter.collect(&http, now()).await.unwrap();
    assert_eq!(http.requested_urls(), vec![format!("{TRENDING}?since=weekly")]);

    let tokio = &c[0];
    assert_eq!(tokio.external_id, "tokio-rs/tokio");
    assert_eq!(tokio.attrs.url, "https://github.com/tokio-rs/tokio");
    assert_eq!(tokio.attrs.author, "tokio-rs");
    assert!(tokio.attrs.posted_at.is_none());
    assert_eq!(tokio.attrs.tags, vec!["trending", "Rust"]);
    assert_eq!(
        tokio.attrs.summary,
        "A runtime for writing reliable asynchronous applications with Rust."
    );
    let expected = 10.0 * 28_123f64.log10() + 75.0 + 5.0 * 2_601f64.log10() + 20.0 + 50.0;
    assert!((tokio.attrs.priority_score - expected).abs() < 1e-9);

    let notes = &c[1];
    assert_eq!(notes.attrs.tags, vec!["trending"]);
    // no forks link: log10(1) is 0
    let expected = 10.0 * 12f64.log10() + 1.5 + 46.0;
    assert!((notes.attrs.priority_score - expected).abs() < 1e-9);

    let runner = IngestionRunner::new(Arc::clone(&store), Arc::new(http));
    let r = runner.run_at(&src, now()).await;
    assert_eq!(r.new_count, 2);
    assert_eq!(store.list_by_source("GitHub Trending").unwrap().len(), 2);
}

#[tokio::test]
async fn star_drift_does_not_rewrite_triaged_posts() {
    let store = Arc::new(MemoryStore::new());
    let src = source(&store, r#"{"use_scraper":true}"#);
    let html = fixture("github_trending.html");

    let http = FixtureFetcher::new().with(TRENDING, html.clone());
    let runner = IngestionRunner::new(Arc::clone(&store), Arc::new(http));
    assert_eq!(runner.run_at(&src, now()).await.new_count, 2);
    let tokio = store
        .find_by_source_and_external_id("GitHub Trending", "tokio-rs/tokio")
        .unwrap()
        .unwrap();
    store.set_status(tokio.id, PostStatus::Read).unwrap();

    // one more star an hour later
    let drifted = html.replace("28,123", "28,124");
    assert_ne!(drifted, html);
    let http = FixtureFetcher::new().with(TRENDING, drifted);
    let runner = IngestionRunner::new(Arc::clone(&store), Arc::new(http));
    let r = runner.run_at(&src, now() + Duration::hours(1)).await;
    assert!(r.is_ok(), "{r:?}");
    assert_eq!(r.new_count, 0);

    let after = store.get(tokio.id).unwrap().unwrap();
    assert_eq!(after.status, PostStatus::Read);
    assert_eq!(after.priority_score, tokio.priority_score);
    assert_eq!(after.updated_at, tokio.updated_at);
}
