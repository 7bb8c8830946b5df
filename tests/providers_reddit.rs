// tests/providers_reddit.rs
use chrono::{DateTime, TimeZone, Utc};
use sourcewatch::ingest::http::FixtureFetcher;
use sourcewatch::ingest::providers::reddit::RedditAdapter;
use sourcewatch::ingest::types::Ingest;
use sourcewatch::ingest::IngestionRunner;
use sourcewatch::store::{MemoryStore, PostStore, SourceStore};
use sourcewatch::{NewSource, Source, SourceStatus, SourceType};
use std::fs;
use std::sync::Arc;

const LISTING: &str = "https://www.reddit.com/r/MachineLearning/hot.json";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap()
}

fn source(store: &MemoryStore, url: &str, config: &str) -> Source {
    store
        .upsert_source(&NewSource::new("r/MachineLearning", SourceType::Reddit, Some(url)).with_config(config))
        .unwrap()
}

#[tokio::test]
async fn listing_skips_stickied_and_empty_posts() {
    let store = MemoryStore::new();
    let src = source(&store, "https://www.reddit.com/r/MachineLearning/hot", "{}");
    let adapter = RedditAdapter::from_source(&src).unwrap();
    assert_eq!(adapter.subreddit(), "MachineLearning");
    assert_eq!(adapter.listing_url(), format!("{LISTING}?limit=25"));

    let http = FixtureFetcher::new().with(LISTING, fs::read_to_string("tests/fixtures/reddit_hot.json").unwrap());
    let c = adapter.collect(&http, now()).await.expect("ok");
    let ids: Vec<&str> = c.iter().map(|c| c.external_id.as_str()).collect();
    assert_eq!(ids, vec!["abc123", "def456"]);

    let link = &c[0].attrs;
    assert_eq!(link.url, "https://github.com/ferris/tinygrad-rs");
    assert_eq!(link.author, "ferris");
    assert_eq!(
        link.tags,
        vec!["r/MachineLearning".to_string(), "Project".to_string(), "github".to_string()]
    );
    // (0.1*200 + 0.5*40) / (1 + 12/24)
    assert!((link.priority_score - 40.0 / 1.5).abs() < 1e-9);

    let text = &c[1].attrs;
    assert_eq!(text.title, "[D] Why does my loss go & stay NaN?");
    assert_eq!(text.url, "https://www.reddit.com/r/MachineLearning/comments/def456/d_why/");
    assert_eq!(text.summary, "Training diverges after epoch 3.");
    assert!(text.tags.contains(&"text-post".to_string()));
    // floor
    assert_eq!(text.priority_score, 1.0);
}

#[tokio::test]
async fn sort_limit_and_keywords_from_config() {
    let store = MemoryStore::new();
    let src = source(
        &store,
        "https://www.reddit.com/r/MachineLearning/",
        r#"{"sort":"new","limit":"10","keywords":"rust"}"#,
    );
    let adapter = RedditAdapter::from_source(&src).unwrap();
    assert_eq!(
        adapter.listing_url(),
        "https://www.reddit.com/r/MachineLearning/new.json?limit=10"
    );

    let http = FixtureFetcher::new().with(
        "https://www.reddit.com/r/MachineLearning/new.json",
        fs::read_to_string("tests/fixtures/reddit_hot.json").unwrap(),
    );
    let c = adapter.collect(&http, now()).await.unwrap();
    assert_eq!(c.len(), 1);
    assert_eq!(c[0].external_id, "abc123");
}

#[tokio::test]
async fn malformed_subreddit_url_sets_error_status() {
    let store = Arc::new(MemoryStore::new());
    let src = source(&store, "https://example.com", "{}");
    let http = Arc::new(FixtureFetcher::new());
    let runner = IngestionRunner::new(Arc::clone(&store), http.clone());

    let r = runner.run_at(&src, now()).await;
    assert_eq!(r.error.as_ref().map(|e| e.to_string()).as_deref(), Some("invalid subreddit URL"));

    let stored = store.get_source(src.id).unwrap().unwrap();
    assert_eq!(stored.status.as_deref(), Some("error: invalid subreddit URL"));
    assert_eq!(stored.status(), Some(SourceStatus::error("invalid subreddit URL")));
    assert!(stored.last_fetched_at.is_none());
    assert!(http.requested_urls().is_empty());
    assert_eq!(store.count().unwrap(), 0);
}
