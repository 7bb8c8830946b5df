// src/ingest/mod.rs
pub mod config;
pub mod http;
pub mod providers;
pub mod registry;
pub mod scheduler;
pub mod scoring;
pub mod types;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;

use crate::error::{IngestError, StoreError};
use crate::ingest::http::HttpFetcher;
use crate::reconcile::{PostReconciler, ReconcileAction};
use crate::source::{Source, SourceStatus};
use crate::store::{PostStore, SourceStore};

pub const TITLE_MAX_CHARS: usize = 200;
pub const SUMMARY_MAX_CHARS: usize = 500;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Source runs started.");
        describe_counter!("ingest_posts_created_total", "Posts created by reconciliation.");
        describe_counter!(
            "ingest_posts_updated_total",
            "Existing posts refreshed by reconciliation."
        );
        describe_counter!(
            "ingest_items_skipped_total",
            "Upstream items dropped (undecodable, invalid or failed to store)."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source runs that ended in an error status."
        );
        describe_histogram!("ingest_fetch_ms", "Adapter fetch+parse time in milliseconds.");
        describe_gauge!("ingest_last_run_ts", "Unix ts of the last finished source run.");
    });
}

static RE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/h[1-6]|/tr|/blockquote)\b[^>]*>").expect("block tag regex")
});
static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Plain text from an HTML-ish fragment: decode entities, drop tags, collapse whitespace.
pub fn clean_text(s: &str) -> String {
    let out = html_escape::decode_html_entities(s);
    let out = RE_BLOCK.replace_all(&out, " ");
    let out = RE_TAGS.replace_all(&out, "");
    let out = RE_WS.replace_all(&out, " ");
    out.trim().to_string()
}

/// Char-safe truncation; the `...` suffix counts toward `max`.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    if max < 3 {
        return s.chars().take(max).collect();
    }
    let head: String = s.chars().take(max - 3).collect();
    format!("{}...", head.trim_end())
}

/// Decode each raw item on its own so one bad item does not sink the batch.
pub fn decode_items<T: DeserializeOwned>(raw: Vec<Value>, what: &str) -> Vec<T> {
    let mut out = Vec::with_capacity(raw.len());
    for v in raw {
        match serde_json::from_value(v) {
            Ok(item) => out.push(item),
            Err(e) => {
                tracing::warn!(target: "ingest", what, error = %e, "undecodable item skipped");
                counter!("ingest_items_skipped_total").increment(1);
            }
        }
    }
    out
}

/// Outcome of one source run.
#[derive(Debug, Default)]
pub struct RunResult {
    pub new_count: usize,
    pub updated_count: usize,
    pub unchanged_count: usize,
    /// Candidates that could not be stored.
    pub skipped_count: usize,
    /// Source-level failure; counts are zero when set.
    pub error: Option<IngestError>,
}

impl RunResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Status recorded on the source for this result.
    pub fn status(&self) -> SourceStatus {
        match &self.error {
            Some(e) => SourceStatus::error(e.to_string()),
            None => SourceStatus::Ok {
                new_count: self.new_count,
            },
        }
    }

    fn failed(error: IngestError) -> Self {
        Self {
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Runs sources end to end: adapter, fetch, reconcile, status.
pub struct IngestionRunner<S> {
    store: Arc<S>,
    http: Arc<dyn HttpFetcher>,
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl<S> IngestionRunner<S>
where
    S: PostStore + SourceStore + 'static,
{
    pub fn new(store: Arc<S>, http: Arc<dyn HttpFetcher>) -> Self {
        Self {
            store,
            http,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn lock_for(&self, id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(id).or_default().clone()
    }

    fn record(&self, source: &Source, status: &SourceStatus, fetched_at: Option<DateTime<Utc>>) {
        if let Err(e) = self.store.record_status(source.id, status, fetched_at) {
            tracing::warn!(target: "ingest", source = %source.name, error = %e, "could not record source status");
        }
    }

    pub async fn run(&self, source: &Source) -> RunResult {
        self.run_at(source, Utc::now()).await
    }

    /// Run one source with an explicit clock. Concurrent runs of the same
    /// source id are serialized.
    pub async fn run_at(&self, source: &Source, now: DateTime<Utc>) -> RunResult {
        ensure_metrics_described();
        let lock = self.lock_for(source.id);
        let _guard = lock.lock().await;

        counter!("ingest_runs_total").increment(1);
        self.record(source, &SourceStatus::Refreshing, None);

        let result = self.ingest(source, now).await;
        let status = result.status();
        match &result.error {
            Some(e) => {
                counter!("ingest_source_errors_total").increment(1);
                tracing::warn!(target: "ingest", source = %source.name, error = %e, "source run failed");
                self.record(source, &status, None);
            }
            None => {
                tracing::info!(
                    target: "ingest",
                    source = %source.name,
                    new = result.new_count,
                    updated = result.updated_count,
                    unchanged = result.unchanged_count,
                    skipped = result.skipped_count,
                    "source run finished"
                );
                self.record(source, &status, Some(now));
            }
        }
        gauge!("ingest_last_run_ts").set(now.timestamp() as f64);
        result
    }

    async fn ingest(&self, source: &Source, now: DateTime<Utc>) -> RunResult {
        let adapter = match registry::adapter_for(source) {
            Ok(a) => a,
            Err(e) => return RunResult::failed(e),
        };

        let t0 = std::time::Instant::now();
        let candidates = match adapter.collect(self.http.as_ref(), now).await {
            Ok(c) => c,
            Err(e) => return RunResult::failed(e),
        };
        histogram!("ingest_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        tracing::debug!(
            target: "ingest",
            source = %source.name,
            adapter = %adapter.kind(),
            candidates = candidates.len(),
            "fetched"
        );

        let reconciler = PostReconciler::new(self.store.as_ref());
        let mut result = RunResult::default();
        for c in &candidates {
            match reconciler.reconcile_at(&source.name, &c.external_id, &c.attrs, now) {
                Ok(r) => match r.action {
                    ReconcileAction::Created => result.new_count += 1,
                    ReconcileAction::Updated => result.updated_count += 1,
                    ReconcileAction::Unchanged => result.unchanged_count += 1,
                },
                Err(e) => {
                    tracing::warn!(
                        target: "ingest",
                        source = %source.name,
                        external_id = %c.external_id,
                        error = %e,
                        "post not stored"
                    );
                    counter!("ingest_items_skipped_total").increment(1);
                    result.skipped_count += 1;
                }
            }
        }
        counter!("ingest_posts_created_total").increment(result.new_count as u64);
        counter!("ingest_posts_updated_total").increment(result.updated_count as u64);
        result
    }

    /// Look the source up by id and run it.
    pub async fn run_source_id(&self, id: i64) -> Result<RunResult, StoreError> {
        let source = self.store.get_source(id)?.ok_or(StoreError::NotFound(id))?;
        Ok(self.run(&source).await)
    }

    /// Run every active, auto-fetch-enabled source concurrently. One failing
    /// source never affects the others.
    pub async fn refresh_all(self: &Arc<Self>) -> Result<Vec<(String, RunResult)>, StoreError> {
        let sources: Vec<Source> = self
            .store
            .list_sources()?
            .into_iter()
            .filter(|s| s.active && s.auto_fetch_enabled)
            .collect();

        let mut set = JoinSet::new();
        for source in sources {
            let runner = Arc::clone(self);
            set.spawn(async move {
                let result = runner.run(&source).await;
                (source.name, result)
            });
        }

        let mut out = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(r) => out.push(r),
                Err(e) => tracing::error!(target: "ingest", error = %e, "source task panicked"),
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_markup() {
        let s = "  <p>Hello,&nbsp;&nbsp;<b>world</b>!</p><p>Next&hellip;</p>  ";
        assert_eq!(clean_text(s), "Hello, world! Next…");
        assert_eq!(clean_text("Why?"), "Why?");
    }

    #[test]
    fn truncate_counts_suffix() {
        assert_eq!(truncate("short", 10), "short");
        let t = truncate(&"é".repeat(300), 200);
        assert_eq!(t.chars().count(), 200);
        assert!(t.ends_with("..."));
        assert_eq!(truncate("abcdef", 2), "ab");
    }

    #[test]
    fn decode_items_skips_bad_entries() {
        #[derive(serde::Deserialize)]
        struct Item {
            id: u64,
        }
        let raw = vec![
            serde_json::json!({"id": 1}),
            serde_json::json!({"id": "x"}),
            serde_json::json!({"id": 3}),
        ];
        let items: Vec<Item> = decode_items(raw, "test item");
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 3]);
    }
}
