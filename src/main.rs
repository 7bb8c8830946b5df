//! sourcewatch binary entrypoint.
//! Opens the store, seeds sources from the sources file, then either refreshes
//! everything once (`RUN_ONCE=1`) or keeps refreshing on an interval.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sourcewatch::config::AppConfig;
use sourcewatch::ingest::config::load_sources_default;
use sourcewatch::ingest::http::ReqwestFetcher;
use sourcewatch::ingest::scheduler::spawn_scheduler;
use sourcewatch::ingest::IngestionRunner;
use sourcewatch::store::{SourceStore, SqliteStore};

/// Compact text logs by default, JSON lines with `LOG_FORMAT=json`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("sourcewatch=info,ingest=info,warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn open_store(cfg: &AppConfig) -> Result<SqliteStore> {
    if cfg.database_path.as_os_str() == ":memory:" {
        return SqliteStore::open_in_memory().context("opening in-memory store");
    }
    if let Some(dir) = cfg.database_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    SqliteStore::open(&cfg.database_path)
        .with_context(|| format!("opening {}", cfg.database_path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env()?;
    if let Some(addr) = cfg.metrics_addr {
        sourcewatch::metrics::install_exporter(addr)?;
    }

    let store = Arc::new(open_store(&cfg)?);
    let specs = load_sources_default()?;
    for spec in &specs {
        store
            .upsert_source(&spec.to_new_source())
            .with_context(|| format!("seeding source {:?}", spec.name))?;
    }
    tracing::info!(seeded = specs.len(), total = store.list_sources()?.len(), "sources ready");

    let http = Arc::new(ReqwestFetcher::new(cfg.http_timeout, &cfg.user_agent)?);
    let runner = Arc::new(IngestionRunner::new(store, http));

    if cfg.run_once {
        let results = runner.refresh_all().await?;
        for (name, r) in &results {
            tracing::info!(source = %name, status = %r.status(), "refreshed");
        }
        return Ok(());
    }

    let handle = spawn_scheduler(Arc::clone(&runner), cfg.refresh_interval);
    tracing::info!(every_secs = cfg.refresh_interval.as_secs(), "scheduler started");
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    handle.abort();
    tracing::info!("shutting down");
    Ok(())
}
