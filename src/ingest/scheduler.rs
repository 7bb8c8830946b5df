// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::ingest::IngestionRunner;
use crate::store::{PostStore, SourceStore};

/// Spawn a background loop that refreshes every auto-fetch source on each tick.
/// The first tick fires immediately.
pub fn spawn_scheduler<S>(runner: Arc<IngestionRunner<S>>, interval: Duration) -> JoinHandle<()>
where
    S: PostStore + SourceStore + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match runner.refresh_all().await {
                Ok(results) => {
                    let failed = results.iter().filter(|(_, r)| !r.is_ok()).count();
                    let created: usize = results.iter().map(|(_, r)| r.new_count).sum();
                    tracing::info!(
                        target: "ingest",
                        sources = results.len(),
                        failed,
                        created,
                        "ingest tick"
                    );
                }
                Err(e) => tracing::error!(target: "ingest", error = %e, "could not list sources"),
            }
        }
    })
}
