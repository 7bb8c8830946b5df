// src/config.rs
//! Process-level settings read from the environment (after `.env`).

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::ingest::http::DEFAULT_USER_AGENT;

pub const DEFAULT_DATABASE_PATH: &str = "data/sourcewatch.db";
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 900;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// SQLite file, or `:memory:`.
    pub database_path: PathBuf,
    pub refresh_interval: Duration,
    /// Clamped to 5..=60 seconds.
    pub http_timeout: Duration,
    pub user_agent: String,
    /// Prometheus listener; metrics are recorded but not exported when unset.
    pub metrics_addr: Option<SocketAddr>,
    /// Refresh every source once and exit instead of scheduling.
    pub run_once: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            refresh_interval: Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            metrics_addr: None,
            run_once: false,
        }
    }
}

fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let mut cfg = AppConfig::default();
        if let Some(p) = var("DATABASE_PATH") {
            cfg.database_path = PathBuf::from(p);
        }
        if let Some(v) = var("REFRESH_INTERVAL_SECS") {
            let secs: u64 = v
                .parse()
                .with_context(|| format!("REFRESH_INTERVAL_SECS must be a number, got {v:?}"))?;
            cfg.refresh_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(v) = var("HTTP_TIMEOUT_SECS") {
            let secs: u64 = v
                .parse()
                .with_context(|| format!("HTTP_TIMEOUT_SECS must be a number, got {v:?}"))?;
            cfg.http_timeout = Duration::from_secs(secs.clamp(5, 60));
        }
        if let Some(ua) = var("HTTP_USER_AGENT") {
            cfg.user_agent = ua;
        }
        if let Some(addr) = var("METRICS_ADDR") {
            cfg.metrics_addr = Some(
                addr.parse()
                    .with_context(|| format!("METRICS_ADDR is not a socket address: {addr:?}"))?,
            );
        }
        cfg.run_once = var("RUN_ONCE").is_some_and(|v| parse_flag(&v));
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    const VARS: &[&str] = &[
        "DATABASE_PATH",
        "REFRESH_INTERVAL_SECS",
        "HTTP_TIMEOUT_SECS",
        "HTTP_USER_AGENT",
        "METRICS_ADDR",
        "RUN_ONCE",
    ];

    fn clear() {
        for v in VARS {
            env::remove_var(v);
        }
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        clear();
        assert_eq!(AppConfig::from_env().unwrap(), AppConfig::default());
    }

    #[test]
    #[serial]
    fn env_overrides_and_clamps() {
        clear();
        env::set_var("DATABASE_PATH", ":memory:");
        env::set_var("HTTP_TIMEOUT_SECS", "600");
        env::set_var("METRICS_ADDR", "127.0.0.1:9000");
        env::set_var("RUN_ONCE", "true");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.database_path, PathBuf::from(":memory:"));
        assert_eq!(cfg.http_timeout, Duration::from_secs(60));
        assert_eq!(cfg.metrics_addr, Some("127.0.0.1:9000".parse().unwrap()));
        assert!(cfg.run_once);

        env::set_var("HTTP_TIMEOUT_SECS", "1");
        assert_eq!(AppConfig::from_env().unwrap().http_timeout, Duration::from_secs(5));

        env::set_var("REFRESH_INTERVAL_SECS", "soon");
        assert!(AppConfig::from_env().is_err());
        clear();
    }
}
