// src/source.rs
//! Configured upstreams and their status vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Upstream kind as stored on a source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Github,
    GithubTrending,
    Reddit,
    Rss,
    Discourse,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Github => "github",
            SourceType::GithubTrending => "github_trending",
            SourceType::Reddit => "reddit",
            SourceType::Rss => "rss",
            SourceType::Discourse => "discourse",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Some(SourceType::Github),
            "github_trending" => Some(SourceType::GithubTrending),
            "reddit" => Some(SourceType::Reddit),
            "rss" => Some(SourceType::Rss),
            "discourse" => Some(SourceType::Discourse),
            _ => None,
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    /// Display name; also the `Post::source` join key.
    pub name: String,
    pub source_type: SourceType,
    pub url: Option<String>,
    /// Raw JSON blob with per-type options. See [`Source::config_hash`].
    pub config: String,
    pub active: bool,
    pub auto_fetch_enabled: bool,
    pub last_fetched_at: Option<DateTime<Utc>>,
    /// Boundary-formatted status ("ok", "ok (3 new)", "error: ...", "refreshing...").
    pub status: Option<String>,
}

impl Source {
    /// Parsed config object. Malformed JSON (or JSON that is not an object)
    /// degrades to `{}` with a warning.
    pub fn config_hash(&self) -> Map<String, Value> {
        parse_config(&self.name, &self.config)
    }

    /// Typed view of the status column.
    pub fn status(&self) -> Option<SourceStatus> {
        self.status.as_deref().and_then(SourceStatus::parse)
    }

    pub fn url_str(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }
}

fn parse_config(source_name: &str, raw: &str) -> Map<String, Value> {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::warn!(
                target: "ingest",
                source = source_name,
                kind = json_kind(&other),
                "source config is not a JSON object, using {{}}"
            );
            Map::new()
        }
        Err(e) => {
            tracing::warn!(target: "ingest", source = source_name, error = %e, "malformed source config, using {{}}");
            Map::new()
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Fields needed to create or refresh a source row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSource {
    pub name: String,
    pub source_type: SourceType,
    pub url: Option<String>,
    pub config: String,
    pub active: bool,
    pub auto_fetch_enabled: bool,
}

impl NewSource {
    pub fn new(name: impl Into<String>, source_type: SourceType, url: Option<&str>) -> Self {
        Self {
            name: name.into(),
            source_type,
            url: url.map(str::to_string),
            config: "{}".to_string(),
            active: true,
            auto_fetch_enabled: true,
        }
    }

    pub fn with_config(mut self, config: impl Into<String>) -> Self {
        self.config = config.into();
        self
    }
}

/// Outcome of the last ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Refreshing,
    Ok { new_count: usize },
    Error { message: String },
}

impl SourceStatus {
    pub fn error(message: impl fmt::Display) -> Self {
        SourceStatus::Error {
            message: message.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SourceStatus::Error { .. })
    }

    /// Inverse of `Display`. Unknown strings yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        if s == "refreshing..." {
            return Some(SourceStatus::Refreshing);
        }
        if s == "ok" {
            return Some(SourceStatus::Ok { new_count: 0 });
        }
        if let Some(rest) = s.strip_prefix("ok (") {
            let n = rest.strip_suffix(" new)")?.parse().ok()?;
            return Some(SourceStatus::Ok { new_count: n });
        }
        s.strip_prefix("error: ").map(|m| SourceStatus::Error {
            message: m.to_string(),
        })
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Refreshing => f.write_str("refreshing..."),
            SourceStatus::Ok { new_count: 0 } => f.write_str("ok"),
            SourceStatus::Ok { new_count } => write!(f, "ok ({new_count} new)"),
            SourceStatus::Error { message } => write!(f, "error: {message}"),
        }
    }
}
