// src/ingest/config.rs
//! Sources file loading and typed per-adapter config.

use anyhow::{anyhow, Context, Result};
use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::source::{NewSource, Source, SourceType};

const ENV_PATH: &str = "SOURCES_CONFIG_PATH";

/// One `[[sources]]` entry of the sources file.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub url: Option<String>,
    /// Table/object, or a raw JSON string stored verbatim.
    #[serde(default)]
    pub config: Value,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default = "default_true")]
    pub auto_fetch_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl SourceSpec {
    pub fn to_new_source(&self) -> NewSource {
        let config = match &self.config {
            Value::Null => "{}".to_string(),
            Value::String(raw) => raw.clone(),
            other => other.to_string(),
        };
        NewSource {
            name: self.name.trim().to_string(),
            source_type: self.source_type,
            url: self
                .url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            config,
            active: self.active,
            auto_fetch_enabled: self.auto_fetch_enabled,
        }
    }
}

/// Load source specs from an explicit path. Supports TOML or JSON formats.
pub fn load_sources_from(path: &Path) -> Result<Vec<SourceSpec>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading sources from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_sources(&content, ext.as_str())
}

/// Load source specs using env var + fallbacks:
/// 1) $SOURCES_CONFIG_PATH
/// 2) config/sources.toml
/// 3) config/sources.json
pub fn load_sources_default() -> Result<Vec<SourceSpec>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_sources_from(&pb);
        } else {
            return Err(anyhow!("SOURCES_CONFIG_PATH points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/sources.toml");
    if toml_p.exists() {
        return load_sources_from(&toml_p);
    }
    let json_p = PathBuf::from("config/sources.json");
    if json_p.exists() {
        return load_sources_from(&json_p);
    }
    Ok(Vec::new())
}

fn parse_sources(s: &str, hint_ext: &str) -> Result<Vec<SourceSpec>> {
    match hint_ext {
        "toml" => parse_toml(s),
        "json" => parse_json(s),
        // `[[sources]]` also opens with `[`, so try JSON first, then TOML.
        _ => parse_json(s).or_else(|json_err| {
            parse_toml(s).map_err(|toml_err| {
                anyhow!("unsupported sources format (JSON: {json_err:#}; TOML: {toml_err:#})")
            })
        }),
    }
}

fn parse_toml(s: &str) -> Result<Vec<SourceSpec>> {
    #[derive(Deserialize)]
    struct SourcesFile {
        #[serde(default)]
        sources: Vec<SourceSpec>,
    }
    let v: SourcesFile = toml::from_str(s).context("parsing sources TOML")?;
    clean_list(v.sources)
}

fn parse_json(s: &str) -> Result<Vec<SourceSpec>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SourcesJson {
        List(Vec<SourceSpec>),
        Wrapped { sources: Vec<SourceSpec> },
    }
    let v: SourcesJson = serde_json::from_str(s).context("parsing sources JSON")?;
    clean_list(match v {
        SourcesJson::List(l) => l,
        SourcesJson::Wrapped { sources } => sources,
    })
}

/// Drop blank names; duplicate names are a configuration error.
fn clean_list(items: Vec<SourceSpec>) -> Result<Vec<SourceSpec>> {
    use std::collections::BTreeSet;
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(items.len());
    for it in items {
        let name = it.name.trim().to_string();
        if name.is_empty() {
            tracing::warn!(target: "ingest", "source without a name skipped");
            continue;
        }
        if !seen.insert(name.clone()) {
            return Err(anyhow!("duplicate source name {name:?}"));
        }
        out.push(it);
    }
    Ok(out)
}

/* ----------------------------
Typed adapter config
---------------------------- */

/// Build an adapter config from a source's opaque JSON. Malformed JSON or
/// wrongly typed keys degrade to `T::default()` with a warning.
pub fn adapter_config<T: DeserializeOwned + Default>(source: &Source) -> T {
    let map = source.config_hash();
    match serde_json::from_value(Value::Object(map)) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(
                target: "ingest",
                source = %source.name,
                error = %e,
                "invalid source config, using defaults"
            );
            T::default()
        }
    }
}

/// Accepts `["a", "b"]`, `"a, b"` or `null`.
pub fn string_list<'de, D>(d: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        Many(Vec<String>),
        One(String),
        Nothing(()),
    }
    let items = match OneOrMany::deserialize(d)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(s) => s.split(',').map(str::to_string).collect(),
        OneOrMany::Nothing(()) => Vec::new(),
    };
    Ok(items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect())
}

/// Accepts a native value or its string form (`30` or `"30"`, `true` or `"true"`).
pub fn lenient<'de, D, T>(d: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + FromStr,
{
    use serde::de::Error;
    match Value::deserialize(d)? {
        Value::Null => Ok(None),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("cannot parse {s:?}"))),
        other => serde_json::from_value(other).map(Some).map_err(D::Error::custom),
    }
}
