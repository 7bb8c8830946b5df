// src/ingest/scoring.rs
//! Shared pieces of the per-adapter priority formulas.

use chrono::{DateTime, Utc};

/// Keywords that mark an item as developer-relevant. Each match adds a small bonus.
pub const DEV_KEYWORDS: &[&str] = &[
    "rust",
    "python",
    "javascript",
    "typescript",
    "golang",
    "programming",
    "developer",
    "open source",
    "framework",
    "library",
    "database",
    "compiler",
    "machine learning",
    "pytorch",
    "kubernetes",
    "docker",
    "linux",
    "github",
    "llm",
    "webassembly",
];

/// Fractional hours between `then` and `now`; never negative.
pub fn hours_since(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let secs = now.signed_duration_since(then).num_seconds().max(0);
    secs as f64 / 3600.0
}

/// `max(window - hoursOld, 0) * weight`; no timestamp means no bonus.
pub fn recency_bonus(
    then: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window_hours: f64,
    weight: f64,
) -> f64 {
    match then {
        Some(t) => (window_hours - hours_since(t, now)).max(0.0) * weight,
        None => 0.0,
    }
}

/// Number of [`DEV_KEYWORDS`] contained in `text` (case-insensitive).
pub fn dev_keyword_matches(text: &str) -> usize {
    let lower = text.to_lowercase();
    DEV_KEYWORDS.iter().filter(|k| lower.contains(*k)).count()
}

/// Case-insensitive "contains any" over already-lowercased `lower`.
pub fn contains_any(lower: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| lower.contains(n))
}

/// Keyword filter shared by feed-like adapters: empty list keeps everything.
pub fn matches_keywords(keywords: &[String], haystacks: &[&str]) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let text = haystacks.join(" ").to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .any(|k| text.contains(&k))
}

/// Lowercase and read `-`/`_` as spaces so `good-first-issue` equals `Good First Issue`.
pub fn normalize_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .replace(['-', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Case-insensitive membership in a configured list.
pub fn in_list(value: &str, list: &[String]) -> bool {
    let v = normalize_label(value);
    !v.is_empty() && list.iter().any(|x| normalize_label(x) == v)
}
