// src/ingest/providers/rss.rs
//! RSS 2.0 and Atom feeds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;

use crate::error::IngestError;
use crate::ingest::config::{adapter_config, lenient, string_list};
use crate::ingest::http::{fetch_text, HttpFetcher, HttpRequest};
use crate::ingest::scoring::{contains_any, dev_keyword_matches, matches_keywords, recency_bonus};
use crate::ingest::types::{AdapterKind, SourceAdapter};
use crate::ingest::{clean_text, truncate, SUMMARY_MAX_CHARS, TITLE_MAX_CHARS};
use crate::post::PostAttributes;
use crate::source::Source;

const DEFAULT_MAX_ITEMS: usize = 50;

static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("entity regex"));

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RssConfig {
    #[serde(deserialize_with = "string_list")]
    pub keywords: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub max_items: Option<usize>,
}

/// Format-independent feed entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    pub id: Option<String>,
    pub title: String,
    pub link: Option<String>,
    pub summary: String,
    pub author: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

impl FeedEntry {
    /// guid/id, else link, else md5 of title + url. The adapter stores
    /// link-less entries under the feed URL, so the md5 form is what keeps
    /// them apart.
    pub fn external_id(&self) -> String {
        if let Some(id) = self.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return id.to_string();
        }
        let url = self.link.as_deref().map(str::trim).unwrap_or_default();
        if !url.is_empty() {
            return url.to_string();
        }
        format!("{:x}", md5::compute(format!("{}{}", self.title, url)))
    }
}

/* ----------------------------
XML shapes
---------------------------- */

#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

fn text(node: Option<TextNode>) -> Option<String> {
    node.map(|n| n.value.trim().to_string()).filter(|s| !s.is_empty())
}

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    #[serde(default)]
    title: Option<TextNode>,
    #[serde(default)]
    link: Option<TextNode>,
    #[serde(default)]
    guid: Option<TextNode>,
    #[serde(default)]
    description: Option<TextNode>,
    #[serde(default)]
    author: Option<TextNode>,
    #[serde(rename = "dc:creator", alias = "creator", default)]
    creator: Option<TextNode>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href", default)]
    href: String,
    #[serde(rename = "@rel", default)]
    rel: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomAuthor {
    #[serde(default)]
    name: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    #[serde(default)]
    id: Option<TextNode>,
    #[serde(default)]
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    #[serde(default)]
    summary: Option<TextNode>,
    #[serde(default)]
    content: Option<TextNode>,
    #[serde(default)]
    author: Option<AtomAuthor>,
    #[serde(default)]
    published: Option<TextNode>,
    #[serde(default)]
    updated: Option<TextNode>,
}

fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc2822(s)
        .or_else(|_| DateTime::parse_from_rfc3339(s))
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// HTML named entities are not valid XML; rewrite them as numeric references.
fn scrub_entities(xml: &str) -> String {
    ENTITY_RE
        .replace_all(xml, |caps: &regex::Captures| {
            let name = &caps[1];
            if matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
                return caps[0].to_string();
            }
            let decoded = html_escape::decode_html_entities(&caps[0]);
            if decoded == caps[0] {
                // unknown entity: escape the ampersand
                return format!("&amp;{name};");
            }
            decoded.chars().map(|c| format!("&#{};", c as u32)).collect()
        })
        .into_owned()
}

fn is_atom(xml: &str) -> bool {
    let feed = xml.find("<feed");
    let rss = xml.find("<rss").or_else(|| xml.find("<channel"));
    match (feed, rss) {
        (Some(f), Some(r)) => f < r,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Parse an RSS 2.0 or Atom document into entries.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedEntry>, IngestError> {
    let xml = scrub_entities(xml);
    if is_atom(&xml) {
        let feed: AtomFeed =
            from_str(&xml).map_err(|e| IngestError::format("malformed Atom feed", e.to_string()))?;
        return Ok(feed.entries.into_iter().map(atom_entry).collect());
    }
    let rss: Rss =
        from_str(&xml).map_err(|e| IngestError::format("malformed RSS feed", e.to_string()))?;
    Ok(rss.channel.items.into_iter().map(rss_item).collect())
}

fn rss_item(it: RssItem) -> FeedEntry {
    FeedEntry {
        id: text(it.guid),
        title: text(it.title).unwrap_or_default(),
        link: text(it.link),
        summary: text(it.description).unwrap_or_default(),
        author: text(it.author).or_else(|| text(it.creator)),
        published: text(it.pub_date).as_deref().and_then(parse_date),
    }
}

fn atom_entry(e: AtomEntry) -> FeedEntry {
    let link = e
        .links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| e.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|h| !h.is_empty());
    FeedEntry {
        id: text(e.id),
        title: text(e.title).unwrap_or_default(),
        link,
        summary: text(e.summary).or_else(|| text(e.content)).unwrap_or_default(),
        author: e.author.and_then(|a| text(a.name)),
        published: text(e.published)
            .or_else(|| text(e.updated))
            .as_deref()
            .and_then(parse_date),
    }
}

pub struct RssAdapter {
    url: String,
    cfg: RssConfig,
}

impl RssAdapter {
    pub fn from_source(source: &Source) -> Result<Self, IngestError> {
        let url = source.url_str().trim();
        if url.is_empty() {
            return Err(IngestError::InvalidSource("missing feed URL".into()));
        }
        Ok(Self {
            url: url.to_string(),
            cfg: adapter_config(source),
        })
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    type Item = FeedEntry;

    fn kind(&self) -> AdapterKind {
        AdapterKind::Rss
    }

    async fn fetch_items(
        &self,
        http: &dyn HttpFetcher,
        _now: DateTime<Utc>,
    ) -> Result<Vec<FeedEntry>, IngestError> {
        let req = HttpRequest::get(self.url.clone()).header(
            "Accept",
            "application/rss+xml, application/atom+xml, application/xml;q=0.9, */*;q=0.8",
        );
        let body = fetch_text(http, &req).await?;
        let entries = parse_feed(&body)?;
        let max = self.cfg.max_items.unwrap_or(DEFAULT_MAX_ITEMS);
        Ok(entries
            .into_iter()
            .filter(|e| matches_keywords(&self.cfg.keywords, &[&e.title, &e.summary]))
            .take(max)
            .collect())
    }

    fn to_post_attributes(&self, item: &FeedEntry) -> Result<(String, PostAttributes), IngestError> {
        let attrs = PostAttributes {
            title: truncate(&clean_text(&item.title), TITLE_MAX_CHARS),
            url: item
                .link
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or(self.url.as_str())
                .to_string(),
            author: item.author.clone().unwrap_or_default(),
            posted_at: item.published,
            summary: truncate(&clean_text(&item.summary), SUMMARY_MAX_CHARS),
            tags: Vec::new(),
            priority_score: 0.0,
        };
        Ok((item.external_id(), attrs))
    }

    fn score(&self, item: &FeedEntry, now: DateTime<Utc>) -> f64 {
        let summary = clean_text(&item.summary);
        let text = format!("{} {}", item.title, summary).to_lowercase();

        let mut score = recency_bonus(item.published, now, 10.0, 0.5);
        score += 0.5 * dev_keyword_matches(&text) as f64;
        if summary.chars().count() > 100 {
            score += 1.0;
        }
        if contains_any(&text, &["tutorial", "guide", "how-to", "how to"]) {
            score += 2.0;
        }
        if contains_any(&text, &["release", "version", "update"]) {
            score += 1.5;
        }
        score
    }
}
