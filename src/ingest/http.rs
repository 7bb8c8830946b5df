// src/ingest/http.rs
//! Outbound HTTP seam. Adapters only see [`HttpFetcher`]; production uses
//! `reqwest`, tests use [`FixtureFetcher`].

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::IngestError;

/// Redirect hops followed before a request fails.
pub const MAX_REDIRECTS: usize = 5;

pub const DEFAULT_USER_AGENT: &str = "sourcewatch/0.1 (personal dashboard ingest)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// URL after redirects.
    pub final_url: String,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpFetcher: Send + Sync {
    /// Perform a GET. Non-2xx responses are returned, not raised; see [`fetch_text`].
    async fn get(&self, req: &HttpRequest) -> Result<HttpResponse, IngestError>;
}

/// GET and require a 2xx status.
pub async fn fetch_text(http: &dyn HttpFetcher, req: &HttpRequest) -> Result<String, IngestError> {
    let resp = http.get(req).await?;
    if !resp.is_success() {
        return Err(IngestError::Transport(format!(
            "HTTP {} from {}",
            resp.status, req.url
        )));
    }
    Ok(resp.body)
}

/// GET, require 2xx and decode JSON.
pub async fn fetch_json<T: DeserializeOwned>(
    http: &dyn HttpFetcher,
    req: &HttpRequest,
    what: &str,
) -> Result<T, IngestError> {
    let body = fetch_text(http, req).await?;
    serde_json::from_str(&body).map_err(|e| IngestError::format(format!("malformed {what} JSON"), e))
}

/// `reqwest`-backed fetcher with bounded timeout and redirect cap.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| IngestError::Transport(format!("http client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, req: &HttpRequest) -> Result<HttpResponse, IngestError> {
        let mut builder = self.client.get(&req.url);
        for (k, v) in &req.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        let t0 = std::time::Instant::now();
        let resp = builder.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                "timed out"
            } else if e.is_redirect() {
                "too many redirects"
            } else {
                "request failed"
            };
            IngestError::Transport(format!("{kind}: {}", req.url))
        })?;
        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = resp
            .text()
            .await
            .map_err(|e| IngestError::Transport(format!("reading body of {}: {e}", req.url)))?;
        tracing::debug!(
            target: "ingest",
            url = %req.url,
            status,
            ms = t0.elapsed().as_millis() as u64,
            "http get"
        );
        Ok(HttpResponse {
            status,
            final_url,
            body,
        })
    }
}

// --- Test helper ---

/// Serves canned bodies keyed by URL and records every request.
///
/// Lookup tries the exact URL first, then the URL without its query string.
/// Unknown URLs fail with a transport error.
#[derive(Default)]
pub struct FixtureFetcher {
    routes: HashMap<String, (u16, String)>,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.routes.insert(url.into(), (200, body.into()));
        self
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        self.routes.insert(url.into(), (status, body.into()));
        self
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.iter().map(|q| q.url.clone()).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl HttpFetcher for FixtureFetcher {
    async fn get(&self, req: &HttpRequest) -> Result<HttpResponse, IngestError> {
        if let Ok(mut log) = self.requests.lock() {
            log.push(req.clone());
        }
        let without_query = req.url.split('?').next().unwrap_or_default();
        let (status, body) = self
            .routes
            .get(&req.url)
            .or_else(|| self.routes.get(without_query))
            .ok_or_else(|| IngestError::Transport(format!("request failed: {}", req.url)))?;
        Ok(HttpResponse {
            status: *status,
            final_url: req.url.clone(),
            body: body.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_lookup_falls_back_to_path() {
        let f = FixtureFetcher::new()
            .with("https://a.test/x", "plain")
            .with_status("https://a.test/gone", 404, "nope");
        let body = fetch_text(&f, &HttpRequest::get("https://a.test/x?page=2"))
            .await
            .unwrap();
        assert_eq!(body, "plain");

        let err = fetch_text(&f, &HttpRequest::get("https://a.test/gone"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "HTTP 404 from https://a.test/gone");

        assert!(f.get(&HttpRequest::get("https://b.test")).await.is_err());
        assert_eq!(f.requested_urls().len(), 3);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let r = HttpRequest::get("u").header("Api-Key", "k");
        assert_eq!(r.header_value("api-key"), Some("k"));
    }
}
