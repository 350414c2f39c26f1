//! Web search via SearXNG

use super::{SearchService, WebHit};
use crate::error::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

pub struct SearxSearch {
    client: Client,
    searxng_url: String,
}

impl SearxSearch {
    /// Uses SEARXNG_URL, defaulting to a local instance
    pub fn new() -> Self {
        let searxng_url =
            std::env::var("SEARXNG_URL").unwrap_or_else(|_| "http://localhost:8082".to_string());
        Self::with_url(&searxng_url)
    }

    pub fn with_url(url: &str) -> Self {
        Self {
            client: Client::new(),
            searxng_url: url.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for SearxSearch {
    fn default() -> Self {
        Self::new()
    }
}

// SearXNG response types
#[derive(Debug, Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
    #[serde(default)]
    infoboxes: Vec<Infobox>,
}

#[derive(Debug, Deserialize)]
struct SearxResult {
    url: String,
    title: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Infobox {
    infobox: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    content: String,
}

impl SearxResponse {
    fn into_hits(self, limit: usize) -> Vec<WebHit> {
        let infoboxes = self.infoboxes.into_iter().map(|b| WebHit {
            title: b.infobox,
            url: b.id,
            description: b.content,
        });
        let results = self.results.into_iter().map(|r| WebHit {
            title: r.title,
            url: r.url,
            description: r.content,
        });
        infoboxes.chain(results).take(limit).collect()
    }
}

#[async_trait]
impl SearchService for SearxSearch {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<WebHit>, ServiceError> {
        let response = self
            .client
            .get(format!("{}/search", self.searxng_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::Upstream(format!(
                "Search failed: {}",
                response.status()
            )));
        }

        let data: SearxResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Upstream(format!("Failed to parse response: {}", e)))?;

        let hits = data.into_hits(limit);
        debug!(query, hits = hits.len(), "SearXNG search");
        Ok(hits)
    }
}
