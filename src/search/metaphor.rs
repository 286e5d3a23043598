//! Typed client for the Metaphor search API.
//!
//! Covers the three endpoints the assistant uses: semantic search, content
//! fetch by document id, and similar-document lookup by URL.

use crate::error::{ReseptError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.metaphor.systems";

/// Request timeout for API calls.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// One ranked document from search or find-similar.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub published_date: Option<String>,
}

/// Full text content for a document id.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub extract: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    contents: Vec<Document>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    query: &'a str,
    num_results: usize,
    use_autoprompt: bool,
}

#[derive(Debug, Serialize)]
struct ContentsRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FindSimilarRequest<'a> {
    url: &'a str,
    num_results: usize,
}

/// Metaphor API client.
pub struct MetaphorClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl MetaphorClient {
    /// Create a client with the given API key against the default base URL.
    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client against a specific base URL.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Semantic search for documents matching a query.
    pub async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        debug!("Metaphor search: {}", query);
        let response: SearchResponse = self
            .post(
                "/search",
                &SearchRequest {
                    query,
                    num_results,
                    use_autoprompt: true,
                },
            )
            .await?;
        Ok(response.results)
    }

    /// Fetch full text contents for previously returned document ids.
    pub async fn contents(&self, ids: &[String]) -> Result<Vec<Document>> {
        debug!("Metaphor contents: {} id(s)", ids.len());
        let response: ContentsResponse = self.post("/contents", &ContentsRequest { ids }).await?;
        Ok(response.contents)
    }

    /// Find documents similar to a given URL.
    pub async fn find_similar(&self, url: &str, num_results: usize) -> Result<Vec<SearchResult>> {
        debug!("Metaphor find_similar: {}", url);
        let response: SearchResponse = self
            .post("/findSimilar", &FindSimilarRequest { url, num_results })
            .await?;
        Ok(response.results)
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("x-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ReseptError::Search(format!(
                "Metaphor API returned HTTP {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            )));
        }

        Ok(response.json().await?)
    }
}
