//! Generic web search via the DuckDuckGo HTML endpoint.
//!
//! The HTML endpoint needs no API key. Results are extracted from the result
//! anchors with regexes; this is intentionally tolerant of markup noise and
//! only pulls titles, target URLs, and snippets.

use crate::error::{ReseptError, Result};
use regex::Regex;
use std::time::Duration;
use tracing::debug;

/// Default endpoint for HTML search results.
const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Request timeout for search calls.
const REQUEST_TIMEOUT_SECS: u64 = 20;

/// A browser-like user agent; the endpoint rejects the reqwest default.
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

/// One ranked web search result.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Snippet {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// DuckDuckGo HTML search client.
pub struct DuckDuckGo {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGo {
    /// Create a client against the default endpoint.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
        })
    }

    /// Override the endpoint (used in tests against a local server).
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }

    /// Search the web, returning up to `limit` ranked snippets.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Snippet>> {
        debug!("Web search: {}", query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ReseptError::Search(format!(
                "Web search returned HTTP {}",
                response.status()
            )));
        }

        let html = response.text().await?;
        parse_results(&html, limit)
    }
}

/// Extract ranked results from the HTML endpoint's markup.
///
/// Each snippet is taken from the markup between its own result anchor and
/// the next, so a result without a snippet stays empty instead of stealing
/// the next result's text.
fn parse_results(html: &str, limit: usize) -> Result<Vec<Snippet>> {
    let anchor_re = Regex::new(
        r#"(?s)<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#,
    )
    .map_err(|e| ReseptError::Search(e.to_string()))?;
    let snippet_re =
        Regex::new(r#"(?s)<a[^>]*class="result__snippet"[^>]*>(.*?)</a>"#)
            .map_err(|e| ReseptError::Search(e.to_string()))?;

    let anchors: Vec<(usize, usize, String, String)> = anchor_re
        .captures_iter(html)
        .filter_map(|c| {
            let m = c.get(0)?;
            Some((m.start(), m.end(), c[1].to_string(), c[2].to_string()))
        })
        .collect();

    let mut results = Vec::new();
    for (i, (_, end, href, title)) in anchors.iter().enumerate() {
        if results.len() >= limit {
            break;
        }

        let url = resolve_redirect(href);
        if url.is_empty() {
            continue;
        }

        let block_end = anchors
            .get(i + 1)
            .map(|(start, ..)| *start)
            .unwrap_or(html.len());
        let snippet = snippet_re
            .captures(&html[*end..block_end])
            .map(|c| clean_fragment(&c[1]))
            .unwrap_or_default();

        results.push(Snippet {
            title: clean_fragment(title),
            url,
            snippet,
        });
    }

    Ok(results)
}

/// Unwrap the `uddg` redirect the endpoint wraps target URLs in.
fn resolve_redirect(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    if let Ok(parsed) = url::Url::parse(&absolute) {
        if parsed.path().starts_with("/l/") {
            if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
                return target.into_owned();
            }
        }
        return absolute;
    }

    String::new()
}

/// Strip tags and decode the handful of entities the endpoint emits.
fn clean_fragment(fragment: &str) -> String {
    let tag_re = Regex::new(r"<[^>]+>").expect("static regex");
    let text = tag_re.replace_all(fragment, "");

    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .trim()
        .to_string()
}
