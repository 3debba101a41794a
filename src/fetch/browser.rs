//! Headless-browser fetch strategy
//!
//! Delegates rendering to an external browser service (a Browserless-style
//! HTTP API). Sessions are pooled: a fixed number are created up front and
//! each fetch checks one out and returns it, so concurrent renders never
//! exceed the pool capacity regardless of the worker count.

use crate::config::BrowserConfig;
use crate::fetch::FetchStrategy;
use crate::page::{FetchedPage, ScraperUrl};
use crate::{Result, SkimmerError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// One connection to the rendering service
///
/// Holds its own HTTP client so that render traffic does not compete with
/// the crawl client's connection pool.
pub struct BrowserSession {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl BrowserSession {
    fn new(config: &BrowserConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    fn service_url(&self, path: &str) -> String {
        match &self.token {
            Some(token) => format!("{}{}?token={}", self.endpoint, path, token),
            None => format!("{}{}", self.endpoint, path),
        }
    }

    /// Navigates and returns the fully rendered page source.
    pub async fn content(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .post(self.service_url("/content"))
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SkimmerError::Browser(format!(
                "content render failed ({}): {}",
                status, message
            )));
        }

        Ok(response.text().await?)
    }

    /// Text of the currently rendered, visible DOM nodes
    ///
    /// Computed in the browser, not from the page source, so text hidden by
    /// scripts or styles at render time is absent.
    pub async fn visible_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .post(self.service_url("/scrape"))
            .json(&serde_json::json!({
                "url": url,
                "elements": [ { "selector": "body" } ],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SkimmerError::Browser(format!(
                "scrape failed ({}): {}",
                status, message
            )));
        }

        let payload: serde_json::Value = response.json().await?;
        Ok(collect_scraped_text(&payload))
    }
}

/// Joins the text results of a scrape response with line breaks.
fn collect_scraped_text(payload: &serde_json::Value) -> String {
    let mut parts = Vec::new();
    if let Some(elements) = payload.get("data").and_then(|d| d.as_array()) {
        for element in elements {
            if let Some(results) = element.get("results").and_then(|r| r.as_array()) {
                for result in results {
                    if let Some(text) = result.get("text").and_then(|t| t.as_str()) {
                        let text = text.trim();
                        if !text.is_empty() {
                            parts.push(text.to_string());
                        }
                    }
                }
            }
        }
    }
    parts.join("\n")
}

/// Fixed-capacity pool of reusable browser sessions
pub struct BrowserPool {
    sessions: Mutex<Vec<BrowserSession>>,
    capacity: Arc<Semaphore>,
}

impl BrowserPool {
    pub fn new(config: &BrowserConfig, timeout: Duration) -> Result<Self> {
        let pool_size = config.pool_size.max(1) as usize;
        let mut sessions = Vec::with_capacity(pool_size);
        for _ in 0..pool_size {
            sessions.push(BrowserSession::new(config, timeout)?);
        }
        Ok(Self {
            sessions: Mutex::new(sessions),
            capacity: Arc::new(Semaphore::new(pool_size)),
        })
    }

    /// Checks a session out of `pool`; waits when the pool is exhausted.
    pub async fn checkout(pool: &Arc<Self>) -> PooledSession {
        let permit = Arc::clone(&pool.capacity)
            .acquire_owned()
            .await
            .expect("browser pool semaphore closed");
        let session = pool
            .sessions
            .lock()
            .expect("browser pool lock poisoned")
            .pop()
            .expect("session available whenever a permit is held");
        PooledSession {
            pool: Arc::clone(pool),
            session: Some(session),
            _permit: permit,
        }
    }

    fn put_back(&self, session: BrowserSession) {
        self.sessions
            .lock()
            .expect("browser pool lock poisoned")
            .push(session);
    }
}

/// A checked-out session; returns itself to the pool on drop
pub struct PooledSession {
    pool: Arc<BrowserPool>,
    session: Option<BrowserSession>,
    _permit: OwnedSemaphorePermit,
}

impl std::ops::Deref for PooledSession {
    type Target = BrowserSession;

    fn deref(&self) -> &BrowserSession {
        self.session.as_ref().expect("session present until drop")
    }
}

impl Drop for PooledSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.put_back(session);
        }
    }
}

/// Fetch strategy that renders pages through the browser pool
pub struct BrowserFetcher {
    pool: Arc<BrowserPool>,
}

impl BrowserFetcher {
    pub fn new(config: &BrowserConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            pool: Arc::new(BrowserPool::new(config, timeout)?),
        })
    }
}

#[async_trait]
impl FetchStrategy for BrowserFetcher {
    async fn fetch(&self, target: &ScraperUrl) -> Result<Option<FetchedPage>> {
        let url = target.normalized.as_str();
        let session = BrowserPool::checkout(&self.pool).await;

        let html = session.content(url).await?;
        if html.trim().is_empty() {
            tracing::info!(url, "Browser returned empty page source");
            return Ok(None);
        }

        // Visible text is best-effort: when the scrape fails the extractor
        // falls back to computing text from the page source
        let visible_text = match session.visible_text(url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(url, error = %e, "Visible-text scrape failed, will derive from source");
                String::new()
            }
        };

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());

        let mut page = FetchedPage::new(target, 200, headers, html.into_bytes());
        page.visible_text = visible_text;
        Ok(Some(page))
    }

    fn name(&self) -> &str {
        "browser"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(endpoint: &str, pool_size: u32) -> BrowserConfig {
        BrowserConfig {
            endpoint: endpoint.to_string(),
            pool_size,
            token: None,
        }
    }

    #[test]
    fn test_collect_scraped_text() {
        let payload = serde_json::json!({
            "data": [
                { "selector": "body", "results": [ { "text": " First block " }, { "text": "Second" } ] }
            ]
        });
        assert_eq!(collect_scraped_text(&payload), "First block\nSecond");
    }

    #[test]
    fn test_collect_scraped_text_empty_payload() {
        assert_eq!(collect_scraped_text(&serde_json::json!({})), "");
    }

    #[test]
    fn test_service_url_with_token() {
        let mut config = test_config("http://localhost:3000/", 1);
        config.token = Some("secret".to_string());
        let session = BrowserSession::new(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(
            session.service_url("/content"),
            "http://localhost:3000/content?token=secret"
        );
    }

    #[tokio::test]
    async fn test_pool_checkout_never_exceeds_capacity() {
        let config = test_config("http://localhost:3000", 2);
        let pool = Arc::new(BrowserPool::new(&config, Duration::from_secs(5)).unwrap());

        let first = BrowserPool::checkout(&pool).await;
        let second = BrowserPool::checkout(&pool).await;

        // Pool of two: a third checkout must block until one is returned
        let third =
            tokio::time::timeout(Duration::from_millis(50), BrowserPool::checkout(&pool)).await;
        assert!(third.is_err());

        drop(first);
        let third =
            tokio::time::timeout(Duration::from_millis(500), BrowserPool::checkout(&pool)).await;
        assert!(third.is_ok());
        drop(second);
    }

    #[tokio::test]
    async fn test_rendered_fetch_against_mock_service() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/content"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>rendered</p></body></html>"),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/scrape"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [ { "selector": "body", "results": [ { "text": "rendered" } ] } ]
            })))
            .mount(&server)
            .await;

        let fetcher =
            BrowserFetcher::new(&test_config(&server.uri(), 1), Duration::from_secs(5)).unwrap();
        let target = ScraperUrl::parse("https://site.test/page", 0).unwrap();

        let page = fetcher.fetch(&target).await.unwrap().unwrap();
        assert!(page.body_text().contains("rendered"));
        assert_eq!(page.visible_text, "rendered");
    }
}
