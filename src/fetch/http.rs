//! Plain HTTP fetch strategy
//!
//! A pooled async client shared across workers. Page-level fetches require
//! an HTML content type; sitemap, feed, and robots downloads go through the
//! same client but skip that gate.

use crate::config::UserAgentConfig;
use crate::fetch::FetchStrategy;
use crate::page::{FetchedPage, ScraperUrl};
use crate::{Result, SkimmerError};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Builds the crawl-wide HTTP client
///
/// User agent format: `CrawlerName/Version (+ContactURL; ContactEmail)`.
/// Connection pooling is the client's; concurrency is bounded implicitly by
/// the worker count.
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client> {
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()?)
}

/// Fetch strategy backed by the pooled HTTP client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchStrategy for HttpFetcher {
    async fn fetch(&self, target: &ScraperUrl) -> Result<Option<FetchedPage>> {
        let url = target.normalized.as_str();

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                SkimmerError::Timeout {
                    url: url.to_string(),
                }
            } else {
                SkimmerError::Http {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::info!(url, status = status.as_u16(), "Skipping non-2xx response");
            return Ok(None);
        }

        let headers = header_map(&response);

        // Page fetches only accept HTML; anything else is someone's PDF or
        // image that slipped past the link filter
        let html = headers
            .get("content-type")
            .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("text/html"))
            .unwrap_or(false);
        if !html {
            tracing::info!(
                url,
                content_type = headers.get("content-type").map(String::as_str).unwrap_or("<none>"),
                "Skipping non-HTML content type"
            );
            return Ok(None);
        }

        let status = status.as_u16();
        let body = response.bytes().await.map_err(|e| SkimmerError::Http {
            url: url.to_string(),
            source: e,
        })?;

        Ok(Some(FetchedPage::new(
            target,
            status,
            headers,
            body.to_vec(),
        )))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Copies response headers into an owned map with lowercased names.
fn header_map(response: &reqwest::Response) -> HashMap<String, String> {
    response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}
