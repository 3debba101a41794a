//! Seed expansion: from configured seed descriptors to concrete crawl URLs
//!
//! An HTML seed is already a page. Sitemap and feed seeds are documents
//! that list pages: they are downloaded and expanded here, before the
//! scheduler sees anything. Expansion fails soft per seed; a malformed
//! document logs and contributes zero URLs.

pub mod feed;
pub mod sitemap;

pub use feed::FeedEntry;
pub use sitemap::{SitemapDocument, SitemapEntry};

use crate::config::SeedEntry;
use crate::page::ScraperUrl;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Sitemap indexes may nest; expansion stops at this depth to break cycles
pub const MAX_SITEMAP_RECURSION: u32 = 5;

/// What kind of document a seed URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedKind {
    /// A page to crawl directly
    Html,
    /// A sitemaps.org XML document
    Sitemap,
    /// An RSS or Atom feed
    Feed,
}

/// Turns seed descriptors into crawlable URLs
pub struct SeedExpander {
    client: Client,
    timeout: Duration,
}

impl SeedExpander {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Expands one configured seed into its concrete URLs.
    pub async fn expand(&self, seed: &SeedEntry) -> Vec<ScraperUrl> {
        let urls = match seed.kind {
            SeedKind::Html => match ScraperUrl::parse(&seed.url, seed.max_depth) {
                Ok(url) => vec![url],
                Err(e) => {
                    tracing::warn!(url = %seed.url, error = %e, "Skipping unparseable seed");
                    Vec::new()
                }
            },
            SeedKind::Sitemap => {
                self.expand_sitemap(&seed.url, seed.max_depth, MAX_SITEMAP_RECURSION)
                    .await
            }
            SeedKind::Feed => self.expand_feed(&seed.url, seed.max_depth).await,
        };

        urls.into_iter()
            .map(|mut url| {
                url.no_cache = seed.no_cache;
                url
            })
            .collect()
    }

    /// Expands a sitemap URL, recursing through index documents.
    pub async fn expand_sitemap(
        &self,
        sitemap_url: &str,
        page_depth: u32,
        recursion_left: u32,
    ) -> Vec<ScraperUrl> {
        let Some(body) = self.download(sitemap_url).await else {
            return Vec::new();
        };

        let Some(document) = sitemap::parse(&body) else {
            tracing::warn!(url = sitemap_url, "Document is not a sitemap, skipping");
            return Vec::new();
        };

        match document {
            SitemapDocument::UrlSet(entries) => {
                let mut urls = Vec::with_capacity(entries.len());
                for entry in entries {
                    match ScraperUrl::parse(&entry.loc, page_depth) {
                        Ok(url) => urls.push(url),
                        Err(e) => {
                            tracing::debug!(loc = %entry.loc, error = %e, "Skipping sitemap entry")
                        }
                    }
                }
                tracing::info!(url = sitemap_url, count = urls.len(), "Expanded sitemap");
                urls
            }
            SitemapDocument::Index(children) => {
                if recursion_left == 0 {
                    tracing::warn!(
                        url = sitemap_url,
                        "Sitemap index nesting limit reached, not descending"
                    );
                    return Vec::new();
                }
                let mut urls = Vec::new();
                for child in children {
                    let expanded = Box::pin(self.expand_sitemap(
                        &child,
                        page_depth,
                        recursion_left - 1,
                    ))
                    .await;
                    urls.extend(expanded);
                }
                urls
            }
        }
    }

    /// Expands a feed URL into the URLs of its entries.
    pub async fn expand_feed(&self, feed_url: &str, page_depth: u32) -> Vec<ScraperUrl> {
        let Some(body) = self.download(feed_url).await else {
            return Vec::new();
        };

        let entries = feed::parse(&body);
        let mut urls = Vec::with_capacity(entries.len());
        for entry in entries {
            match ScraperUrl::parse(&entry.link, page_depth) {
                Ok(url) => urls.push(url),
                Err(e) => tracing::debug!(link = %entry.link, error = %e, "Skipping feed entry"),
            }
        }
        tracing::info!(url = feed_url, count = urls.len(), "Expanded feed");
        urls
    }

    /// Downloads a seed document body; any failure logs and returns None.
    async fn download(&self, url: &str) -> Option<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| tracing::warn!(url, error = %e, "Seed document fetch failed"))
            .ok()?;

        if !response.status().is_success() {
            tracing::warn!(url, status = response.status().as_u16(), "Seed document fetch failed");
            return None;
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| tracing::warn!(url, error = %e, "Seed document body unreadable"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn expander() -> SeedExpander {
        SeedExpander::new(Client::new(), Duration::from_secs(5))
    }

    fn seed(url: &str, kind: SeedKind, max_depth: u32) -> SeedEntry {
        SeedEntry {
            url: url.to_string(),
            kind,
            max_depth,
            no_cache: false,
        }
    }

    #[tokio::test]
    async fn test_html_seed_is_direct() {
        let urls = expander()
            .expand(&seed("https://example.com/", SeedKind::Html, 2))
            .await;
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].depth, 2);
    }

    #[tokio::test]
    async fn test_invalid_html_seed_yields_nothing() {
        let urls = expander()
            .expand(&seed("not a url", SeedKind::Html, 2))
            .await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_sitemap_seed_expansion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<urlset>
                    <url><loc>https://example.com/a</loc></url>
                    <url><loc>https://example.com/b</loc></url>
                </urlset>"#,
            ))
            .mount(&server)
            .await;

        let urls = expander()
            .expand(&seed(
                &format!("{}/sitemap.xml", server.uri()),
                SeedKind::Sitemap,
                1,
            ))
            .await;
        assert_eq!(urls.len(), 2);
        assert!(urls.iter().all(|u| u.depth == 1));
    }

    #[tokio::test]
    async fn test_sitemap_index_recursion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<sitemapindex><sitemap><loc>{}/child.xml</loc></sitemap></sitemapindex>"#,
                server.uri()
            )))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/child.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<urlset><url><loc>https://example.com/leaf</loc></url></urlset>"#,
            ))
            .mount(&server)
            .await;

        let urls = expander()
            .expand_sitemap(&format!("{}/index.xml", server.uri()), 0, MAX_SITEMAP_RECURSION)
            .await;
        assert_eq!(urls.len(), 1);
        assert!(urls[0].normalized.as_str().contains("leaf"));
    }

    #[tokio::test]
    async fn test_self_referencing_index_terminates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/loop.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                r#"<sitemapindex><sitemap><loc>{}/loop.xml</loc></sitemap></sitemapindex>"#,
                server.uri()
            )))
            .mount(&server)
            .await;

        // The recursion bound turns the cycle into an empty expansion
        let urls = expander()
            .expand_sitemap(&format!("{}/loop.xml", server.uri()), 0, MAX_SITEMAP_RECURSION)
            .await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_sitemap_soft_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let urls = expander()
            .expand(&seed(
                &format!("{}/sitemap.xml", server.uri()),
                SeedKind::Sitemap,
                1,
            ))
            .await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_feed_seed_expansion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<rss version="2.0"><channel><title>t</title>
                    <item><title>one</title><link>https://example.com/post-1</link></item>
                </channel></rss>"#,
            ))
            .mount(&server)
            .await;

        let urls = expander()
            .expand(&seed(&format!("{}/feed.xml", server.uri()), SeedKind::Feed, 0))
            .await;
        assert_eq!(urls.len(), 1);
        assert_eq!(urls[0].normalized.as_str(), "https://example.com/post-1/");
    }

    #[tokio::test]
    async fn test_unreachable_seed_document_soft_fails() {
        let urls = expander()
            .expand(&seed("http://127.0.0.1:1/sitemap.xml", SeedKind::Sitemap, 1))
            .await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_no_cache_propagates_to_expanded_urls() {
        let mut entry = seed("https://example.com/", SeedKind::Html, 1);
        entry.no_cache = true;
        let urls = expander().expand(&entry).await;
        assert!(urls[0].no_cache);
    }
}
