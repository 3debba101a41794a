//! Core page types flowing through the crawl pipeline
//!
//! A [`ScraperUrl`] is created at seeding or link-discovery time and consumed
//! exactly once by one worker. A [`FetchedPage`] is created once per fetch or
//! cache hit, flows through extraction and change detection, and is handed to
//! the page store and the sink callback.

use crate::url::{identity_hash, normalize_url};
use crate::UrlResult;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use url::Url;

/// A unit of crawl work: one URL plus its crawl directives.
#[derive(Debug, Clone)]
pub struct ScraperUrl {
    /// The URL exactly as discovered or configured
    pub raw: String,

    /// Canonical form; all dedup and cache lookups key on this
    pub normalized: Url,

    /// Content-addressed identity of the normalized URL
    pub hash: String,

    /// Remaining crawl depth; children are enqueued at `depth - 1`,
    /// discovery stops once this would go negative
    pub depth: u32,

    /// Bypass the page-store freshness window for this URL
    pub no_cache: bool,
}

impl ScraperUrl {
    /// Normalizes a raw URL and builds a crawl unit from it.
    ///
    /// # Errors
    ///
    /// Returns a `UrlError` if the raw string is not a crawlable URL.
    pub fn parse(raw: &str, depth: u32) -> UrlResult<Self> {
        let normalized = normalize_url(raw)?;
        let hash = identity_hash(normalized.as_str());
        Ok(Self {
            raw: raw.to_string(),
            normalized,
            hash,
            depth,
            no_cache: false,
        })
    }

    /// Builds a child crawl unit one level deeper than `self`.
    ///
    /// Returns `None` when the remaining depth is exhausted; child URLs are
    /// never fetched at negative depth.
    pub fn child(&self, raw: &str) -> Option<UrlResult<Self>> {
        let next_depth = self.depth.checked_sub(1)?;
        Some(Self::parse(raw, next_depth))
    }

    /// Host of the normalized URL, lowercased by normalization.
    pub fn domain(&self) -> Option<&str> {
        self.normalized.host_str()
    }
}

/// Metadata block extracted via the fallback chains.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<Url>,
    pub published_at: Option<DateTime<Utc>>,
}

/// A contiguous slice of a page's visible text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Byte offset of the chunk start within the visible text
    pub offset: usize,
    pub text: String,
}

/// Everything known about one fetched (or cache-loaded) page.
///
/// Built by a fetch strategy with the raw transport fields, then filled in by
/// the content extractor. Ownership passes to the store collaborator after
/// change detection.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status of the fetch (200 for cache hits and rendered pages)
    pub status: u16,

    /// URL the fetch was issued for
    pub url: Url,

    /// Tier-c normalized form of `url`
    pub normalized_url: Url,

    /// Identity hash of `normalized_url`
    pub hash: String,

    /// Response headers, lowercased names
    pub headers: HashMap<String, String>,

    /// Raw body bytes as received
    pub body: Vec<u8>,

    /// Content-Type without parameters, e.g. `text/html`
    pub content_type: Option<String>,

    /// Charset parameter of the Content-Type header, if present
    pub charset: Option<String>,

    pub fetched_at: DateTime<Utc>,

    pub metadata: PageMetadata,

    /// `<link rel=canonical>` target; defaults to the fetched URL itself
    pub canonical_url: Url,

    /// Absolute, filtered outgoing links
    pub links: Vec<Url>,

    /// Rendered-text concatenation used for change detection and chunking
    pub visible_text: String,

    /// Sitemap URLs advertised by the page or its robots policy
    pub sitemap_urls: Vec<Url>,

    /// Feed URLs advertised via `<link rel=alternate>`
    pub feed_urls: Vec<Url>,

    /// Content of `<meta name=robots>`, if any
    pub robots_meta: Option<String>,

    /// Overlapping visible-text chunks for downstream processing
    pub chunks: Vec<TextChunk>,
}

impl FetchedPage {
    /// Creates a page shell from transport-level fetch results.
    ///
    /// Extraction fields start empty; the canonical URL defaults to the
    /// fetched URL until the extractor finds an explicit one.
    pub fn new(target: &ScraperUrl, status: u16, headers: HashMap<String, String>, body: Vec<u8>) -> Self {
        let (content_type, charset) = split_content_type(headers.get("content-type"));
        Self {
            status,
            url: target.normalized.clone(),
            normalized_url: target.normalized.clone(),
            hash: target.hash.clone(),
            headers,
            body,
            content_type,
            charset,
            fetched_at: Utc::now(),
            metadata: PageMetadata::default(),
            canonical_url: target.normalized.clone(),
            links: Vec::new(),
            visible_text: String::new(),
            sitemap_urls: Vec::new(),
            feed_urls: Vec::new(),
            robots_meta: None,
            chunks: Vec::new(),
        }
    }

    /// Body decoded as text. Charset handling is the transport layer's job
    /// (reqwest decodes per header); anything left over is replaced lossily.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Whether the page is fresh enough to skip a refetch.
    pub fn is_fresh(&self, max_age_hours: u32) -> bool {
        let age = Utc::now() - self.fetched_at;
        age < chrono::Duration::hours(i64::from(max_age_hours))
    }
}

/// Splits a Content-Type header value into media type and charset parameter.
fn split_content_type(header: Option<&String>) -> (Option<String>, Option<String>) {
    let Some(value) = header else {
        return (None, None);
    };
    let mut parts = value.split(';');
    let media = parts
        .next()
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());
    let charset = parts.find_map(|p| {
        let p = p.trim();
        p.strip_prefix("charset=")
            .or_else(|| p.strip_prefix("CHARSET="))
            .map(|c| c.trim_matches('"').to_ascii_lowercase())
    });
    (media, charset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(raw: &str, depth: u32) -> ScraperUrl {
        ScraperUrl::parse(raw, depth).unwrap()
    }

    #[test]
    fn test_parse_normalizes_and_hashes() {
        let a = target("https://www.example.com/page/?b=2&a=1", 2);
        let b = target("https://example.com/page?a=1&b=2", 2);
        assert_eq!(a.normalized, b.normalized);
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_child_decrements_depth() {
        let parent = target("https://example.com/", 2);
        let child = parent.child("https://example.com/a").unwrap().unwrap();
        assert_eq!(child.depth, 1);
    }

    #[test]
    fn test_child_at_zero_depth_is_none() {
        let leaf = target("https://example.com/", 0);
        assert!(leaf.child("https://example.com/a").is_none());
    }

    #[test]
    fn test_child_does_not_inherit_no_cache() {
        let mut parent = target("https://example.com/", 3);
        parent.no_cache = true;
        let child = parent.child("https://example.com/a").unwrap().unwrap();
        assert!(!child.no_cache);
    }

    #[test]
    fn test_content_type_split() {
        let (media, charset) =
            split_content_type(Some(&"text/html; charset=UTF-8".to_string()));
        assert_eq!(media.as_deref(), Some("text/html"));
        assert_eq!(charset.as_deref(), Some("utf-8"));
    }

    #[test]
    fn test_content_type_without_charset() {
        let (media, charset) = split_content_type(Some(&"application/xml".to_string()));
        assert_eq!(media.as_deref(), Some("application/xml"));
        assert_eq!(charset, None);
    }

    #[test]
    fn test_freshness_window() {
        let t = target("https://example.com/", 1);
        let mut page = FetchedPage::new(&t, 200, HashMap::new(), Vec::new());
        assert!(page.is_fresh(1));
        page.fetched_at = Utc::now() - chrono::Duration::hours(25);
        assert!(!page.is_fresh(24));
    }
}
