//! Link and discovery-hint extraction
//!
//! Pulls out followable `<a href>` targets plus the page's self-description:
//! canonical URL, robots meta, advertised sitemaps and feeds.

use scraper::{Html, Selector};
use url::Url;

/// File extensions that never lead to crawlable documents
const EXTENSION_DENYLIST: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "ico", "bmp", "css", "js", "mjs", "pdf", "zip",
    "gz", "tar", "rar", "7z", "mp3", "wav", "ogg", "mp4", "avi", "mov", "wmv", "webm", "mkv",
    "doc", "docx", "xls", "xlsx", "ppt", "pptx", "dmg", "exe", "bin", "iso", "apk",
];

/// Everything link-shaped found on one page
#[derive(Debug, Default)]
pub struct LinkExtraction {
    pub links: Vec<Url>,
    pub canonical_url: Option<Url>,
    pub sitemap_urls: Vec<Url>,
    pub feed_urls: Vec<Url>,
    pub robots_meta: Option<String>,
}

/// Extracts links and discovery hints from a parsed document.
pub fn extract(document: &Html, base_url: &Url) -> LinkExtraction {
    let mut out = LinkExtraction::default();

    if let Ok(selector) = Selector::parse("a[href]") {
        for element in document.select(&selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(url) = resolve_link(href, base_url) {
                    out.links.push(url);
                }
            }
        }
    }

    if let Ok(selector) = Selector::parse("link[rel='canonical'][href]") {
        out.canonical_url = document
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("href"))
            .and_then(|href| base_url.join(href.trim()).ok());
    }

    if let Ok(selector) = Selector::parse("link[rel='sitemap'][href]") {
        for element in document.select(&selector) {
            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| base_url.join(href.trim()).ok())
            {
                out.sitemap_urls.push(url);
            }
        }
    }

    if let Ok(selector) = Selector::parse("link[rel='alternate'][href]") {
        for element in document.select(&selector) {
            let is_feed = element
                .value()
                .attr("type")
                .map(|t| {
                    let t = t.to_ascii_lowercase();
                    t.contains("rss") || t.contains("atom")
                })
                .unwrap_or(false);
            if !is_feed {
                continue;
            }
            if let Some(url) = element
                .value()
                .attr("href")
                .and_then(|href| base_url.join(href.trim()).ok())
            {
                out.feed_urls.push(url);
            }
        }
    }

    if let Ok(selector) = Selector::parse("meta[name='robots'][content]") {
        out.robots_meta = document
            .select(&selector)
            .next()
            .and_then(|e| e.value().attr("content"))
            .map(|c| c.trim().to_string());
    }

    out
}

/// Resolves one href against the page URL and applies the follow rules
///
/// Rejected: special schemes (`javascript:`, `mailto:`, `tel:`, `data:`),
/// fragment-only anchors, non-HTTP results, and the extension denylist.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let url = base_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    if has_denied_extension(url.path()) {
        return None;
    }

    Some(url)
}

fn has_denied_extension(path: &str) -> bool {
    let last_segment = path.rsplit('/').next().unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => EXTENSION_DENYLIST.contains(&ext.to_ascii_lowercase().as_str()),
        None => false,
    }
}
