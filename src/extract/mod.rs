//! Strategy-agnostic content extraction
//!
//! Fills in a [`FetchedPage`] from its raw HTML: outgoing links, canonical
//! URL and discovery hints, the metadata fallback chains, visible text, and
//! text chunks. Extraction never fails a page; the worst case is a page
//! with empty metadata, which downstream still receives.
//!
//! Everything here is synchronous on purpose: parsed documents are not
//! `Send`, so no parse result may live across an await point.

mod links;
mod metadata;
mod text;

pub use links::LinkExtraction;
pub use text::{chunk_text, visible_text};

use crate::page::FetchedPage;
use scraper::Html;

/// Runs the full extraction pipeline over a fetched page.
pub fn extract_page(page: &mut FetchedPage) {
    let body = page.body_text();
    let document = Html::parse_document(&body);

    let LinkExtraction {
        links,
        canonical_url,
        sitemap_urls,
        feed_urls,
        robots_meta,
    } = links::extract(&document, &page.url);

    page.links = links;
    if let Some(canonical) = canonical_url {
        page.canonical_url = canonical;
    }
    page.sitemap_urls = sitemap_urls;
    page.feed_urls.extend(feed_urls);
    page.robots_meta = robots_meta;

    page.metadata = metadata::extract(&document, &page.url);

    // Browser fetches arrive with rendered visible text; everything else
    // derives it from the page source
    if page.visible_text.is_empty() {
        page.visible_text = text::visible_text(&document);
    }
    page.chunks = text::chunk_text(&page.visible_text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::ScraperUrl;
    use std::collections::HashMap;

    fn page_from(html: &str) -> FetchedPage {
        let target = ScraperUrl::parse("https://site.test/article", 1).unwrap();
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        FetchedPage::new(&target, 200, headers, html.as_bytes().to_vec())
    }

    #[test]
    fn test_full_pipeline_fills_page() {
        let mut page = page_from(
            r#"<html><head>
                <title>Fallback Title</title>
                <meta property="og:title" content="OG Title" />
                <link rel="canonical" href="https://site.test/article" />
            </head><body>
                <p>Some paragraph of visible text.</p>
                <a href="/next">Next</a>
            </body></html>"#,
        );
        extract_page(&mut page);

        assert_eq!(page.metadata.title.as_deref(), Some("OG Title"));
        assert_eq!(page.links.len(), 1);
        assert_eq!(page.canonical_url.as_str(), "https://site.test/article");
        assert!(page.visible_text.contains("Some paragraph"));
        assert!(!page.chunks.is_empty());
    }

    #[test]
    fn test_garbage_html_yields_empty_metadata_not_failure() {
        let mut page = page_from("<<<<not really html &&& <a href=");
        extract_page(&mut page);
        assert!(page.metadata.title.is_none());
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_browser_visible_text_is_preserved() {
        let mut page = page_from("<html><body><p>source text</p></body></html>");
        page.visible_text = "rendered text".to_string();
        extract_page(&mut page);
        assert_eq!(page.visible_text, "rendered text");
    }
}
