//! RSS/Atom feed parsing
//!
//! Thin layer over feed-rs: pull out the fields the crawler cares about and
//! strip the markup that feed generators love to embed in titles and
//! summaries.

use chrono::{DateTime, Utc};
use scraper::Html;

/// One feed entry reduced to crawl-relevant fields
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub link: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Parses RSS/Atom bytes into entries
///
/// Entries without a usable link are dropped. A document feed-rs cannot
/// parse yields an empty list, logged, never an error.
pub fn parse(bytes: &[u8]) -> Vec<FeedEntry> {
    let feed = match feed_rs::parser::parse(bytes) {
        Ok(feed) => feed,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to parse RSS/Atom feed");
            return Vec::new();
        }
    };

    feed.entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

            let published = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Utc));

            Some(FeedEntry {
                link,
                title: entry.title.map(|t| strip_markup(&t.content)).filter(|t| !t.is_empty()),
                description: entry
                    .summary
                    .map(|s| strip_markup(&s.content))
                    .filter(|d| !d.is_empty()),
                published,
            })
        })
        .collect()
}

/// Removes embedded HTML from a feed field, keeping the text content.
fn strip_markup(value: &str) -> String {
    if !value.contains('<') {
        return value.trim().to_string();
    }
    let fragment = Html::parse_fragment(value);
    fragment
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
