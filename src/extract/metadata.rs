//! Metadata fallback chains: OpenGraph, JSON-LD, plain tags, URL patterns
//!
//! Each field walks its own chain and stops at the first hit. A page where
//! every chain misses still flows through the pipeline with empty metadata.

use crate::page::PageMetadata;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// Builds the metadata block for one page.
pub fn extract(document: &Html, page_url: &Url) -> PageMetadata {
    let json_ld = collect_json_ld(document);

    let title = meta_content(document, "meta[property='og:title']")
        .or_else(|| json_ld_string(&json_ld, &["name", "headline"]))
        .or_else(|| title_tag(document));

    let description = meta_content(document, "meta[property='og:description']")
        .or_else(|| json_ld_string(&json_ld, &["description"]))
        .or_else(|| meta_content(document, "meta[name='description']"));

    let image_url = meta_content(document, "meta[property='og:image']")
        .or_else(|| json_ld_image(&json_ld))
        .or_else(|| first_img_src(document))
        .and_then(|raw| page_url.join(raw.trim()).ok());

    let published_at = json_ld_date(&json_ld)
        .or_else(|| {
            meta_content(document, "meta[property='article:published_time']")
                .and_then(|v| parse_timestamp(&v))
        })
        .or_else(|| {
            meta_content(document, "meta[name='date']").and_then(|v| parse_timestamp(&v))
        })
        .or_else(|| date_from_path(page_url.path()));

    PageMetadata {
        title,
        description,
        image_url,
        published_at,
    }
}

/// First non-empty content attribute for a meta selector.
fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|e| e.value().attr("content"))
        .map(|c| c.trim().to_string())
        .find(|c| !c.is_empty())
}

fn title_tag(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn first_img_src(document: &Html) -> Option<String> {
    let selector = Selector::parse("img[src]").ok()?;
    document
        .select(&selector)
        .filter_map(|e| e.value().attr("src"))
        .map(|s| s.trim().to_string())
        .find(|s| !s.is_empty())
}

/// Parses every JSON-LD block on the page, flattening arrays and @graph
/// containers into one object list. Unparseable blocks are skipped.
fn collect_json_ld(document: &Html) -> Vec<serde_json::Value> {
    let Ok(selector) = Selector::parse("script[type='application/ld+json']") else {
        return Vec::new();
    };

    let mut objects = Vec::new();
    for element in document.select(&selector) {
        let raw = element.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw) else {
            tracing::debug!("Skipping unparseable JSON-LD block");
            continue;
        };
        flatten_json_ld(value, &mut objects);
    }
    objects
}

fn flatten_json_ld(value: serde_json::Value, out: &mut Vec<serde_json::Value>) {
    match value {
        serde_json::Value::Array(items) => {
            for item in items {
                flatten_json_ld(item, out);
            }
        }
        serde_json::Value::Object(ref map) => {
            if let Some(graph) = map.get("@graph").cloned() {
                flatten_json_ld(graph, out);
            }
            out.push(value);
        }
        _ => {}
    }
}

/// First string value under any of `keys` across the JSON-LD objects.
fn json_ld_string(objects: &[serde_json::Value], keys: &[&str]) -> Option<String> {
    for object in objects {
        for key in keys {
            if let Some(text) = object.get(*key).and_then(|v| v.as_str()) {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
        }
    }
    None
}

/// JSON-LD image: a bare string, a list of strings, or an object with `url`.
fn json_ld_image(objects: &[serde_json::Value]) -> Option<String> {
    for object in objects {
        let Some(image) = object.get("image") else {
            continue;
        };
        let resolved = match image {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => items.iter().find_map(|item| match item {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(map) => {
                    map.get("url").and_then(|u| u.as_str()).map(String::from)
                }
                _ => None,
            }),
            serde_json::Value::Object(map) => {
                map.get("url").and_then(|u| u.as_str()).map(String::from)
            }
            _ => None,
        };
        if let Some(url) = resolved.filter(|u| !u.trim().is_empty()) {
            return Some(url);
        }
    }
    None
}

fn json_ld_date(objects: &[serde_json::Value]) -> Option<DateTime<Utc>> {
    for object in objects {
        for key in ["datePublished", "dateCreated", "uploadDate"] {
            if let Some(parsed) = object
                .get(key)
                .and_then(|v| v.as_str())
                .and_then(parse_timestamp)
            {
                return Some(parsed);
            }
        }
    }
    None
}

/// Parses the timestamp formats that show up in the wild.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(parsed) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&parsed));
        }
    }
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%d %B %Y", "%B %d, %Y"] {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return Some(Utc.from_utc_datetime(&parsed.and_hms_opt(0, 0, 0)?));
        }
    }
    None
}

/// Deduces a publication date from a `/YYYY/MMDD/` pattern in the path
///
/// Only accepted when it forms a real calendar date that is not in the
/// future; `/2023/1342/` is a product number, not a date.
fn date_from_path(path: &str) -> Option<DateTime<Utc>> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"/((?:19|20)\d{2})/(\d{2})(\d{2})(?:/|$)").expect("valid regex"));

    let captures = pattern.captures(path)?;
    let year: i32 = captures[1].parse().ok()?;
    let month: u32 = captures[2].parse().ok()?;
    let day: u32 = captures[3].parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let timestamp = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    if timestamp > Utc::now() {
        return None;
    }
    Some(timestamp)
}
