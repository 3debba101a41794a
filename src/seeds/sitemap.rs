//! Sitemap XML parsing (sitemaps.org schema)
//!
//! A streaming event parser over the two document shapes: `urlset` with
//! leaf page entries, and `sitemapindex` pointing at child sitemaps. Real
//! sitemaps are often generated by broken plugins; parse failures yield an
//! empty document rather than an error.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// One `<url>` entry of a `urlset` document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: Option<String>,
    pub priority: Option<f32>,
}

/// A parsed sitemap, shape selected by the root element
#[derive(Debug, Clone, PartialEq)]
pub enum SitemapDocument {
    /// `<urlset>`: leaf page entries
    UrlSet(Vec<SitemapEntry>),

    /// `<sitemapindex>`: locations of child sitemaps
    Index(Vec<String>),
}

impl SitemapDocument {
    pub fn is_empty(&self) -> bool {
        match self {
            SitemapDocument::UrlSet(entries) => entries.is_empty(),
            SitemapDocument::Index(children) => children.is_empty(),
        }
    }
}

/// Root element seen so far
#[derive(Clone, Copy, PartialEq)]
enum Root {
    UrlSet,
    Index,
}

/// Which container element we are currently inside
#[derive(Clone, Copy, PartialEq)]
enum Section {
    None,
    Url,
    Sitemap,
}

/// Which leaf element's text we are collecting
#[derive(Clone, Copy, PartialEq)]
enum Field {
    Loc,
    LastMod,
    ChangeFreq,
    Priority,
}

/// Parses sitemap XML bytes
///
/// Returns `None` when the document has no recognizable sitemap root; XML
/// errors mid-document end the parse and keep whatever was collected so
/// far.
pub fn parse(xml: &[u8]) -> Option<SitemapDocument> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut root: Option<Root> = None;
    let mut entries: Vec<SitemapEntry> = Vec::new();
    let mut children: Vec<String> = Vec::new();

    let mut section = Section::None;
    let mut field: Option<Field> = None;
    let mut entry = SitemapEntry::default();
    let mut child_loc = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(start)) => {
                match local_name(start.name().as_ref()) {
                    b"urlset" if root.is_none() => root = Some(Root::UrlSet),
                    b"sitemapindex" if root.is_none() => root = Some(Root::Index),
                    b"url" if root == Some(Root::UrlSet) => {
                        section = Section::Url;
                        entry = SitemapEntry::default();
                    }
                    b"sitemap" if root == Some(Root::Index) => {
                        section = Section::Sitemap;
                        child_loc.clear();
                    }
                    b"loc" => field = Some(Field::Loc),
                    b"lastmod" => field = Some(Field::LastMod),
                    b"changefreq" => field = Some(Field::ChangeFreq),
                    b"priority" => field = Some(Field::Priority),
                    _ => {}
                }
            }
            Ok(Event::Text(text)) => {
                if let Some(field) = field {
                    let value = text.unescape().unwrap_or_default().trim().to_string();
                    match (field, section) {
                        (Field::Loc, Section::Url) => entry.loc = value,
                        (Field::LastMod, Section::Url) => entry.lastmod = Some(value),
                        (Field::ChangeFreq, Section::Url) => entry.changefreq = Some(value),
                        (Field::Priority, Section::Url) => entry.priority = value.parse().ok(),
                        (Field::Loc, Section::Sitemap) => child_loc = value,
                        _ => {}
                    }
                }
            }
            Ok(Event::End(end)) => match local_name(end.name().as_ref()) {
                b"url" => {
                    if !entry.loc.is_empty() {
                        entries.push(std::mem::take(&mut entry));
                    }
                    section = Section::None;
                }
                b"sitemap" => {
                    if !child_loc.is_empty() {
                        children.push(std::mem::take(&mut child_loc));
                    }
                    section = Section::None;
                }
                b"loc" | b"lastmod" | b"changefreq" | b"priority" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Sitemap XML error, keeping entries parsed so far");
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    match root {
        Some(Root::UrlSet) => Some(SitemapDocument::UrlSet(entries)),
        Some(Root::Index) => Some(SitemapDocument::Index(children)),
        None => None,
    }
}

/// Element name with any namespace prefix removed.
fn local_name(name: &[u8]) -> &[u8] {
    match name.iter().rposition(|&b| b == b':') {
        Some(pos) => &name[pos + 1..],
        None => name,
    }
}
