use crate::UrlError;
use url::form_urlencoded;
use url::Url;

/// Directory-index filenames stripped from path ends during normalization
const DIRECTORY_INDEXES: &[&str] = &[
    "index.html",
    "index.htm",
    "index.php",
    "index.asp",
    "default.html",
    "default.htm",
    "default.aspx",
];

/// Normalizes a URL into its canonical, deduplication-keyed form
///
/// Transforms are applied in three ordered tiers:
///
/// 1. Semantics-preserving: lowercase scheme and host, strip the default
///    port, collapse `.`/`..` path segments (all via the URL parser), decode
///    percent-encoded unreserved characters, uppercase remaining percent
///    triplets
/// 2. Usually-preserving: append a trailing slash to non-empty paths
/// 3. Semantics-changing: strip directory-index filenames, drop the
///    fragment, collapse duplicate slashes, strip a leading `www.` label,
///    sort query parameters, drop an empty query
///
/// The output of the final tier is what every cache and dedup lookup keys
/// on: two URLs that differ only by query order, trailing slash, or a
/// leading `www.` normalize identically.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - The input is not a crawlable HTTP(S) URL
///
/// # Examples
///
/// ```
/// use skimmer::url::normalize_url;
///
/// let url = normalize_url("HTTP://WWW.Example.com/a/./b/../c/?b=2&a=1#frag").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/a/c/?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // Host: the parser already lowercases; strip a leading www. label
    let host = url.host_str().ok_or(UrlError::MissingHost)?;
    let host = host.strip_prefix("www.").unwrap_or(host).to_string();
    if host.is_empty() {
        return Err(UrlError::MissingHost);
    }
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    // Path: percent normalization, duplicate-slash collapse, index strip,
    // trailing slash
    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    // Query: sort pairs, drop entirely when empty
    if url.query().is_some() {
        let mut pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        pairs.sort();

        if pairs.is_empty() {
            url.set_query(None);
        } else {
            let query = form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish();
            url.set_query(Some(&query));
        }
    }

    Ok(url)
}

/// Rebuilds a parsed path in canonical form
///
/// The parser has already collapsed dot segments; this pass fixes the
/// percent encoding, drops empty segments from duplicate slashes, removes a
/// trailing directory-index filename, and appends the trailing slash.
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(normalize_percent_encoding)
        .collect();

    if let Some(last) = segments.last() {
        if DIRECTORY_INDEXES.contains(&last.to_ascii_lowercase().as_str()) {
            segments.pop();
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}/", segments.join("/"))
}

/// Decodes percent-encoded unreserved characters and uppercases the hex
/// digits of every remaining percent triplet.
///
/// Also used by the robots engine so that rule paths and request paths
/// compare under the same encoding.
pub(crate) fn normalize_percent_encoding(segment: &str) -> String {
    let bytes = segment.as_bytes();
    let mut out = String::with_capacity(segment.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &segment[i + 1..i + 3];
            if let Ok(value) = u8::from_str_radix(hex, 16) {
                if is_unreserved(value) {
                    out.push(value as char);
                } else {
                    out.push('%');
                    out.push_str(&hex.to_ascii_uppercase());
                }
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }

    out
}

/// RFC 3986 unreserved characters: never need percent encoding
fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_scheme_and_host() {
        let result = normalize_url("HTTP://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "http://example.com/Page/");
    }

    #[test]
    fn test_remove_www() {
        let result = normalize_url("https://www.example.com/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_append_trailing_slash() {
        let result = normalize_url("https://example.com/page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page/");
    }

    #[test]
    fn test_trailing_slash_kept() {
        let result = normalize_url("https://example.com/page/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page/");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.com").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_strip_default_port() {
        let result = normalize_url("https://example.com:443/page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page/");
    }

    #[test]
    fn test_keep_explicit_port() {
        let result = normalize_url("https://example.com:8443/page").unwrap();
        assert_eq!(result.as_str(), "https://example.com:8443/page/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page/");
    }

    #[test]
    fn test_collapse_dot_segments() {
        let result = normalize_url("https://example.com/a/./b/../c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/a/c/");
    }

    #[test]
    fn test_collapse_duplicate_slashes() {
        let result = normalize_url("https://example.com///path//to///page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/path/to/page/");
    }

    #[test]
    fn test_strip_directory_index() {
        for index in DIRECTORY_INDEXES {
            let url = format!("https://example.com/docs/{}", index);
            let result = normalize_url(&url).unwrap();
            assert_eq!(result.as_str(), "https://example.com/docs/", "for {}", index);
        }
    }

    #[test]
    fn test_sort_query_params() {
        let result = normalize_url("https://example.com/page?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page/?a=1&b=2");
    }

    #[test]
    fn test_drop_empty_query() {
        let result = normalize_url("https://example.com/page?").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page/");
    }

    #[test]
    fn test_decode_unreserved_percent_triplets() {
        // %61 is 'a', unreserved; %2F is '/', reserved and left encoded
        let result = normalize_url("https://example.com/p%61ge/f%2fo").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page/f%2Fo/");
    }

    #[test]
    fn test_uppercase_remaining_triplets() {
        let result = normalize_url("https://example.com/a%c3%a9").unwrap();
        assert_eq!(result.as_str(), "https://example.com/a%C3%A9/");
    }

    #[test]
    fn test_messy_url_equivalence() {
        let a = normalize_url("HTTP://WWW.Example.com/a/./b/../c/?b=2&a=1#frag").unwrap();
        let b = normalize_url("http://example.com/a/c/?a=1&b=2").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "https://example.com",
            "http://WWW.example.com//a//b/index.html?z=1&a=2#x",
            "https://example.com/p%61th/?q=%2F",
            "https://example.com:8080/a/../b",
            "https://blog.example.co.uk/2023/0415/article",
        ];
        for sample in samples {
            let once = normalize_url(sample).unwrap();
            let twice = normalize_url(once.as_str()).unwrap();
            assert_eq!(once, twice, "not idempotent for {}", sample);
        }
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_url("not a url").is_err());
    }
}
