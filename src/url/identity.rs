use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Characters kept from the base64url digest; ~96 bits of identity
const HASH_LENGTH: usize = 16;

/// Content-addressed identity for a normalized URL
///
/// SHA-256 over the normalized string, base64url-encoded and truncated to
/// 16 characters. At that length a collision needs on the order of 2^48
/// distinct URLs, far beyond any bounded crawl; collisions are accepted
/// rather than mitigated.
///
/// Equal normalized forms always hash identically, so this is safe to use
/// as the dedup and cache key everywhere the normalized URL itself is too
/// long or too awkward.
///
/// # Examples
///
/// ```
/// use skimmer::url::{identity_hash, normalize_url};
///
/// let a = identity_hash(normalize_url("https://www.example.com/page/").unwrap().as_str());
/// let b = identity_hash(normalize_url("https://example.com/page").unwrap().as_str());
/// assert_eq!(a, b);
/// ```
pub fn identity_hash(normalized_url: &str) -> String {
    let digest = Sha256::digest(normalized_url.as_bytes());
    let mut encoded = URL_SAFE_NO_PAD.encode(digest);
    encoded.truncate(HASH_LENGTH);
    encoded
}
