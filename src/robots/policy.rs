//! Per-domain robots policy: fetch, outcome mapping, and caching
//!
//! The policy for a domain is fetched at most once per run (refetched only
//! past the staleness window) and shared between workers. A robots.txt that
//! cannot be fetched or decoded never fails the crawl: the policy degrades
//! to allow-all and the condition is logged.

use crate::robots::{RequestRate, RobotsRules};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Cached policies older than this are refetched
const POLICY_MAX_AGE_HOURS: i64 = 24;

/// Advertised crawl delays above this are clamped; one hostile robots.txt
/// must not stall a worker indefinitely
const CRAWL_DELAY_CAP: Duration = Duration::from_secs(60);

/// Fetch permission and pacing rules for one domain
#[derive(Debug, Clone)]
pub struct DomainPolicy {
    rules: RobotsRules,

    /// False when robots.txt could not be fetched or decoded; the policy is
    /// then allow-all and callers may want the distinction for logging
    pub available: bool,

    pub fetched_at: DateTime<Utc>,
}

impl DomainPolicy {
    fn new(rules: RobotsRules, available: bool) -> Self {
        Self {
            rules,
            available,
            fetched_at: Utc::now(),
        }
    }

    /// Maps a robots.txt HTTP response onto a policy
    ///
    /// * 2xx — parse the body
    /// * 401/403 — the site gates its robots.txt: disallow everything
    /// * other 4xx — no robots.txt exists: allow everything
    /// * anything else — policy unavailable: allow everything, logged
    pub fn from_response(status: u16, body: Option<&str>) -> Self {
        match status {
            200..=299 => match body {
                Some(content) => Self::new(RobotsRules::parse(content), true),
                None => {
                    tracing::warn!(status, "robots.txt body unreadable, treating policy as unavailable");
                    Self::new(RobotsRules::allow_all(), false)
                }
            },
            401 | 403 => Self::new(RobotsRules::disallow_all(), true),
            400..=499 => Self::new(RobotsRules::allow_all(), true),
            _ => {
                tracing::warn!(status, "robots.txt fetch failed, treating policy as unavailable");
                Self::new(RobotsRules::allow_all(), false)
            }
        }
    }

    /// Policy for a domain whose robots.txt could not be fetched at all.
    pub fn unavailable() -> Self {
        Self::new(RobotsRules::allow_all(), false)
    }

    pub fn is_allowed(&self, agent: &str, url: &Url) -> bool {
        self.rules.can_fetch(agent, url)
    }

    /// Effective delay between requests to this domain, capped.
    ///
    /// Takes the larger implied delay of Crawl-delay and Request-rate when
    /// both are present.
    pub fn crawl_delay(&self, agent: &str) -> Option<Duration> {
        let from_delay = self.rules.crawl_delay(agent);
        let from_rate = self
            .rules
            .request_rate(agent)
            .map(|RequestRate { requests, seconds }| f64::from(seconds) / f64::from(requests));

        let seconds = match (from_delay, from_rate) {
            (Some(a), Some(b)) => a.max(b),
            (Some(a), None) | (None, Some(a)) => a,
            (None, None) => return None,
        };

        let delay = Duration::from_secs_f64(seconds);
        if delay > CRAWL_DELAY_CAP {
            tracing::warn!(
                advertised_secs = seconds,
                "Clamping excessive crawl delay"
            );
            Some(CRAWL_DELAY_CAP)
        } else {
            Some(delay)
        }
    }

    pub fn sitemaps(&self) -> &[String] {
        self.rules.sitemaps()
    }

    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > ChronoDuration::hours(POLICY_MAX_AGE_HOURS)
    }
}

/// Fetches and caches one [`DomainPolicy`] per domain
///
/// Shared between workers; the cache key is scheme+authority so that an
/// http and an https origin keep separate policies.
pub struct DomainPolicyStore {
    client: Client,
    user_agent: String,
    timeout: Duration,
    cache: Mutex<HashMap<String, Arc<DomainPolicy>>>,
}

impl DomainPolicyStore {
    pub fn new(client: Client, user_agent: String, timeout: Duration) -> Self {
        Self {
            client,
            user_agent,
            timeout,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the policy governing `url`, fetching robots.txt on first
    /// contact with the domain.
    pub async fn policy_for(&self, url: &Url) -> Arc<DomainPolicy> {
        let Some(origin) = origin_key(url) else {
            return Arc::new(DomainPolicy::unavailable());
        };

        {
            let cache = self.cache.lock().await;
            if let Some(policy) = cache.get(&origin) {
                if !policy.is_stale() {
                    return Arc::clone(policy);
                }
            }
        }

        let policy = Arc::new(self.fetch_policy(&origin).await);

        let mut cache = self.cache.lock().await;
        cache.insert(origin, Arc::clone(&policy));
        policy
    }

    /// Whether `agent` may fetch `url` under the domain's policy.
    pub async fn can_fetch(&self, url: &Url) -> bool {
        self.policy_for(url).await.is_allowed(&self.user_agent, url)
    }

    async fn fetch_policy(&self, origin: &str) -> DomainPolicy {
        let robots_url = format!("{}/robots.txt", origin);
        tracing::debug!(url = %robots_url, "Fetching robots.txt");

        let response = self
            .client
            .get(&robots_url)
            .timeout(self.timeout)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.ok();
                DomainPolicy::from_response(status, body.as_deref())
            }
            Err(e) => {
                tracing::warn!(url = %robots_url, error = %e, "robots.txt fetch failed");
                DomainPolicy::unavailable()
            }
        }
    }
}

/// Cache key for a URL's origin, e.g. `https://example.com:8443`.
fn origin_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://example.com{}", path)).unwrap()
    }

    #[test]
    fn test_200_parses_body() {
        let policy =
            DomainPolicy::from_response(200, Some("User-agent: *\nDisallow: /private"));
        assert!(policy.available);
        assert!(!policy.is_allowed("TestBot", &url("/private/page")));
        assert!(policy.is_allowed("TestBot", &url("/public")));
    }

    #[test]
    fn test_403_disallows_all() {
        let policy = DomainPolicy::from_response(403, None);
        assert!(policy.available);
        assert!(!policy.is_allowed("TestBot", &url("/anything")));
    }

    #[test]
    fn test_401_disallows_all() {
        let policy = DomainPolicy::from_response(401, None);
        assert!(!policy.is_allowed("TestBot", &url("/")));
    }

    #[test]
    fn test_404_allows_all() {
        let policy = DomainPolicy::from_response(404, None);
        assert!(policy.available);
        assert!(policy.is_allowed("TestBot", &url("/anything")));
    }

    #[test]
    fn test_500_unavailable_allows_all() {
        let policy = DomainPolicy::from_response(503, None);
        assert!(!policy.available);
        assert!(policy.is_allowed("TestBot", &url("/anything")));
    }

    #[test]
    fn test_crawl_delay_capped() {
        let policy = DomainPolicy::from_response(200, Some("User-agent: *\nCrawl-delay: 900"));
        assert_eq!(policy.crawl_delay("TestBot"), Some(CRAWL_DELAY_CAP));
    }

    #[test]
    fn test_request_rate_implies_delay() {
        let policy = DomainPolicy::from_response(200, Some("User-agent: *\nRequest-rate: 1/5"));
        assert_eq!(policy.crawl_delay("TestBot"), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_larger_of_delay_and_rate_wins() {
        let policy = DomainPolicy::from_response(
            200,
            Some("User-agent: *\nCrawl-delay: 2\nRequest-rate: 1/8"),
        );
        assert_eq!(policy.crawl_delay("TestBot"), Some(Duration::from_secs(8)));
    }

    #[test]
    fn test_origin_key_includes_port() {
        let url = Url::parse("http://127.0.0.1:8080/page").unwrap();
        assert_eq!(origin_key(&url).unwrap(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_stale_after_window() {
        let mut policy = DomainPolicy::from_response(404, None);
        assert!(!policy.is_stale());
        policy.fetched_at = Utc::now() - ChronoDuration::hours(POLICY_MAX_AGE_HOURS + 1);
        assert!(policy.is_stale());
    }
}
