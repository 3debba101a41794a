use crate::seeds::SeedKind;
use crate::url::DomainScope;
use serde::Deserialize;

/// Main configuration structure for a crawl run
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,

    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,

    /// Required when `fetch-strategy = "browser"`
    #[serde(default)]
    pub browser: Option<BrowserConfig>,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default, rename = "seed")]
    pub seeds: Vec<SeedEntry>,
}

/// Which fetch strategy the whole crawl uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategyKind {
    Http,
    Browser,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Size of the worker pool
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// Bounded capacity of the pending-URL queue; discovery blocks when full
    #[serde(rename = "queue-capacity", default = "default_queue_capacity")]
    pub queue_capacity: u32,

    /// Per-fetch timeout
    #[serde(rename = "fetch-timeout-secs", default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Timeout for robots.txt, sitemap, and feed downloads
    #[serde(rename = "robots-timeout-secs", default = "default_robots_timeout")]
    pub robots_timeout_secs: u64,

    /// Stored pages younger than this are served from cache instead of
    /// refetched
    #[serde(rename = "cache-freshness-hours", default = "default_cache_freshness")]
    pub cache_freshness_hours: u32,

    #[serde(rename = "follow-links", default = "default_true")]
    pub follow_links: bool,

    #[serde(rename = "follow-sitemaps", default = "default_true")]
    pub follow_sitemaps: bool,

    #[serde(rename = "follow-feeds", default = "default_true")]
    pub follow_feeds: bool,

    /// How discovered hosts are matched against seed hosts
    #[serde(rename = "domain-scope", default = "default_domain_scope")]
    pub domain_scope: DomainScope,

    #[serde(rename = "fetch-strategy", default = "default_fetch_strategy")]
    pub fetch_strategy: FetchStrategyKind,

    /// Minimum occurrences before a sub-path shows up in the stats report
    #[serde(
        rename = "frequent-subpath-threshold",
        default = "default_subpath_threshold"
    )]
    pub frequent_subpath_threshold: u32,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Rendering-service configuration for the browser strategy
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Base URL of the rendering service
    pub endpoint: String,

    /// Number of pooled sessions; renders never exceed this concurrency
    #[serde(rename = "pool-size", default = "default_browser_pool")]
    pub pool_size: u32,

    #[serde(default)]
    pub token: Option<String>,
}

/// Channel-level include/exclude path patterns
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    #[serde(rename = "include-paths", default)]
    pub include_paths: Vec<String>,

    #[serde(rename = "exclude-paths", default)]
    pub exclude_paths: Vec<String>,
}

/// One configured seed
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    pub url: String,

    pub kind: SeedKind,

    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Skip the cache freshness window for this seed's URLs
    #[serde(rename = "no-cache", default)]
    pub no_cache: bool,
}

fn default_workers() -> u32 {
    4
}

fn default_queue_capacity() -> u32 {
    256
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_robots_timeout() -> u64 {
    10
}

fn default_cache_freshness() -> u32 {
    24
}

fn default_true() -> bool {
    true
}

fn default_domain_scope() -> DomainScope {
    DomainScope::SecondLevel
}

fn default_fetch_strategy() -> FetchStrategyKind {
    FetchStrategyKind::Http
}

fn default_subpath_threshold() -> u32 {
    5
}

fn default_browser_pool() -> u32 {
    2
}

fn default_max_depth() -> u32 {
    1
}
