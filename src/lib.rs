//! Skimmer: a focused web crawler and content-acquisition engine
//!
//! This crate implements the crawl core that feeds a content-curation
//! pipeline: it discovers, fetches, normalizes, deduplicates, and hands off
//! web pages. Downstream concerns (summarization, narration, publication)
//! live behind the per-page sink callback and the [`store::PageStore`]
//! collaborator.

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod page;
pub mod robots;
pub mod seeds;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for skimmer operations
#[derive(Debug, Error)]
pub enum SkimmerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Browser session error: {0}")]
    Browser(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Crawler used after close: {0}")]
    Closed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for skimmer operations
pub type Result<T> = std::result::Result<T, SkimmerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::Crawler;
pub use output::CrawlStats;
pub use page::{FetchedPage, PageMetadata, ScraperUrl};
pub use url::{identity_hash, normalize_url};
