//! Crawl configuration
//!
//! TOML-backed run configuration: seeds, worker pool sizing, scope and
//! filter rules, fetch strategy selection, timeouts, and cache windows.

mod parser;
mod types;
mod validation;

pub use parser::{compute_config_hash, load_config, load_config_with_hash};
pub use types::{
    BrowserConfig, Config, CrawlerConfig, FetchStrategyKind, FilterConfig, SeedEntry,
    UserAgentConfig,
};
pub use validation::validate;
