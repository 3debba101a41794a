use crate::config::types::{Config, FetchStrategyKind};
use crate::url::normalize_url;
use crate::ConfigError;

/// Validates a parsed configuration
///
/// Rejects configurations that could not produce a meaningful run: no
/// seeds, unparseable seed URLs, a zero-sized worker pool, a queue too
/// small to hold the terminal markers, or a browser strategy without a
/// rendering service.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.seeds.is_empty() {
        return Err(ConfigError::Validation(
            "At least one [[seed]] is required".to_string(),
        ));
    }

    for seed in &config.seeds {
        normalize_url(&seed.url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", seed.url, e)))?;
    }

    let crawler = &config.crawler;
    if crawler.workers == 0 {
        return Err(ConfigError::Validation(
            "workers must be at least 1".to_string(),
        ));
    }
    if crawler.queue_capacity < crawler.workers {
        return Err(ConfigError::Validation(format!(
            "queue-capacity ({}) must be at least the worker count ({})",
            crawler.queue_capacity, crawler.workers
        )));
    }
    if crawler.fetch_timeout_secs == 0 || crawler.robots_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeouts must be non-zero".to_string(),
        ));
    }

    match (crawler.fetch_strategy, &config.browser) {
        (FetchStrategyKind::Browser, None) => {
            return Err(ConfigError::Validation(
                "fetch-strategy = \"browser\" requires a [browser] section".to_string(),
            ));
        }
        (FetchStrategyKind::Browser, Some(browser)) => {
            if browser.endpoint.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "browser endpoint must not be empty".to_string(),
                ));
            }
            if browser.pool_size == 0 {
                return Err(ConfigError::Validation(
                    "browser pool-size must be at least 1".to_string(),
                ));
            }
        }
        (FetchStrategyKind::Http, _) => {}
    }

    if config.user_agent.crawler_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name must not be empty".to_string(),
        ));
    }

    Ok(())
}
