//! Crawl statistics and post-run reporting
//!
//! Counters accumulate during the run; the frequent sub-path report is
//! computed once after drain. Reporting only — nothing here feeds back
//! into crawl decisions.

use std::collections::HashMap;
use url::Url;

/// Summary of one crawl run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlStats {
    /// URLs accepted into the queue (seeds plus discovered children)
    pub initiated_urls_count: u64,

    /// Fetches actually dispatched to a strategy (cache hits excluded)
    pub requested_urls_count: u64,

    /// URLs whose processing finished, successfully or not
    pub completed_urls_count: u64,

    /// URLs that completed with a fetch/parse error
    pub error_urls_count: u64,

    /// URLs dropped before fetching (robots, scope, filters)
    pub skipped_urls_count: u64,

    /// Per domain: sub-paths crawled at least the threshold number of times
    pub frequent_subpaths: HashMap<String, Vec<(String, u32)>>,
}

impl CrawlStats {
    /// Fills in the per-domain frequent sub-path report.
    ///
    /// Every crawled path contributes each of its proper prefixes: for
    /// `/blog/2024/post` both `/blog` and `/blog/2024` are tallied. A
    /// prefix is reported when its count meets the threshold.
    pub fn compute_frequent_subpaths(&mut self, crawled: &[Url], threshold: u32) {
        let mut tallies: HashMap<String, HashMap<String, u32>> = HashMap::new();

        for url in crawled {
            let Some(host) = url.host_str() else {
                continue;
            };
            let domain_tallies = tallies.entry(host.to_string()).or_default();

            let mut prefix = String::new();
            let segments: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
            // The full path is not a prefix of itself
            for segment in segments.iter().take(segments.len().saturating_sub(1)) {
                prefix.push('/');
                prefix.push_str(segment);
                *domain_tallies.entry(prefix.clone()).or_insert(0) += 1;
            }
        }

        self.frequent_subpaths = tallies
            .into_iter()
            .filter_map(|(domain, paths)| {
                let mut frequent: Vec<(String, u32)> = paths
                    .into_iter()
                    .filter(|&(_, count)| count >= threshold)
                    .collect();
                if frequent.is_empty() {
                    return None;
                }
                frequent.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
                Some((domain, frequent))
            })
            .collect();
    }
}

/// Prints a run summary to stdout.
pub fn print_stats(stats: &CrawlStats) {
    println!("=== Crawl Summary ===\n");

    println!("URLs:");
    println!("  Initiated: {}", stats.initiated_urls_count);
    println!("  Requested: {}", stats.requested_urls_count);
    println!("  Completed: {}", stats.completed_urls_count);
    println!("  Errors:    {}", stats.error_urls_count);
    println!("  Skipped:   {}", stats.skipped_urls_count);

    if !stats.frequent_subpaths.is_empty() {
        println!("\nFrequent sub-paths:");
        let mut domains: Vec<_> = stats.frequent_subpaths.iter().collect();
        domains.sort_by_key(|(domain, _)| domain.as_str());
        for (domain, paths) in domains {
            println!("  {}", domain);
            for (path, count) in paths {
                println!("    {:>5}  {}", count, path);
            }
        }
    }
}
