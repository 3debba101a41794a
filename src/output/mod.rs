//! Post-run output

mod stats;

pub use stats::{print_stats, CrawlStats};
