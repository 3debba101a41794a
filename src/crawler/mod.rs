//! The crawl scheduler: queue, worker pool, and termination
//!
//! This is the orchestrator the rest of the crate serves. It pulls expanded
//! seeds, gates them through scope, filter, and robots policy, dispatches
//! the fetch strategy, runs extraction and the change gate, writes through
//! the page store, and feeds discovered in-scope links back into its own
//! queue until the cooperative drain count terminates the run.

mod coordinator;
mod queue;

pub use coordinator::{Crawler, PageSink};
pub use queue::{CrawlQueue, QueueItem};

use crate::config::Config;
use crate::output::CrawlStats;
use crate::store::PageStore;
use crate::Result;
use std::sync::Arc;

/// Runs a complete crawl with the given configuration and store
///
/// Convenience entry point: builds the crawler, runs it to termination, and
/// returns the stats. For a page sink or a stop handle, construct
/// [`Crawler`] directly.
pub async fn crawl(config: Config, store: Arc<dyn PageStore>) -> Result<CrawlStats> {
    let crawler = Arc::new(Crawler::new(config, store)?);
    crawler.run().await
}
