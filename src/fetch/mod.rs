//! Fetch strategies: how raw page bytes are acquired
//!
//! One contract, two implementations: a plain pooled HTTP client and a
//! headless-browser pool for JS-heavy sites. The strategy is a crawl-level
//! choice made at construction time; per-URL the only short-circuit is a
//! sufficiently fresh cached copy, which the coordinator applies before the
//! strategy is consulted. Strategies return raw HTML only; parsing is a
//! separate, strategy-agnostic stage.

mod browser;
mod http;

pub use browser::{BrowserFetcher, BrowserPool, BrowserSession};
pub use http::{build_http_client, HttpFetcher};

use crate::page::{FetchedPage, ScraperUrl};
use crate::Result;
use async_trait::async_trait;

/// A way of turning a crawl target into raw page bytes
///
/// `Ok(None)` means the URL yielded no usable page (non-2xx, wrong content
/// type); the coordinator logs and moves on. `Err` is a transport failure,
/// treated the same way one level up. Neither aborts a run.
#[async_trait]
pub trait FetchStrategy: Send + Sync {
    async fn fetch(&self, target: &ScraperUrl) -> Result<Option<FetchedPage>>;

    fn name(&self) -> &str;
}
