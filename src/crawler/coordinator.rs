//! Crawl coordination: worker pool, shared state, termination
//!
//! A run moves through three phases: seeding (expand seeds, fill the
//! queue), draining (workers process until the work is gone), terminated.
//! Termination is cooperative counting: whoever completes the URL that
//! makes `completed == initiated` injects exactly one terminal marker per
//! worker, and every worker exits on its marker.
//!
//! Shared coordination state (initiated-set, counters, marker flag) lives
//! behind one mutex, and the claim of a URL into the initiated-set happens
//! in the same critical section as the counter update, so a URL can never
//! be claimed twice between workers. Critical sections never span an await.

use crate::config::{Config, FetchStrategyKind};
use crate::crawler::queue::{CrawlQueue, QueueItem};
use crate::dedup::MinHasher;
use crate::extract;
use crate::fetch::{build_http_client, BrowserFetcher, FetchStrategy, HttpFetcher};
use crate::output::CrawlStats;
use crate::page::{FetchedPage, ScraperUrl};
use crate::robots::DomainPolicyStore;
use crate::seeds::SeedExpander;
use crate::store::PageStore;
use crate::url::{PathFilter, ScopeFilter};
use crate::{ConfigError, Result, SkimmerError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use url::Url;

/// Per-page handoff to downstream collaborators
pub type PageSink = Arc<dyn Fn(&FetchedPage) + Send + Sync>;

/// Lifecycle of one crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Seeding,
    Draining,
    Terminated,
}

/// Everything the workers coordinate through, guarded by one mutex
struct CrawlState {
    phase: Phase,

    /// Identity hashes of every URL ever enqueued this run
    initiated: HashSet<String>,
    initiated_count: u64,
    requested_count: u64,
    completed_count: u64,
    error_count: u64,
    skipped_count: u64,

    /// True once the terminal markers have been injected
    markers_sent: bool,

    /// Successfully crawled URLs, for the post-run sub-path report
    crawled: Vec<Url>,

    /// Most recent dispatch per domain, for crawl-delay pacing
    last_request: HashMap<String, Instant>,
}

impl CrawlState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            initiated: HashSet::new(),
            initiated_count: 0,
            requested_count: 0,
            completed_count: 0,
            error_count: 0,
            skipped_count: 0,
            markers_sent: false,
            crawled: Vec::new(),
            last_request: HashMap::new(),
        }
    }
}

/// The crawl engine
///
/// Built once per run from a [`Config`] and a [`PageStore`]; `run` drives
/// the whole crawl and returns the stats. Per-page results reach downstream
/// collaborators solely through the optional page sink.
pub struct Crawler {
    config: Arc<Config>,
    strategy: Arc<dyn FetchStrategy>,
    store: Arc<dyn PageStore>,
    policies: Arc<DomainPolicyStore>,
    expander: Arc<SeedExpander>,
    scope: ScopeFilter,
    path_filter: PathFilter,
    minhasher: MinHasher,
    queue: CrawlQueue,
    state: Mutex<CrawlState>,
    stopped: AtomicBool,
    user_agent: String,
    on_page: Option<PageSink>,
}

impl Crawler {
    /// Builds a crawler from a validated configuration.
    pub fn new(config: Config, store: Arc<dyn PageStore>) -> Result<Self> {
        let fetch_timeout = Duration::from_secs(config.crawler.fetch_timeout_secs);
        let robots_timeout = Duration::from_secs(config.crawler.robots_timeout_secs);

        let client = build_http_client(&config.user_agent, fetch_timeout)?;

        let strategy: Arc<dyn FetchStrategy> = match config.crawler.fetch_strategy {
            FetchStrategyKind::Http => Arc::new(HttpFetcher::new(client.clone())),
            FetchStrategyKind::Browser => {
                let browser = config.browser.as_ref().ok_or_else(|| {
                    ConfigError::Validation("browser strategy without [browser] section".into())
                })?;
                Arc::new(BrowserFetcher::new(browser, fetch_timeout)?)
            }
        };

        let user_agent = format!(
            "{}/{}",
            config.user_agent.crawler_name, config.user_agent.crawler_version
        );

        let seed_hosts: Vec<String> = config
            .seeds
            .iter()
            .filter_map(|seed| {
                crate::url::normalize_url(&seed.url)
                    .ok()
                    .and_then(|u| u.host_str().map(str::to_string))
            })
            .collect();
        let scope = ScopeFilter::from_seed_hosts(
            config.crawler.domain_scope,
            seed_hosts.iter().map(String::as_str),
        );

        let path_filter = PathFilter::new(
            config.filter.include_paths.clone(),
            config.filter.exclude_paths.clone(),
        );

        let policies = Arc::new(DomainPolicyStore::new(
            client.clone(),
            user_agent.clone(),
            robots_timeout,
        ));
        let expander = Arc::new(SeedExpander::new(client, robots_timeout));

        let queue = CrawlQueue::new(config.crawler.queue_capacity as usize);

        Ok(Self {
            config: Arc::new(config),
            strategy,
            store,
            policies,
            expander,
            scope,
            path_filter,
            minhasher: MinHasher::default(),
            queue,
            state: Mutex::new(CrawlState::new()),
            stopped: AtomicBool::new(false),
            user_agent,
            on_page: None,
        })
    }

    /// Installs the per-page callback, the sole channel to downstream
    /// collaborators. Invoked once for every newly stored or materially
    /// changed page.
    pub fn with_page_sink(mut self, sink: PageSink) -> Self {
        self.on_page = Some(sink);
        self
    }

    /// Replaces the fetch strategy chosen from the configuration.
    ///
    /// For embedders with their own acquisition path and for tests driving
    /// the scheduler over synthetic page graphs.
    pub fn with_strategy(mut self, strategy: Arc<dyn FetchStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Runs the crawl to completion and returns the stats.
    ///
    /// A crawler runs exactly once; a second call is a contract violation.
    pub async fn run(self: Arc<Self>) -> Result<CrawlStats> {
        {
            let mut state = self.state.lock().expect("crawl state lock poisoned");
            if state.phase != Phase::Idle {
                return Err(SkimmerError::Closed("run() called twice".to_string()));
            }
            state.phase = Phase::Seeding;
        }

        tracing::info!(
            seeds = self.config.seeds.len(),
            workers = self.config.crawler.workers,
            strategy = self.strategy.name(),
            "Seeding crawl"
        );

        // Workers start before seeding: a sitemap seed can expand into more
        // URLs than the queue holds, and someone has to be draining
        let workers = self.config.crawler.workers;
        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                let crawler = Arc::clone(&self);
                tokio::spawn(async move { crawler.worker_loop(worker_id).await })
            })
            .collect();

        for seed in &self.config.seeds {
            let direct = seed.kind == crate::seeds::SeedKind::Html;
            for url in self.expander.expand(seed).await {
                // Expanded sitemap/feed entries pass the channel filters;
                // direct seeds are trusted as configured
                if direct || self.in_scope(&url.normalized) {
                    self.enqueue(url).await?;
                } else {
                    self.mark_seed_filtered(&url);
                }
            }
        }

        {
            let mut state = self.state.lock().expect("crawl state lock poisoned");
            state.phase = Phase::Draining;
            tracing::info!(initiated = state.initiated_count, "Draining");
        }

        // The drain condition is suppressed during seeding; re-check now so
        // a run whose work already finished (or that had no seeds at all)
        // still terminates
        self.check_drain().await?;

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Worker panicked");
            }
        }

        let stats = {
            let mut state = self.state.lock().expect("crawl state lock poisoned");
            state.phase = Phase::Terminated;
            let mut stats = CrawlStats {
                initiated_urls_count: state.initiated_count,
                requested_urls_count: state.requested_count,
                completed_urls_count: state.completed_count,
                error_urls_count: state.error_count,
                skipped_urls_count: state.skipped_count,
                frequent_subpaths: HashMap::new(),
            };
            stats.compute_frequent_subpaths(
                &state.crawled,
                self.config.crawler.frequent_subpath_threshold,
            );
            stats
        };

        tracing::info!(
            initiated = stats.initiated_urls_count,
            completed = stats.completed_urls_count,
            errors = stats.error_urls_count,
            skipped = stats.skipped_urls_count,
            "Crawl terminated"
        );
        Ok(stats)
    }

    /// Requests an abrupt drain: terminal markers go out immediately,
    /// in-flight fetches finish, queued URLs are discarded as skipped.
    pub async fn stop(&self) -> Result<()> {
        self.stopped.store(true, Ordering::SeqCst);
        let should_send = {
            let mut state = self.state.lock().expect("crawl state lock poisoned");
            if state.markers_sent {
                false
            } else {
                state.markers_sent = true;
                true
            }
        };
        if should_send {
            tracing::info!("Stop requested, injecting terminal markers");
            self.send_terminal_markers().await?;
        }
        Ok(())
    }

    /// One worker: dequeue, process, feed children back, until a marker.
    async fn worker_loop(self: Arc<Self>, worker_id: u32) {
        tracing::debug!(worker_id, "Worker started");
        loop {
            let item = self.queue.pop().await;
            let target = match item {
                None | Some(QueueItem::Terminate) => break,
                Some(QueueItem::Url(url)) => url,
            };

            if self.stopped.load(Ordering::SeqCst) {
                // Drain fast: everything already queued is discarded
                self.mark_skipped(&target, "crawler stopped").await;
                continue;
            }

            self.process_url(&target).await;
        }
        tracing::debug!(worker_id, "Worker exiting");
    }

    /// Processes one URL end to end. Every failure path is absorbed here:
    /// a failed page is counted and logged, never fatal to the run.
    async fn process_url(&self, target: &ScraperUrl) {
        let url = target.normalized.clone();
        tracing::debug!(url = %url, depth = target.depth, "Processing");

        // Robots gate
        let policy = self.policies.policy_for(&url).await;
        if !policy.is_allowed(&self.user_agent, &url) {
            self.mark_skipped(target, "disallowed by robots.txt").await;
            return;
        }

        // Cache lookup; the stored copy also feeds change detection below
        let stored = match self.store.load(url.as_str()).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Page store read failed");
                None
            }
        };

        let fresh_hit = !target.no_cache
            && stored
                .as_ref()
                .map(|page| page.is_fresh(self.config.crawler.cache_freshness_hours))
                .unwrap_or(false);

        let page = if fresh_hit {
            tracing::debug!(url = %url, "Serving from page store cache");
            stored.clone()
        } else {
            // Pace requests to one domain per its advertised delay
            if let Some(delay) = policy.crawl_delay(&self.user_agent) {
                if let Some(host) = url.host_str() {
                    self.wait_for_domain_slot(host, delay).await;
                }
            }

            {
                let mut state = self.state.lock().expect("crawl state lock poisoned");
                state.requested_count += 1;
            }

            match self.strategy.fetch(target).await {
                Ok(Some(mut page)) => {
                    extract::extract_page(&mut page);
                    Some(page)
                }
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Fetch failed");
                    None
                }
            }
        };

        let Some(page) = page else {
            self.mark_error(target).await;
            return;
        };

        // Change gate and handoff, only for genuinely fetched pages
        if !fresh_hit {
            let materially_changed = match stored {
                None => true,
                Some(ref old) => {
                    let decision = self.minhasher.compare(&old.visible_text, &page.visible_text);
                    if decision.is_duplicate {
                        tracing::debug!(
                            url = %url,
                            similarity = decision.similarity,
                            "Cosmetic change only, keeping stored copy"
                        );
                    } else {
                        tracing::info!(
                            url = %url,
                            similarity = decision.similarity,
                            "Content changed, replacing stored copy"
                        );
                    }
                    !decision.is_duplicate
                }
            };

            if materially_changed {
                if let Err(e) = self.store.store(&page).await {
                    tracing::warn!(url = %url, error = %e, "Page store write failed");
                }
                if let Some(sink) = &self.on_page {
                    sink(&page);
                }
            }
        }

        // Feed discoveries back into the queue before this URL counts as
        // completed, so the drain check can never fire early
        if !self.stopped.load(Ordering::SeqCst) {
            self.enqueue_discoveries(target, &page).await;
        }

        self.mark_crawled(target).await;
    }

    /// Enqueues the in-scope children of a processed page.
    async fn enqueue_discoveries(&self, target: &ScraperUrl, page: &FetchedPage) {
        if target.depth == 0 {
            return;
        }
        let child_depth = target.depth - 1;

        let nofollow = page
            .robots_meta
            .as_deref()
            .map(|meta| meta.to_ascii_lowercase().contains("nofollow"))
            .unwrap_or(false);

        if self.config.crawler.follow_links && !nofollow {
            for link in &page.links {
                self.enqueue_child(link.as_str(), child_depth).await;
            }
        }

        if self.config.crawler.follow_sitemaps {
            let mut sitemap_urls: Vec<String> =
                page.sitemap_urls.iter().map(|u| u.to_string()).collect();
            let policy = self.policies.policy_for(&target.normalized).await;
            sitemap_urls.extend(policy.sitemaps().iter().cloned());

            for sitemap_url in sitemap_urls {
                let expanded = self
                    .expander
                    .expand_sitemap(&sitemap_url, child_depth, crate::seeds::MAX_SITEMAP_RECURSION)
                    .await;
                for url in expanded {
                    if self.in_scope(&url.normalized) {
                        let _ = self.enqueue(url).await;
                    }
                }
            }
        }

        if self.config.crawler.follow_feeds {
            let feed_urls: Vec<String> = page.feed_urls.iter().map(|u| u.to_string()).collect();
            for feed_url in feed_urls {
                for url in self.expander.expand_feed(&feed_url, child_depth).await {
                    if self.in_scope(&url.normalized) {
                        let _ = self.enqueue(url).await;
                    }
                }
            }
        }
    }

    /// Normalizes, filters, and enqueues one discovered link.
    async fn enqueue_child(&self, raw: &str, depth: u32) {
        let child = match ScraperUrl::parse(raw, depth) {
            Ok(child) => child,
            Err(e) => {
                tracing::debug!(url = raw, error = %e, "Skipping unparseable link");
                return;
            }
        };

        if !self.in_scope(&child.normalized) {
            return;
        }

        let _ = self.enqueue(child).await;
    }

    /// Scope and path-filter decision for a candidate URL.
    fn in_scope(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        self.scope.allows(host) && self.path_filter.allows(url.path())
    }

    /// Claims a URL in the initiated-set and enqueues it.
    ///
    /// The set membership check, the insert, and the counter update form
    /// one critical section; the queue push happens after the claim, so a
    /// concurrent worker discovering the same URL sees it claimed and
    /// backs off. At most one enqueue per normalized URL per run.
    async fn enqueue(&self, url: ScraperUrl) -> Result<bool> {
        // After stop() the workers are exiting on their markers; pushing
        // more work could block against a queue nobody drains
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(false);
        }

        {
            let mut state = self.state.lock().expect("crawl state lock poisoned");
            if state.initiated.contains(&url.hash) {
                return Ok(false);
            }
            state.initiated.insert(url.hash.clone());
            state.initiated_count += 1;
        }

        self.queue.push(QueueItem::Url(url)).await?;
        Ok(true)
    }

    /// Sleeps until this worker may dispatch to `host`, then takes the slot.
    async fn wait_for_domain_slot(&self, host: &str, delay: Duration) {
        loop {
            let wait = {
                let mut state = self.state.lock().expect("crawl state lock poisoned");
                match state.last_request.get(host) {
                    Some(last) if last.elapsed() < delay => delay - last.elapsed(),
                    _ => {
                        state.last_request.insert(host.to_string(), Instant::now());
                        return;
                    }
                }
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Counts a skipped URL as completed and re-checks the drain condition.
    async fn mark_skipped(&self, target: &ScraperUrl, reason: &str) {
        tracing::info!(url = %target.normalized, reason, "Skipping URL");
        {
            let mut state = self.state.lock().expect("crawl state lock poisoned");
            state.skipped_count += 1;
            state.completed_count += 1;
        }
        let _ = self.check_drain().await;
    }

    /// A sitemap/feed seed entry rejected by the channel filters.
    fn mark_seed_filtered(&self, url: &ScraperUrl) {
        tracing::debug!(url = %url.normalized, "Seed entry outside channel scope");
    }

    async fn mark_error(&self, target: &ScraperUrl) {
        {
            let mut state = self.state.lock().expect("crawl state lock poisoned");
            state.error_count += 1;
            state.completed_count += 1;
        }
        tracing::debug!(url = %target.normalized, "Completed with error");
        let _ = self.check_drain().await;
    }

    async fn mark_crawled(&self, target: &ScraperUrl) {
        {
            let mut state = self.state.lock().expect("crawl state lock poisoned");
            state.completed_count += 1;
            state.crawled.push(target.normalized.clone());
        }
        let _ = self.check_drain().await;
    }

    /// Injects the terminal markers when all initiated work is done.
    ///
    /// The `markers_sent` flag makes the injection happen exactly once per
    /// run, whether triggered here or by `stop()`.
    async fn check_drain(&self) -> Result<()> {
        let should_send = {
            let mut state = self.state.lock().expect("crawl state lock poisoned");
            // Never during seeding: the initiated count is still growing
            if state.phase == Phase::Draining
                && !state.markers_sent
                && state.completed_count >= state.initiated_count
            {
                state.markers_sent = true;
                true
            } else {
                false
            }
        };
        if should_send {
            tracing::debug!("All initiated URLs completed, injecting terminal markers");
            self.send_terminal_markers().await?;
        }
        Ok(())
    }

    async fn send_terminal_markers(&self) -> Result<()> {
        for _ in 0..self.config.crawler.workers {
            self.queue.push(QueueItem::Terminate).await?;
        }
        Ok(())
    }
}
