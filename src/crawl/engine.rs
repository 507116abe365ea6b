// src/crawl/engine.rs
// =============================================================================
// The depth-first traversal engine.
//
// How it works:
// 1. Pre-flight: the seed must be http(s), have a host, and pass the SSRF
//    guard. Nothing touches the network before that.
// 2. Push (seed, depth 0, no parent) onto a stack (the frontier).
// 3. Pop, skip if visited or too deep, skip if its route was already
//    counted, otherwise fetch it, push its same-domain links, emit a page
//    event, and record it in the discovery tree.
//    Links to other hosts (subdomains) go through the SSRF guard before
//    they are pushed, once per host; a page that a redirect delivered from
//    an unchecked host is checked the same way before its body is used.
// 4. Repeat until the stack is empty or the page budget is used up.
//
// The stack makes this depth-first. Links on a page are pushed in REVERSE
// document order so the first link on a page is the first one explored;
// crawls of the same static site are therefore fully deterministic.
//
// CrawlSession is a pull-driven state machine:
//
//   Init -> Running -> PageBounded | DepthBounded | Exhausted -> Done
//
// next_event() advances it by exactly one event. Nothing is fetched until
// the consumer asks for the next event, and the politeness delay is paid
// lazily right before the next fetch.
// =============================================================================

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::event::{progress, CrawlEvent, PageEvent};
use super::result::{CrawlResult, ResultParts, StopReason};
use super::tree::TreeBuilder;
use crate::config::CrawlConfig;
use crate::error::{CrawlError, FetchError};
use crate::fetch::{FetchClient, FetchRequest, HttpTransport, ReqwestTransport};
use crate::links::{HtmlLinkExtractor, LinkExtractor};
use crate::urls::{self, HostResolver, SafetyGuard, SystemResolver};

/// Boxed stream of crawl events, as returned by [`Crawler::crawl_incremental`].
pub type CrawlStream = Pin<Box<dyn Stream<Item = CrawlEvent> + Send>>;

/// A URL waiting on the frontier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: usize,
    /// Canonical URL of the page this link was found on
    pub parent: Option<String>,
}

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    Init,
    Running,
    /// Stopped because the page budget was used up
    PageBounded,
    /// Frontier drained after discarding entries beyond max_depth
    DepthBounded,
    /// Frontier drained (or the crawl was cancelled)
    Exhausted,
    Done,
}

/// Entry point: owns the settings and the collaborators for crawling.
///
/// Cheap to clone; every crawl gets its own [`CrawlSession`] with fresh
/// frontier, visited set and tree, so clones can crawl concurrently.
#[derive(Clone)]
pub struct Crawler {
    config: Arc<CrawlConfig>,
    fetcher: FetchClient,
    extractor: Arc<dyn LinkExtractor>,
    guard: SafetyGuard,
    cancel: CancellationToken,
}

/// Wires a [`Crawler`] together. Anything not supplied gets the production
/// implementation (reqwest, scraper, system DNS).
pub struct CrawlerBuilder {
    config: CrawlConfig,
    transport: Option<Arc<dyn HttpTransport>>,
    extractor: Option<Arc<dyn LinkExtractor>>,
    resolver: Option<Arc<dyn HostResolver>>,
    cancel: Option<CancellationToken>,
}

impl CrawlerBuilder {
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn extractor(mut self, extractor: Arc<dyn LinkExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Cancelling this token aborts every crawl started by the crawler.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<Crawler, CrawlError> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(self.config.max_redirects)?),
        };

        Ok(Crawler {
            fetcher: FetchClient::new(transport),
            extractor: self.extractor.unwrap_or_else(|| Arc::new(HtmlLinkExtractor)),
            guard: SafetyGuard::new(self.resolver.unwrap_or_else(|| Arc::new(SystemResolver))),
            cancel: self.cancel.unwrap_or_default(),
            config: Arc::new(self.config),
        })
    }
}

impl Crawler {
    /// A crawler with the production HTTP client, HTML parser and resolver.
    pub fn new(config: CrawlConfig) -> Result<Self, CrawlError> {
        Self::builder(config).build()
    }

    pub fn builder(config: CrawlConfig) -> CrawlerBuilder {
        CrawlerBuilder {
            config,
            transport: None,
            extractor: None,
            resolver: None,
            cancel: None,
        }
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Token that cancels every crawl run by this crawler.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Pre-flight validation of a seed URL, without crawling.
    pub async fn validate_seed(&self, url: &str) -> Result<Url, CrawlError> {
        urls::validate_seed(url, &self.guard).await
    }

    pub async fn validate_url(&self, url: &str) -> bool {
        self.validate_seed(url).await.is_ok()
    }

    /// Validates the seed and returns a session ready to emit events.
    pub async fn start(&self, seed_url: &str) -> Result<CrawlSession, CrawlError> {
        let seed = self.validate_seed(seed_url).await?;
        Ok(CrawlSession::new(self.clone(), seed.as_str()))
    }

    /// Crawls to completion and returns the final report.
    pub async fn crawl(&self, seed_url: &str) -> Result<CrawlResult, CrawlError> {
        Ok(self.start(seed_url).await?.run().await)
    }

    /// Crawls to completion, handing every event to `on_event` as it happens.
    pub async fn crawl_with<F>(&self, seed_url: &str, mut on_event: F) -> Result<CrawlResult, CrawlError>
    where
        F: FnMut(&CrawlEvent),
    {
        let mut session = self.start(seed_url).await?;
        while let Some(event) = session.next_event().await {
            on_event(&event);
            if let CrawlEvent::Complete { result, .. } = event {
                return Ok(*result);
            }
        }
        Ok(session.result())
    }

    /// Validates the seed, then returns the crawl as a stream of events.
    ///
    /// An invalid or unsafe seed is an `Err` here, never an empty stream.
    pub async fn crawl_incremental(&self, seed_url: &str) -> Result<CrawlStream, CrawlError> {
        Ok(self.start(seed_url).await?.into_stream())
    }
}

/// State of one crawl. Owned exclusively by whoever drives it.
pub struct CrawlSession {
    crawler: Crawler,
    start_url: String,
    origin: String,
    state: TraversalState,

    frontier: Vec<FrontierEntry>,
    visited: HashSet<String>,
    processed: HashSet<String>,

    found: BTreeSet<String>,
    invalid: BTreeSet<String>,
    route_depths: BTreeMap<String, usize>,
    tree: TreeBuilder,

    pages_crawled: usize,
    max_depth_reached: usize,
    depth_pruned: usize,

    /// SSRF verdicts for hosts other than the origin
    host_verdicts: HashMap<String, bool>,
    /// Goes false for the rest of the session after a TLS downgrade
    verify_ssl: bool,

    pending_delay: bool,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    cancelled: bool,
}

impl CrawlSession {
    fn new(crawler: Crawler, seed: &str) -> Self {
        let cancel = crawler.cancel.child_token();
        let deadline = crawler.config.crawl_timeout.map(|timeout| Instant::now() + timeout);

        Self {
            origin: urls::get_domain(seed),
            start_url: seed.to_string(),
            state: TraversalState::Init,
            frontier: vec![FrontierEntry {
                url: seed.to_string(),
                depth: 0,
                parent: None,
            }],
            visited: HashSet::new(),
            processed: HashSet::new(),
            found: BTreeSet::new(),
            invalid: BTreeSet::new(),
            route_depths: BTreeMap::new(),
            tree: TreeBuilder::default(),
            pages_crawled: 0,
            max_depth_reached: 0,
            depth_pruned: 0,
            host_verdicts: HashMap::new(),
            verify_ssl: crawler.config.verify_ssl,
            pending_delay: false,
            cancel,
            deadline,
            cancelled: false,
            crawler,
        }
    }

    pub fn state(&self) -> TraversalState {
        self.state
    }

    /// Cancels only this session.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Advances the crawl by one event. `None` once Complete has been sent.
    pub async fn next_event(&mut self) -> Option<CrawlEvent> {
        loop {
            match self.state {
                TraversalState::Init => {
                    info!(
                        url = %self.start_url,
                        max_pages = self.crawler.config.max_pages,
                        max_depth = self.crawler.config.max_depth,
                        "Starting crawl"
                    );
                    self.state = TraversalState::Running;
                    return Some(CrawlEvent::Start {
                        url: self.start_url.clone(),
                        max_pages: self.crawler.config.max_pages,
                        max_depth: self.crawler.config.max_depth,
                    });
                }
                TraversalState::Running => {
                    if let Some(page) = self.step().await {
                        return Some(CrawlEvent::Page(page));
                    }
                    // step() moved us to a terminal state; loop to emit Complete
                }
                TraversalState::PageBounded | TraversalState::DepthBounded | TraversalState::Exhausted => {
                    let result = self.result();
                    info!(
                        url = %self.start_url,
                        state = ?self.state,
                        stop_reason = %result.stop_reason,
                        pages_crawled = result.pages_crawled,
                        found = result.found_routes.len(),
                        invalid = result.invalid_routes.len(),
                        cancelled = result.cancelled,
                        "Crawl finished"
                    );
                    self.state = TraversalState::Done;
                    return Some(CrawlEvent::Complete {
                        stop_reason: result.stop_reason,
                        result: Box::new(result),
                    });
                }
                TraversalState::Done => return None,
            }
        }
    }

    /// Drives the session to the end and returns the final report.
    pub async fn run(mut self) -> CrawlResult {
        while let Some(event) = self.next_event().await {
            if let CrawlEvent::Complete { result, .. } = event {
                return *result;
            }
        }
        self.result()
    }

    pub fn into_stream(self) -> CrawlStream {
        Box::pin(futures::stream::unfold(self, |mut session| async move {
            let event = session.next_event().await?;
            Some((event, session))
        }))
    }

    /// Processes frontier entries until one page has been handled.
    ///
    /// Returns `None` (after setting a terminal state) when the loop is over.
    async fn step(&mut self) -> Option<PageEvent> {
        let config = Arc::clone(&self.crawler.config);

        loop {
            if self.pages_crawled >= config.max_pages {
                self.state = TraversalState::PageBounded;
                return None;
            }
            if self.is_interrupted() {
                self.mark_cancelled();
                return None;
            }

            let entry = match self.frontier.pop() {
                Some(entry) => entry,
                None => {
                    self.state = if self.depth_pruned > 0 {
                        TraversalState::DepthBounded
                    } else {
                        TraversalState::Exhausted
                    };
                    return None;
                }
            };

            let key = urls::normalize(&entry.url);
            if self.visited.contains(&key) {
                continue;
            }
            // Not marked visited: a shallower path to the same URL may still come
            if entry.depth > config.max_depth {
                self.depth_pruned += 1;
                continue;
            }

            if self.pending_delay {
                self.pending_delay = false;
                if !self.pause(config.delay).await {
                    self.frontier.push(entry);
                    self.mark_cancelled();
                    return None;
                }
            }

            self.visited.insert(key.clone());
            let route = urls::extract_path(&key);
            if !self.processed.insert(route.clone()) {
                debug!(url = %entry.url, route = %route, "Route already processed via another URL");
                continue;
            }

            self.pages_crawled += 1;
            self.max_depth_reached = self.max_depth_reached.max(entry.depth);

            let (is_valid, links) = self.fetch_and_extract(&entry.url, &config).await;

            // Reverse so the first link on the page is popped first
            for link in links.iter().rev() {
                let link = urls::normalize(link);
                if !urls::is_valid_for_domain(&link, &self.origin) || self.visited.contains(&link) {
                    continue;
                }
                if !self.host_is_safe(&link).await {
                    debug!(url = %link, "Skipping link to unsafe host");
                    continue;
                }
                self.frontier.push(FrontierEntry {
                    url: link,
                    depth: entry.depth + 1,
                    parent: Some(key.clone()),
                });
            }

            if is_valid {
                self.found.insert(route.clone());
            } else {
                self.invalid.insert(route.clone());
            }
            self.route_depths.entry(route.clone()).or_insert(entry.depth);
            self.tree.record(&key, &route, entry.depth, is_valid, entry.parent.as_deref());
            self.pending_delay = true;

            debug!(
                url = %entry.url,
                route = %route,
                depth = entry.depth,
                is_valid,
                pages_crawled = self.pages_crawled,
                "Processed page"
            );

            return Some(PageEvent {
                route,
                url: entry.url,
                depth: entry.depth,
                is_valid,
                pages_crawled: self.pages_crawled,
                queue_size: self.queue_size(config.max_depth),
                progress: progress(self.pages_crawled, config.max_pages),
            });
        }
    }

    // Fetch failures and extractor panics both just make the page invalid
    async fn fetch_and_extract(&mut self, url: &str, config: &CrawlConfig) -> (bool, Vec<String>) {
        let mut request = FetchRequest::from_config(url, config);
        request.verify_ssl = self.verify_ssl;

        let fetched = tokio::select! {
            fetched = self.crawler.fetcher.fetch(&mut request) => fetched,
            _ = self.interrupted() => Err(FetchError::Cancelled),
        };

        if self.verify_ssl && !request.verify_ssl {
            warn!(url = %url, "Certificate verification disabled for the rest of this crawl");
            self.verify_ssl = false;
        }

        let page = match fetched {
            Ok(page) => page,
            Err(reason) => {
                debug!(url = %url, reason = %reason, "Page unavailable");
                return (false, Vec::new());
            }
        };

        if page.url != url
            && (!urls::is_valid_for_domain(&page.url, &self.origin) || !self.host_is_safe(&page.url).await)
        {
            warn!(url = %url, final_url = %page.url, "Redirect landed on an unsafe or foreign host");
            return (false, Vec::new());
        }

        // Relative links resolve against where the page actually lives
        let extractor = Arc::clone(&self.crawler.extractor);
        match panic::catch_unwind(AssertUnwindSafe(|| extractor.extract_links(&page.body, &page.url))) {
            Ok(links) => (true, links),
            Err(_) => {
                warn!(url = %url, "Link extraction panicked, marking page invalid");
                (false, Vec::new())
            }
        }
    }

    // The origin passed pre-flight; any other host is checked once
    async fn host_is_safe(&mut self, url: &str) -> bool {
        let host = urls::get_domain(url);
        if host == self.origin {
            return true;
        }
        if let Some(&verdict) = self.host_verdicts.get(&host) {
            return verdict;
        }

        let verdict = self.crawler.guard.is_safe(url).await;
        self.host_verdicts.insert(host, verdict);
        verdict
    }

    // O(frontier) per page; fine for the page budgets we run with
    fn queue_size(&self, max_depth: usize) -> usize {
        self.frontier
            .iter()
            .filter(|entry| entry.depth <= max_depth && !self.visited.contains(&entry.url))
            .count()
    }

    /// Sleeps for the politeness delay. Returns false if interrupted.
    async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return !self.is_interrupted();
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = self.interrupted() => false,
        }
    }

    fn is_interrupted(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }

    async fn interrupted(&self) {
        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
            None => self.cancel.cancelled().await,
        }
    }

    fn mark_cancelled(&mut self) {
        warn!(url = %self.start_url, pages_crawled = self.pages_crawled, "Crawl cancelled");
        self.cancelled = true;
        self.state = TraversalState::Exhausted;
    }

    fn stop_reason(&self) -> StopReason {
        if self.pages_crawled >= self.crawler.config.max_pages {
            StopReason::MaxPagesReached
        } else if self.frontier.is_empty() || self.cancelled {
            StopReason::QueueEmpty
        } else {
            StopReason::Unknown
        }
    }

    /// Snapshot of the report as of now.
    pub fn result(&self) -> CrawlResult {
        CrawlResult::assemble(ResultParts {
            start_url: self.start_url.clone(),
            found: self.found.clone(),
            invalid: self.invalid.clone(),
            pages_crawled: self.pages_crawled,
            max_depth_reached: self.max_depth_reached,
            route_depths: self.route_depths.clone(),
            stop_reason: self.stop_reason(),
            cancelled: self.cancelled,
            tree: self.tree.build(),
        })
    }
}
