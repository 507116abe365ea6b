// src/config.rs
// =============================================================================
// Settings for one crawl session.
//
// A CrawlConfig is built once (from CLI flags, env vars or code), validated,
// and then only read. The engine never mutates it mid-crawl; the one setting
// that can change during a fetch (TLS verification) is tracked per fetch call
// instead.
// =============================================================================

use std::time::Duration;

use crate::error::CrawlError;
use crate::fetch::agents;

/// Immutable settings for a single crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Maximum number of distinct routes to fetch
    pub max_pages: usize,
    /// Maximum link distance from the seed (seed = 0)
    pub max_depth: usize,
    /// Politeness delay between page fetches
    pub delay: Duration,
    /// User agent used when rotation is off (or the pool is empty)
    pub user_agent: String,
    /// Pick a user agent from `user_agents` for every fetch
    pub rotate_user_agent: bool,
    pub user_agents: Vec<String>,
    pub verify_ssl: bool,
    /// Total attempts per fetch, shared across all retryable failures
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    /// Optional deadline for the whole crawl
    pub crawl_timeout: Option<Duration>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_pages: 100,
            max_depth: 10,
            delay: Duration::from_millis(100),
            user_agent: agents::DEFAULT_USER_AGENT.to_string(),
            rotate_user_agent: true,
            user_agents: agents::default_pool(),
            verify_ssl: true,
            retry_count: 3,
            retry_delay: Duration::from_secs(1),
            follow_redirects: true,
            max_redirects: 10,
            crawl_timeout: None,
        }
    }
}

impl CrawlConfig {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a single fixed user agent and turn rotation off.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self.rotate_user_agent = false;
        self
    }

    /// Rotate through the given pool of user agents.
    pub fn with_user_agent_pool(mut self, pool: Vec<String>) -> Self {
        self.user_agents = pool;
        self.rotate_user_agent = true;
        self
    }

    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    pub fn with_retries(mut self, retry_count: u32, retry_delay: Duration) -> Self {
        self.retry_count = retry_count;
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_follow_redirects(mut self, follow_redirects: bool) -> Self {
        self.follow_redirects = follow_redirects;
        self
    }

    pub fn with_crawl_timeout(mut self, crawl_timeout: Duration) -> Self {
        self.crawl_timeout = Some(crawl_timeout);
        self
    }

    /// Rejects settings the engine cannot honour.
    pub fn validate(&self) -> Result<(), CrawlError> {
        if self.max_pages == 0 {
            return Err(CrawlError::InvalidConfig("max_pages must be at least 1".into()));
        }
        if self.retry_count == 0 {
            return Err(CrawlError::InvalidConfig("retry_count must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(CrawlError::InvalidConfig("timeout must be greater than zero".into()));
        }
        if self.rotate_user_agent && self.user_agents.is_empty() && self.user_agent.is_empty() {
            return Err(CrawlError::InvalidConfig(
                "user agent rotation needs a non-empty pool or a fallback user agent".into(),
            ));
        }
        Ok(())
    }
}
