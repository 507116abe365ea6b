// src/fetch/agents.rs
// =============================================================================
// User-agent strings and rotation.
//
// Some sites serve bots a 403 or an empty shell. Rotating between a few real
// desktop browser strings gets us the same page a visitor would see.
// =============================================================================

use crate::config::CrawlConfig;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const POOL: &[&str] = &[
    DEFAULT_USER_AGENT,
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

/// The built-in rotation pool.
pub fn default_pool() -> Vec<String> {
    POOL.iter().map(|agent| agent.to_string()).collect()
}

/// Picks the user agent for one fetch.
///
/// With rotation on and a non-empty pool, one entry is chosen at random per
/// call; otherwise the configured single agent is used every time.
pub fn pick_user_agent(config: &CrawlConfig) -> &str {
    if config.rotate_user_agent && !config.user_agents.is_empty() {
        let index = fastrand::usize(..config.user_agents.len());
        &config.user_agents[index]
    } else {
        &config.user_agent
    }
}
