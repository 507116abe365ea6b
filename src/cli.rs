// src/cli.rs
// =============================================================================
// This file defines our command-line interface using the `clap` crate.
//
// Three subcommands:
// - crawl:  crawl a site and print the report (table, --json or --tree)
// - stream: crawl a site and print each event as it happens
// - check:  only run the seed pre-flight checks, no crawling
//
// Every crawl setting is a flag that can also come from a CRAWLER_*
// environment variable, e.g. CRAWLER_MAX_PAGES=500. Flags win over env vars.
//
// Rust concepts:
// - #[command(flatten)]: share one group of flags between subcommands
// - value_parser: a plain function that turns a string into a typed value
// =============================================================================

use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use route_scout::CrawlConfig;

#[derive(Parser, Debug)]
#[command(
    name = "route-scout",
    version,
    about = "Map every route reachable on a website, depth-first",
    long_about = "route-scout crawls a single website depth-first from a seed URL, within a page budget \
                  and a depth limit, and reports which routes served HTML, which did not, and the tree \
                  in which they were discovered."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a website and print the final report
    ///
    /// Example: route-scout crawl https://example.com --max-pages 50 --tree
    Crawl {
        /// Seed URL (must include http:// or https://)
        url: String,

        /// Print the full result as JSON instead of a table
        #[arg(long, conflicts_with = "tree")]
        json: bool,

        /// Print the discovery tree instead of a table
        #[arg(long)]
        tree: bool,

        #[command(flatten)]
        settings: CrawlArgs,
    },

    /// Crawl a website, printing progress events as they happen
    ///
    /// Example: route-scout stream https://example.com --json | jq .
    Stream {
        url: String,

        /// One JSON object per line (start, page..., complete)
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        settings: CrawlArgs,
    },

    /// Check whether a URL would be accepted as a seed, without crawling
    ///
    /// Example: route-scout check http://localhost:8080
    Check { url: String },
}

// Crawl settings shared by `crawl` and `stream`.
// Defaults mirror CrawlConfig::default().
#[derive(Args, Debug, Clone)]
pub struct CrawlArgs {
    /// Maximum number of distinct routes to fetch
    #[arg(long, env = "CRAWLER_MAX_PAGES", default_value_t = 100)]
    pub max_pages: usize,

    /// Maximum link distance from the seed page (seed = 0)
    #[arg(long, env = "CRAWLER_MAX_DEPTH", default_value_t = 10)]
    pub max_depth: usize,

    /// Delay between page fetches, in seconds
    #[arg(long, env = "CRAWLER_DELAY", default_value = "0.1", value_parser = parse_seconds)]
    pub delay: Duration,

    /// Per-request timeout, in seconds
    #[arg(long, env = "CRAWLER_TIMEOUT", default_value = "10", value_parser = parse_seconds)]
    pub timeout: Duration,

    /// Send this user agent on every request (turns rotation off)
    #[arg(long, env = "CRAWLER_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Rotate through a pool of browser user agents
    #[arg(long, env = "CRAWLER_ROTATE_USER_AGENT", action = ArgAction::Set, default_value_t = true)]
    pub rotate_user_agent: bool,

    /// Verify TLS certificates (a failing fetch still retries once without)
    #[arg(long, env = "CRAWLER_VERIFY_SSL", action = ArgAction::Set, default_value_t = true)]
    pub verify_ssl: bool,

    /// Total attempts per page
    #[arg(long, env = "CRAWLER_RETRY_COUNT", default_value_t = 3)]
    pub retry_count: u32,

    /// Base delay between attempts, in seconds
    #[arg(long, env = "CRAWLER_RETRY_DELAY", default_value = "1", value_parser = parse_seconds)]
    pub retry_delay: Duration,

    /// Follow HTTP redirects
    #[arg(long, env = "CRAWLER_FOLLOW_REDIRECTS", action = ArgAction::Set, default_value_t = true)]
    pub follow_redirects: bool,

    /// Give up on the whole crawl after this many seconds
    #[arg(long, env = "CRAWLER_CRAWL_TIMEOUT", value_parser = parse_seconds)]
    pub crawl_timeout: Option<Duration>,
}

impl CrawlArgs {
    pub fn into_config(self) -> CrawlConfig {
        let mut config = CrawlConfig::default()
            .with_max_pages(self.max_pages)
            .with_max_depth(self.max_depth)
            .with_delay(self.delay)
            .with_timeout(self.timeout)
            .with_verify_ssl(self.verify_ssl)
            .with_retries(self.retry_count, self.retry_delay)
            .with_follow_redirects(self.follow_redirects);

        config.rotate_user_agent = self.rotate_user_agent;
        if let Some(user_agent) = self.user_agent {
            config = config.with_user_agent(user_agent);
        }
        if let Some(crawl_timeout) = self.crawl_timeout {
            config = config.with_crawl_timeout(crawl_timeout);
        }
        config
    }
}

// Parses a non-negative number of seconds, e.g. "0.5" or "10"
fn parse_seconds(value: &str) -> Result<Duration, String> {
    let seconds: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number of seconds", value))?;
    Duration::try_from_secs_f64(seconds).map_err(|_| format!("'{}' is not a valid duration", value))
}


// -----------------------------------------------------------------------------
// BEGINNER NOTES:
//
// 1. What does #[command(flatten)] do?
//    - It splices every field of CrawlArgs into the subcommand as if they
//      were declared there, so `crawl` and `stream` accept the same flags
//
// 2. Why ArgAction::Set for the booleans?
//    - A plain bool flag can only be switched ON (--json)
//    - These default to true, so they take a value: --verify-ssl false
//    - That also makes CRAWLER_VERIFY_SSL=false work from the environment
//
// 3. What is Duration::try_from_secs_f64?
//    - It converts 0.5 into 500ms, and returns an error (instead of
//      panicking) for negative or non-finite numbers
// -----------------------------------------------------------------------------
