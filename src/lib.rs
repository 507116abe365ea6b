// src/lib.rs
// =============================================================================
// route-scout: a bounded, single-origin, depth-first website crawler.
//
// Give it a seed URL and it walks every same-domain page it can reach (up to
// a page budget and a depth limit), then reports which routes served HTML,
// which did not, and the tree in which they were discovered.
//
// Quick start:
//
//     let crawler = Crawler::new(CrawlConfig::default().with_max_pages(50))?;
//     let result = crawler.crawl("https://example.com").await?;
//     println!("{}", result.tree_visual);
//
// Use Crawler::crawl_incremental for a Stream of progress events instead.
// =============================================================================

pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod links;
pub mod urls;

#[cfg(test)]
mod testing;

pub use config::CrawlConfig;
pub use crawl::{CrawlEvent, CrawlResult, CrawlSession, CrawlStream, Crawler, PageEvent, StopReason, TreeNode};
pub use error::{CrawlError, FetchError};
