// src/crawl/mod.rs
// =============================================================================
// The crawl itself.
//
// Submodules:
// - engine: depth-first traversal, the Crawler entry point and CrawlSession
// - event: Start / Page / Complete progress events
// - result: the final CrawlResult report
// - tree: the discovery tree and its text rendering
//
// Rust concepts:
// - Streams: an incremental crawl is a Stream of CrawlEvent values
// - Ownership: each CrawlSession owns its frontier, visited set and tree
// =============================================================================

mod engine;
mod event;
mod result;
mod tree;

pub use engine::{CrawlSession, CrawlStream, Crawler, CrawlerBuilder, FrontierEntry, TraversalState};
pub use event::{CrawlEvent, PageEvent};
pub use result::{CrawlResult, StopReason, Validation};
pub use tree::TreeNode;
