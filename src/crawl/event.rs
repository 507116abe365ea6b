// src/crawl/event.rs
// =============================================================================
// Progress events emitted by an incremental crawl.
//
// Exactly one Start, then one Page per processed route in discovery order,
// then exactly one Complete. The `type` tag makes each event a standalone
// JSON object, ready to be written as an NDJSON line or an SSE message.
// =============================================================================

use serde::Serialize;

use super::result::{CrawlResult, StopReason};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrawlEvent {
    Start {
        url: String,
        max_pages: usize,
        max_depth: usize,
    },
    Page(PageEvent),
    Complete {
        result: Box<CrawlResult>,
        stop_reason: StopReason,
    },
}

/// One processed page plus running totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageEvent {
    pub route: String,
    pub url: String,
    pub depth: usize,
    pub is_valid: bool,
    pub pages_crawled: usize,
    /// Unvisited frontier entries still within the depth bound
    pub queue_size: usize,
    /// 0-100
    pub progress: u8,
}

/// Integer percentage of the page budget used so far.
pub(crate) fn progress(pages_crawled: usize, max_pages: usize) -> u8 {
    if max_pages == 0 {
        return 100;
    }
    (pages_crawled.saturating_mul(100) / max_pages).min(100) as u8
}
