// src/crawl/result.rs
// =============================================================================
// The final crawl report.
//
// A CrawlResult is assembled exactly once, when the traversal ends. It
// serializes to the JSON shape API consumers expect (sorted route lists,
// per-route depths, a page-count validation block and the discovery tree).
// =============================================================================

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use super::tree::TreeNode;

/// Why the traversal loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `max_pages` routes were processed
    MaxPagesReached,
    /// The frontier drained (or the crawl was cancelled)
    QueueEmpty,
    Unknown,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::MaxPagesReached => "max_pages_reached",
            StopReason::QueueEmpty => "queue_empty",
            StopReason::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Page-count consistency check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub valid_count: usize,
    pub invalid_count: usize,
    pub total_count: usize,
    pub pages_crawled: usize,
    /// found + invalid == pages_crawled, with no route in both lists
    pub is_valid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    pub start_url: String,
    /// Sorted canonical routes that returned HTML
    pub found_routes: Vec<String>,
    /// Sorted canonical routes that could not be fetched
    pub invalid_routes: Vec<String>,
    pub pages_crawled: usize,
    pub max_depth_reached: usize,
    pub route_depths: BTreeMap<String, usize>,
    pub validation: Validation,
    pub stop_reason: StopReason,
    pub cancelled: bool,
    pub tree: Option<TreeNode>,
    pub tree_visual: String,
}

pub(crate) struct ResultParts {
    pub start_url: String,
    pub found: BTreeSet<String>,
    pub invalid: BTreeSet<String>,
    pub pages_crawled: usize,
    pub max_depth_reached: usize,
    pub route_depths: BTreeMap<String, usize>,
    pub stop_reason: StopReason,
    pub cancelled: bool,
    pub tree: Option<TreeNode>,
}

impl CrawlResult {
    pub(crate) fn assemble(parts: ResultParts) -> Self {
        let overlap = parts.found.intersection(&parts.invalid).count();
        let total_count = parts.found.len() + parts.invalid.len();
        let validation = Validation {
            valid_count: parts.found.len(),
            invalid_count: parts.invalid.len(),
            total_count,
            pages_crawled: parts.pages_crawled,
            is_valid: total_count == parts.pages_crawled && overlap == 0,
        };

        if !validation.is_valid {
            tracing::warn!(
                start_url = %parts.start_url,
                valid = validation.valid_count,
                invalid = validation.invalid_count,
                pages_crawled = validation.pages_crawled,
                overlap,
                "Page count invariant violated"
            );
        }

        let tree_visual = parts.tree.as_ref().map(TreeNode::visualize).unwrap_or_default();

        Self {
            start_url: parts.start_url,
            // BTreeSet iterates in sorted order
            found_routes: parts.found.into_iter().collect(),
            invalid_routes: parts.invalid.into_iter().collect(),
            pages_crawled: parts.pages_crawled,
            max_depth_reached: parts.max_depth_reached,
            route_depths: parts.route_depths,
            validation,
            stop_reason: parts.stop_reason,
            cancelled: parts.cancelled,
            tree: parts.tree,
            tree_visual,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.validation.is_valid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(found: &[&str], invalid: &[&str], pages_crawled: usize) -> ResultParts {
        ResultParts {
            start_url: "https://a.test/".into(),
            found: found.iter().map(|s| s.to_string()).collect(),
            invalid: invalid.iter().map(|s| s.to_string()).collect(),
            pages_crawled,
            max_depth_reached: 1,
            route_depths: BTreeMap::new(),
            stop_reason: StopReason::QueueEmpty,
            cancelled: false,
            tree: None,
        }
    }

    #[test]
    fn test_routes_are_sorted() {
        let result = CrawlResult::assemble(parts(&["/z", "/", "/a"], &["/m", "/b"], 5));
        assert_eq!(result.found_routes, vec!["/", "/a", "/z"]);
        assert_eq!(result.invalid_routes, vec!["/b", "/m"]);
        assert!(result.is_consistent());
    }

    #[test]
    fn test_count_mismatch_flagged_not_fatal() {
        let result = CrawlResult::assemble(parts(&["/"], &[], 2));
        assert!(!result.is_consistent());
        assert_eq!(result.validation.total_count, 1);
        assert_eq!(result.pages_crawled, 2);
    }

    #[test]
    fn test_overlap_flagged() {
        let result = CrawlResult::assemble(parts(&["/", "/a"], &["/a"], 3));
        assert!(!result.is_consistent());
    }

    #[test]
    fn test_serializes_stop_reason_snake_case() {
        let result = CrawlResult::assemble(parts(&["/"], &[], 1));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stop_reason"], "queue_empty");
        assert_eq!(json["validation"]["is_valid"], true);
        assert_eq!(json["tree"], serde_json::Value::Null);
        assert_eq!(StopReason::MaxPagesReached.to_string(), "max_pages_reached");
    }
}
