// src/crawl/tree.rs
// =============================================================================
// The discovery tree.
//
// Each processed page becomes a node hanging off the page whose link led to
// it first. It's a DFS discovery tree, not a link graph: a page linked from
// five places still appears exactly once, under whoever found it.
//
// While crawling we keep nodes in a flat arena (Vec + index by canonical URL)
// so attaching a child is O(1) and nothing needs Rc/RefCell. The owned,
// nested TreeNode is only built once the crawl is over.
// =============================================================================

use std::collections::HashMap;

use serde::Serialize;

/// One fetched page in the discovery tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
    pub url: String,
    pub route: String,
    pub depth: usize,
    pub is_valid: bool,
    /// In discovery order
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// Number of nodes in this subtree, including itself.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }

    /// Routes in pre-order (the order the crawler processed them).
    pub fn routes(&self) -> Vec<&str> {
        let mut routes = vec![self.route.as_str()];
        for child in &self.children {
            routes.extend(child.routes());
        }
        routes
    }

    /// Renders the tree with box-drawing connectors:
    ///
    /// ```text
    /// / ✓
    /// ├── /docs ✓
    /// │   └── /docs/install ✗
    /// └── /about ✓
    /// ```
    pub fn visualize(&self) -> String {
        let mut out = format!("{} {}\n", self.route, mark(self.is_valid));
        render_children(&self.children, "", &mut out);
        out
    }
}

fn mark(is_valid: bool) -> &'static str {
    if is_valid {
        "✓"
    } else {
        "✗"
    }
}

fn render_children(children: &[TreeNode], prefix: &str, out: &mut String) {
    for (i, child) in children.iter().enumerate() {
        let last = i + 1 == children.len();
        let connector = if last { "└── " } else { "├── " };
        out.push_str(&format!("{}{}{} {}\n", prefix, connector, child.route, mark(child.is_valid)));

        let extension = if last { "    " } else { "│   " };
        render_children(&child.children, &format!("{}{}", prefix, extension), out);
    }
}

#[derive(Debug)]
struct ArenaNode {
    url: String,
    route: String,
    depth: usize,
    is_valid: bool,
    children: Vec<usize>,
}

/// Accumulates nodes during a crawl.
#[derive(Debug, Default)]
pub(crate) struct TreeBuilder {
    nodes: Vec<ArenaNode>,
    by_url: HashMap<String, usize>,
    root: Option<usize>,
}

impl TreeBuilder {
    /// Records a processed page.
    ///
    /// `url` and `parent` are canonical URLs. A page whose parent was never
    /// recorded stays detached; the first parentless page becomes the root.
    pub(crate) fn record(&mut self, url: &str, route: &str, depth: usize, is_valid: bool, parent: Option<&str>) {
        let index = self.nodes.len();
        self.nodes.push(ArenaNode {
            url: url.to_string(),
            route: route.to_string(),
            depth,
            is_valid,
            children: Vec::new(),
        });
        self.by_url.entry(url.to_string()).or_insert(index);

        match parent {
            None => {
                if self.root.is_none() {
                    self.root = Some(index);
                }
            }
            Some(parent) => match self.by_url.get(parent) {
                Some(&parent_index) => self.nodes[parent_index].children.push(index),
                None => tracing::debug!(url = %url, parent = %parent, "Parent not recorded, leaving node detached"),
            },
        }
    }

    pub(crate) fn build(&self) -> Option<TreeNode> {
        self.root.map(|root| self.build_node(root))
    }

    fn build_node(&self, index: usize) -> TreeNode {
        let node = &self.nodes[index];
        TreeNode {
            url: node.url.clone(),
            route: node.route.clone(),
            depth: node.depth,
            is_valid: node.is_valid,
            children: node.children.iter().map(|&child| self.build_node(child)).collect(),
        }
    }
}
