// src/links/mod.rs
// =============================================================================
// Link extraction.
//
// The crawler only needs one capability from HTML: "give me the links on this
// page". Keeping it behind the LinkExtractor trait lets tests (or a future
// sitemap-based source) plug in something else.
// =============================================================================

mod html;

pub use html::{HtmlLinkExtractor, LinkExtractor};
