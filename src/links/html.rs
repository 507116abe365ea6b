// src/links/html.rs
// =============================================================================
// Pulls hyperlinks out of HTML pages.
//
// We use the `scraper` crate (html5ever underneath) to parse the page and the
// `url` crate to resolve relative hrefs against the page URL.
//
// Order matters here: links come back in document order, and the crawler
// relies on that to make its depth-first walk deterministic.
// =============================================================================

use scraper::{Html, Selector};
use url::Url;

/// Turns HTML into absolute candidate links.
pub trait LinkExtractor: Send + Sync {
    /// Returns every http(s) `<a href>` target in `html`, resolved against
    /// `base_url`, in document order. Duplicates are kept.
    fn extract_links(&self, html: &str, base_url: &str) -> Vec<String>;
}

/// `scraper`-backed extractor for `<a href>` elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlLinkExtractor;

impl LinkExtractor for HtmlLinkExtractor {
    fn extract_links(&self, html: &str, base_url: &str) -> Vec<String> {
        extract_html_links(html, base_url)
    }
}

// Example:
//   html = "<a href='/docs'>Docs</a>"
//   base_url = "https://example.com/guide/"
//   result = ["https://example.com/docs"]
fn extract_html_links(html: &str, base_url: &str) -> Vec<String> {
    let base = match Url::parse(base_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(base_url = %base_url, error = %e, "Invalid base URL, skipping link extraction");
            return Vec::new();
        }
    };

    let document = Html::parse_document(html);

    // Constant selector, known to be valid
    let selector = Selector::parse("a[href]").expect("a[href] is a valid selector");

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(&base, href))
        .collect()
}

// Resolves a possibly-relative href, skipping things that aren't pages
fn resolve_link(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();

    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
        || href.starts_with("data:")
    {
        return None;
    }

    let url = base.join(href).ok()?;
    match url.scheme() {
        "http" | "https" => Some(url.to_string()),
        _ => None,
    }
}
