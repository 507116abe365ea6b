// src/error.rs
// =============================================================================
// Typed errors for the crawl engine.
//
// Three layers of failure exist and they are kept apart on purpose:
// - CrawlError: the crawl could not start (bad seed, unsafe seed, bad config)
// - TransportError: what the HTTP layer reports for a single request
// - FetchError: why a page fetch produced no HTML after retries
//
// Only CrawlError ever reaches the caller of crawl(). Fetch failures are
// recorded on the page (is_valid = false) and the traversal keeps going.
// =============================================================================

use thiserror::Error;

/// Errors that stop a crawl before any page is fetched.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The seed URL is malformed or uses a scheme we don't crawl
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The seed URL points at a private, loopback or unresolvable host
    #[error("unsafe URL '{url}': {reason}")]
    UnsafeUrl { url: String, reason: String },

    /// The crawl configuration cannot be used as given
    #[error("invalid crawl configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl CrawlError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsafe_url(url: &str, reason: impl Into<String>) -> Self {
        Self::UnsafeUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Transport-level failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Tls,
    TooManyRedirects,
    Other,
}

/// A request that never produced an HTTP response.
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Why a fetch came back empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("redirect HTTP {0} not followed")]
    Redirect(u16),

    #[error("non-HTML content type '{content_type}'")]
    NotHtml { content_type: String },

    #[error("HTTP 403 forbidden")]
    Forbidden,

    #[error("HTTP 429 rate limited")]
    RateLimited,

    #[error("HTTP {0} server error")]
    ServerError(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("TLS failure: {0}")]
    Tls(String),

    #[error("too many redirects")]
    TooManyRedirects,

    #[error("transport error: {0}")]
    Transport(String),

    /// The crawl was cancelled while this fetch was in flight
    #[error("crawl cancelled")]
    Cancelled,
}

impl From<TransportError> for FetchError {
    fn from(err: TransportError) -> Self {
        match err.kind {
            TransportErrorKind::Timeout => FetchError::Timeout,
            TransportErrorKind::Connect => FetchError::Connect(err.message),
            TransportErrorKind::Tls => FetchError::Tls(err.message),
            TransportErrorKind::TooManyRedirects => FetchError::TooManyRedirects,
            TransportErrorKind::Other => FetchError::Transport(err.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_maps_to_fetch_error() {
        let err = TransportError::new(TransportErrorKind::Tls, "bad certificate");
        assert_eq!(FetchError::from(err), FetchError::Tls("bad certificate".into()));

        let err = TransportError::new(TransportErrorKind::Timeout, "deadline");
        assert_eq!(FetchError::from(err), FetchError::Timeout);
    }

    #[test]
    fn test_crawl_error_messages_carry_reason() {
        let err = CrawlError::unsafe_url("http://10.0.0.1/", "private address");
        assert_eq!(err.to_string(), "unsafe URL 'http://10.0.0.1/': private address");
    }
}
