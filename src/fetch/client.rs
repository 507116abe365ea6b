// src/fetch/client.rs
// =============================================================================
// The resilient fetch client.
//
// One call to fetch() = up to `retry_count` transport attempts, shared by
// every kind of retryable failure:
//
//   200 + HTML content type  -> the body
//   200 + anything else      -> absent, no retry
//   403                      -> retried once, flat retry_delay
//   429                      -> retried, backoff retry_delay * (attempt + 2)
//   5xx                      -> retried, flat retry_delay
//   301/302/307/308          -> absent (redirect not followed)
//   other status             -> absent
//   TLS failure              -> next attempt runs with verification OFF;
//                               a second TLS failure is final. The request
//                               keeps verify_ssl = false afterwards so the
//                               caller can carry the downgrade forward
//   timeout / connect error  -> retried, flat retry_delay
//   too many redirects       -> absent, no retry
//
// "Absent" is an Err(FetchError) so the caller can log why; the crawler only
// cares that it isn't Ok.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::agents::pick_user_agent;
use super::transport::{is_html_content_type, HttpTransport, TransportRequest};
use crate::config::CrawlConfig;
use crate::error::{FetchError, TransportErrorKind};

/// Everything one fetch call needs.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
    pub verify_ssl: bool,
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub follow_redirects: bool,
}

impl FetchRequest {
    /// Builds a request from crawl settings, picking this call's user agent.
    pub fn from_config(url: &str, config: &CrawlConfig) -> Self {
        Self {
            url: url.to_string(),
            timeout: config.timeout,
            headers: vec![
                ("User-Agent".to_string(), pick_user_agent(config).to_string()),
                (
                    "Accept".to_string(),
                    "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8".to_string(),
                ),
            ],
            verify_ssl: config.verify_ssl,
            retry_count: config.retry_count,
            retry_delay: config.retry_delay,
            follow_redirects: config.follow_redirects,
        }
    }
}

/// An HTML page as fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Where the body came from, after redirects
    pub url: String,
    pub body: String,
}

/// HTTP GET with retries, backoff and a TLS-verification fallback.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn HttpTransport>,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Fetches `request.url`, returning the HTML page or why there is none.
    pub async fn fetch(&self, request: &mut FetchRequest) -> Result<FetchedPage, FetchError> {
        let attempts = request.retry_count.max(1);
        let mut forbidden_retried = false;
        let mut attempt: u32 = 0;

        loop {
            let has_next = attempt + 1 < attempts;
            let transport_request = TransportRequest {
                url: request.url.clone(),
                timeout: request.timeout,
                headers: request.headers.clone(),
                verify_ssl: request.verify_ssl,
                follow_redirects: request.follow_redirects,
            };

            debug!(url = %request.url, attempt, verify_ssl = request.verify_ssl, "Fetching page");

            // How long to wait before the next attempt, or the final verdict
            let backoff = match self.transport.get(&transport_request).await {
                Ok(response) => match response.status {
                    200 => {
                        let content_type = response.content_type.unwrap_or_default();
                        if is_html_content_type(&content_type) {
                            return Ok(FetchedPage {
                                url: response.final_url.unwrap_or_else(|| request.url.clone()),
                                body: response.body,
                            });
                        }
                        debug!(url = %request.url, content_type = %content_type, "Skipping non-HTML content");
                        return Err(FetchError::NotHtml { content_type });
                    }
                    403 => {
                        if forbidden_retried || !has_next {
                            return Err(FetchError::Forbidden);
                        }
                        // Same headers again; a real header rotation would slot in here
                        forbidden_retried = true;
                        request.retry_delay
                    }
                    429 => {
                        if !has_next {
                            return Err(FetchError::RateLimited);
                        }
                        request.retry_delay * (attempt + 2)
                    }
                    status if status >= 500 => {
                        if !has_next {
                            return Err(FetchError::ServerError(status));
                        }
                        request.retry_delay
                    }
                    status @ (301 | 302 | 307 | 308) => return Err(FetchError::Redirect(status)),
                    status => return Err(FetchError::Status(status)),
                },
                Err(err) => match err.kind {
                    TransportErrorKind::Tls if request.verify_ssl && has_next => {
                        warn!(url = %request.url, error = %err.message, "TLS failure, retrying without certificate verification");
                        request.verify_ssl = false;
                        Duration::ZERO
                    }
                    TransportErrorKind::Timeout | TransportErrorKind::Connect if has_next => request.retry_delay,
                    _ => return Err(err.into()),
                },
            };

            warn!(
                url = %request.url,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                "Retrying fetch"
            );

            if !backoff.is_zero() {
                tokio::time::sleep(backoff).await;
            }
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{content, failure, html, redirected, status, ScriptedTransport};
    use tokio::time::Instant;

    const URL: &str = "https://site.test/page";

    fn request(retry_count: u32) -> FetchRequest {
        FetchRequest {
            url: URL.to_string(),
            timeout: Duration::from_secs(5),
            headers: vec![("User-Agent".to_string(), "TestBot".to_string())],
            verify_ssl: true,
            retry_count,
            retry_delay: Duration::from_secs(1),
            follow_redirects: true,
        }
    }

    fn client(transport: &ScriptedTransport) -> FetchClient {
        FetchClient::new(Arc::new(transport.clone()))
    }

    #[tokio::test(start_paused = true)]
    async fn test_html_200_returns_body() {
        let transport = ScriptedTransport::new().with_script(URL, vec![html("<p>hi</p>")]);
        let page = client(&transport).fetch(&mut request(3)).await.unwrap();
        assert_eq!(page.body, "<p>hi</p>");
        assert_eq!(page.url, URL);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_ok() {
        let transport = ScriptedTransport::new()
            .with_script(URL, vec![status(429), status(429), html("<p>ok</p>")]);

        let start = Instant::now();
        let body = client(&transport).fetch(&mut request(3)).await;

        assert_eq!(body.unwrap().body, "<p>ok</p>");
        assert_eq!(transport.requests().len(), 3);
        // 1s * (0 + 2) then 1s * (1 + 2)
        assert_eq!(start.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_shared_budget() {
        let transport = ScriptedTransport::new()
            .with_script(URL, vec![status(429), status(429), status(429), html("never")]);

        let result = client(&transport).fetch(&mut request(3)).await;

        assert_eq!(result, Err(FetchError::RateLimited));
        assert_eq!(transport.requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_html_is_absent_without_retry() {
        let transport = ScriptedTransport::new()
            .with_script(URL, vec![content(200, "application/pdf"), html("never")]);

        let start = Instant::now();
        let result = client(&transport).fetch(&mut request(3)).await;

        assert!(matches!(result, Err(FetchError::NotHtml { .. })));
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_retried_only_once() {
        let transport = ScriptedTransport::new()
            .with_script(URL, vec![status(403), status(403), html("never")]);

        let result = client(&transport).fetch(&mut request(5)).await;

        assert_eq!(result, Err(FetchError::Forbidden));
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        // Headers are left untouched on the retry
        assert_eq!(requests[0].headers, requests[1].headers);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forbidden_then_ok() {
        let transport = ScriptedTransport::new().with_script(URL, vec![status(403), html("fine")]);
        assert_eq!(client(&transport).fetch(&mut request(3)).await.unwrap().body, "fine");
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_use_flat_delay() {
        let transport = ScriptedTransport::new()
            .with_script(URL, vec![status(503), status(500), html("back")]);

        let start = Instant::now();
        let page = client(&transport).fetch(&mut request(3)).await.unwrap();

        assert_eq!(page.body, "back");
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_and_client_errors_are_final() {
        for (code, expected) in [
            (301, FetchError::Redirect(301)),
            (308, FetchError::Redirect(308)),
            (404, FetchError::Status(404)),
            (410, FetchError::Status(410)),
        ] {
            let transport = ScriptedTransport::new().with_script(URL, vec![status(code), html("never")]);
            assert_eq!(client(&transport).fetch(&mut request(3)).await, Err(expected));
            assert_eq!(transport.requests().len(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_tls_failure_downgrades_verification_once() {
        let transport = ScriptedTransport::new().with_script(
            URL,
            vec![failure(TransportErrorKind::Tls), html("insecure but here")],
        );

        let mut request = request(3);
        let page = client(&transport).fetch(&mut request).await.unwrap();

        assert_eq!(page.body, "insecure but here");
        let requests = transport.requests();
        assert!(requests[0].verify_ssl);
        assert!(!requests[1].verify_ssl);
        // The downgrade is visible to the caller
        assert!(!request.verify_ssl);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tls_failure_without_verification_is_final() {
        let transport = ScriptedTransport::new().with_script(
            URL,
            vec![failure(TransportErrorKind::Tls), failure(TransportErrorKind::Tls), html("never")],
        );

        let result = client(&transport).fetch(&mut request(5)).await;

        assert!(matches!(result, Err(FetchError::Tls(_))));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_verification_never_reenabled() {
        let transport = ScriptedTransport::new().with_script(
            URL,
            vec![failure(TransportErrorKind::Tls), status(503), html("ok")],
        );

        client(&transport).fetch(&mut request(3)).await.unwrap();

        let verify: Vec<bool> = transport.requests().iter().map(|r| r.verify_ssl).collect();
        assert_eq!(verify, vec![true, false, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_and_connect_errors_share_the_budget() {
        let transport = ScriptedTransport::new().with_script(
            URL,
            vec![
                failure(TransportErrorKind::Timeout),
                failure(TransportErrorKind::Connect),
                failure(TransportErrorKind::Timeout),
                html("too late"),
            ],
        );

        let start = Instant::now();
        let result = client(&transport).fetch(&mut request(3)).await;

        assert_eq!(result, Err(FetchError::Timeout));
        assert_eq!(transport.requests().len(), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirected_page_reports_final_url() {
        let transport = ScriptedTransport::new()
            .with_script(URL, vec![redirected("https://site.test/page/", "<p>moved</p>")]);

        let page = client(&transport).fetch(&mut request(3)).await.unwrap();

        assert_eq!(page.url, "https://site.test/page/");
        assert_eq!(page.body, "<p>moved</p>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_redirects_not_retried() {
        let transport = ScriptedTransport::new()
            .with_script(URL, vec![failure(TransportErrorKind::TooManyRedirects), html("never")]);

        let result = client(&transport).fetch(&mut request(3)).await;

        assert_eq!(result, Err(FetchError::TooManyRedirects));
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_request_from_config_carries_settings() {
        let config = CrawlConfig::default()
            .with_user_agent("ConfigBot/1")
            .with_verify_ssl(false)
            .with_follow_redirects(false);

        let request = FetchRequest::from_config(URL, &config);

        assert!(!request.verify_ssl);
        assert!(!request.follow_redirects);
        assert_eq!(request.retry_count, 3);
        assert!(request
            .headers
            .iter()
            .any(|(name, value)| name == "User-Agent" && value == "ConfigBot/1"));
    }
}
