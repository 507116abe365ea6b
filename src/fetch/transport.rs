// src/fetch/transport.rs
// =============================================================================
// The HTTP transport seam.
//
// HttpTransport is a single GET: no retries, no policy. It reports either a
// response (status, content type, body) or a categorized TransportError. All
// the resilience logic lives one layer up in the FetchClient so it can be
// tested against a scripted transport.
//
// ReqwestTransport is the real implementation. reqwest fixes TLS
// verification and redirect policy when a Client is built, so we build one
// client per combination up front and pick per request.
//
// Followed redirects never leave the domain of the URL that was requested,
// and never land on a private or loopback IP literal. A refused redirect
// comes back as the 3xx response itself.
// =============================================================================

use std::error::Error as _;
use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, redirect, Client};
use url::{Host, Url};

use crate::error::{TransportError, TransportErrorKind};
use crate::urls::{get_domain, is_blocked_ip, is_valid_for_domain};

/// One GET request as the fetch client wants it sent.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub url: String,
    pub timeout: Duration,
    pub headers: Vec<(String, String)>,
    pub verify_ssl: bool,
    pub follow_redirects: bool,
}

/// What came back from the server.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    /// URL the response came from after redirects, if the transport knows it
    pub final_url: Option<String>,
    /// Only populated for 200 responses with an HTML content type
    pub body: String,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// True for `text/html` and `application/xhtml+xml` (any parameters).
pub fn is_html_content_type(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.contains("text/html") || content_type.contains("application/xhtml+xml")
}

/// `reqwest`-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    // Indexed by (verify_ssl, follow_redirects), see client_for()
    clients: [Client; 4],
}

impl ReqwestTransport {
    pub fn new(max_redirects: usize) -> Result<Self, reqwest::Error> {
        Ok(Self {
            clients: [
                build_client(true, true, max_redirects)?,
                build_client(true, false, max_redirects)?,
                build_client(false, true, max_redirects)?,
                build_client(false, false, max_redirects)?,
            ],
        })
    }

    fn client_for(&self, verify_ssl: bool, follow_redirects: bool) -> &Client {
        match (verify_ssl, follow_redirects) {
            (true, true) => &self.clients[0],
            (true, false) => &self.clients[1],
            (false, true) => &self.clients[2],
            (false, false) => &self.clients[3],
        }
    }
}

fn build_client(verify_ssl: bool, follow_redirects: bool, max_redirects: usize) -> Result<Client, reqwest::Error> {
    let policy = if follow_redirects {
        redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > max_redirects {
                attempt.error("too many redirects")
            } else if redirect_allowed(attempt.url(), attempt.previous()) {
                attempt.follow()
            } else {
                tracing::warn!(target_url = %attempt.url(), "Refusing redirect");
                attempt.stop()
            }
        })
    } else {
        redirect::Policy::none()
    };

    Client::builder()
        .redirect(policy)
        .danger_accept_invalid_certs(!verify_ssl)
        .build()
}

// `chain` starts with the URL originally requested
fn redirect_allowed(target: &Url, chain: &[Url]) -> bool {
    let literal = match target.host() {
        Some(Host::Ipv4(ip)) => Some(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => Some(IpAddr::V6(ip)),
        Some(Host::Domain(_)) => None,
        None => return false,
    };
    if literal.map_or(false, is_blocked_ip) {
        return false;
    }

    match chain.first() {
        Some(origin) => is_valid_for_domain(target.as_str(), &get_domain(origin.as_str())),
        None => true,
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let client = self.client_for(request.verify_ssl, request.follow_redirects);

        let mut builder = client.get(&request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(categorize_error)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        // Don't download bodies nobody will look at (PDFs, images, error pages)
        let wants_body = status == 200 && content_type.as_deref().map_or(false, is_html_content_type);
        let body = if wants_body {
            response.text().await.map_err(categorize_error)?
        } else {
            String::new()
        };

        Ok(TransportResponse {
            status,
            content_type,
            final_url: Some(final_url),
            body,
        })
    }
}

// Sorts a reqwest failure into the categories the retry logic cares about.
//
// reqwest wraps the interesting part (rustls' "invalid peer certificate",
// hyper's "dns error") a few levels deep, so we look at the whole source
// chain rather than just the top-level message.
fn categorize_error(error: reqwest::Error) -> TransportError {
    let mut chain = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        chain.push_str(": ");
        chain.push_str(&inner.to_string());
        source = inner.source();
    }
    let lowered = chain.to_lowercase();

    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_redirect() {
        TransportErrorKind::TooManyRedirects
    } else if lowered.contains("certificate") || lowered.contains("ssl") || lowered.contains("tls") {
        TransportErrorKind::Tls
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else {
        TransportErrorKind::Other
    };

    TransportError::new(kind, chain)
}
