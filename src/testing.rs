// src/testing.rs
// =============================================================================
// Test doubles for the transport, resolver and a whole in-memory site.
//
// Nothing in the test suite touches the network: fetch tests script the
// exact sequence of responses a URL returns, and crawl tests serve a small
// static site graph.
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{TransportError, TransportErrorKind};
use crate::fetch::{HttpTransport, TransportRequest, TransportResponse};
use crate::urls::{normalize, HostResolver};

type Scripted = Result<TransportResponse, TransportError>;

pub fn html(body: &str) -> Scripted {
    Ok(TransportResponse {
        status: 200,
        content_type: Some("text/html; charset=utf-8".to_string()),
        final_url: None,
        body: body.to_string(),
    })
}

/// An HTML page served from `final_url` after a redirect.
pub fn redirected(final_url: &str, body: &str) -> Scripted {
    Ok(TransportResponse {
        status: 200,
        content_type: Some("text/html".to_string()),
        final_url: Some(final_url.to_string()),
        body: body.to_string(),
    })
}

pub fn status(code: u16) -> Scripted {
    Ok(TransportResponse {
        status: code,
        content_type: Some("text/html".to_string()),
        final_url: None,
        body: String::new(),
    })
}

pub fn content(code: u16, content_type: &str) -> Scripted {
    Ok(TransportResponse {
        status: code,
        content_type: Some(content_type.to_string()),
        final_url: None,
        body: String::new(),
    })
}

pub fn failure(kind: TransportErrorKind) -> Scripted {
    Err(TransportError::new(kind, format!("scripted {:?}", kind)))
}

/// Transport that replays a per-URL script of responses.
///
/// Once a URL's script runs dry it answers 404.
#[derive(Default, Clone)]
pub struct ScriptedTransport {
    scripts: Arc<RwLock<HashMap<String, VecDeque<Scripted>>>>,
    requests: Arc<RwLock<Vec<TransportRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(self, url: &str, responses: Vec<Scripted>) -> Self {
        self.scripts
            .write()
            .unwrap()
            .insert(url.to_string(), responses.into_iter().collect());
        self
    }

    /// Every request seen so far, in order.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        self.requests.write().unwrap().push(request.clone());

        let next = self
            .scripts
            .write()
            .unwrap()
            .get_mut(&request.url)
            .and_then(|queue| queue.pop_front());

        next.unwrap_or_else(|| status(404))
    }
}

/// Serves a static site: canonical URL -> response.
///
/// Pages are declared with their outgoing links; unknown URLs are 404s.
#[derive(Clone)]
pub struct SiteTransport {
    origin: String,
    pages: Arc<RwLock<HashMap<String, Scripted>>>,
    hits: Arc<RwLock<Vec<String>>>,
}

impl SiteTransport {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            pages: Arc::default(),
            hits: Arc::default(),
        }
    }

    /// A page at `path` linking to each of `links` (relative or absolute).
    pub fn page(self, path: &str, links: &[&str]) -> Self {
        let anchors: String = links
            .iter()
            .map(|href| format!("<a href=\"{}\">{}</a>\n", href, href))
            .collect();
        let body = format!("<html><body>\n{}</body></html>", anchors);
        self.respond(path, html(&body))
    }

    pub fn respond(self, path: &str, response: Scripted) -> Self {
        let url = normalize(&format!("{}{}", self.origin, path));
        self.pages.write().unwrap().insert(url, response);
        self
    }

    /// Canonical URLs in the order they were requested.
    pub fn hits(&self) -> Vec<String> {
        self.hits.read().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for SiteTransport {
    async fn get(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let url = normalize(&request.url);
        self.hits.write().unwrap().push(url.clone());
        self.pages
            .read()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| status(404))
    }
}

/// Resolver with a fixed host table; unknown hosts fail to resolve.
#[derive(Default, Clone)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, ips: &[&str]) -> Self {
        let ips = ips.iter().map(|ip| ip.parse().unwrap()).collect();
        self.hosts.insert(host.to_string(), ips);
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
        self.hosts.get(host).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, format!("no such host: {}", host))
        })
    }
}
