// src/urls/guard.rs
// =============================================================================
// SSRF protection.
//
// Before the crawler touches the network it resolves the seed's hostname and
// refuses to go anywhere near a private, loopback or link-local address.
// Subdomains of the seed can point anywhere, so the crawl session runs the
// same check on every other host it is about to visit (cached per host).
//
// Rules:
// - IP literals are checked as-is (no DNS lookup)
// - hostnames are resolved; if ANY address is blocked, the URL is unsafe
// - a failed lookup is unsafe too (fail closed, no retry)
// =============================================================================

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use ipnet::IpNet;
use url::{Host, Url};

use crate::error::CrawlError;

/// Resolves hostnames to IP addresses.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system (`getaddrinfo` via tokio).
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

// Private, loopback, link-local and other non-routable ranges
const BLOCKED_RANGES: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "240.0.0.0/4",
    "::/128",
    "::1/128",
    "2001:db8::/32",
    "fc00::/7",
    "fe80::/10",
];

/// True for addresses the crawler must never contact.
pub fn is_blocked_ip(ip: IpAddr) -> bool {
    // ::ffff:10.0.0.1 is 10.0.0.1 in disguise
    if let IpAddr::V6(v6) = ip {
        if let Some(v4) = v6.to_ipv4_mapped() {
            return is_blocked_ip(IpAddr::V4(v4));
        }
    }

    let builtin = match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_broadcast()
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    };

    builtin
        || BLOCKED_RANGES
            .iter()
            .filter_map(|range| range.parse::<IpNet>().ok())
            .any(|net| net.contains(&ip))
}

/// SSRF guard that checks where a URL's host actually points.
#[derive(Clone)]
pub struct SafetyGuard {
    resolver: Arc<dyn HostResolver>,
}

impl Default for SafetyGuard {
    fn default() -> Self {
        Self::new(Arc::new(SystemResolver))
    }
}

impl SafetyGuard {
    pub fn new(resolver: Arc<dyn HostResolver>) -> Self {
        Self { resolver }
    }

    pub async fn is_safe(&self, url: &str) -> bool {
        self.check(url).await.is_ok()
    }

    /// Checks a URL and explains why it was rejected.
    pub async fn check(&self, url: &str) -> Result<(), String> {
        let parsed = Url::parse(url).map_err(|e| format!("unparseable URL: {}", e))?;
        let port = parsed.port_or_known_default().unwrap_or(80);

        let addresses = match parsed.host() {
            Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
            Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
            Some(Host::Domain(domain)) if !domain.is_empty() => {
                match self.resolver.resolve(domain, port).await {
                    Ok(addresses) if !addresses.is_empty() => addresses,
                    Ok(_) => {
                        tracing::warn!(host = %domain, "Hostname resolved to no addresses");
                        return Err(format!("could not resolve hostname '{}'", domain));
                    }
                    Err(e) => {
                        tracing::warn!(host = %domain, error = %e, "Could not resolve hostname");
                        return Err(format!("could not resolve hostname '{}'", domain));
                    }
                }
            }
            _ => return Err("URL has no host".to_string()),
        };

        if let Some(blocked) = addresses.iter().find(|ip| is_blocked_ip(**ip)) {
            tracing::warn!(url = %url, ip = %blocked, "Blocked unsafe address");
            return Err(format!("host resolves to non-public address {}", blocked));
        }

        Ok(())
    }
}

/// Pre-flight check for a seed URL.
///
/// Syntax problems come back as [`CrawlError::InvalidUrl`], SSRF rejections
/// as [`CrawlError::UnsafeUrl`]. No HTTP request is made either way.
pub async fn validate_seed(url: &str, guard: &SafetyGuard) -> Result<Url, CrawlError> {
    let trimmed = url.trim();

    let parsed = match Url::parse(trimmed) {
        Ok(parsed) => parsed,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            return Err(CrawlError::invalid_url(url, "URL must include a scheme (http/https)"));
        }
        Err(e) => return Err(CrawlError::invalid_url(url, e.to_string())),
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(CrawlError::invalid_url(
            url,
            format!("scheme '{}' is not supported, use http or https", parsed.scheme()),
        ));
    }

    match parsed.host_str() {
        Some(host) if !host.is_empty() => {}
        _ => return Err(CrawlError::invalid_url(url, "URL must include a host")),
    }

    guard
        .check(trimmed)
        .await
        .map_err(|reason| CrawlError::unsafe_url(url, reason))?;

    Ok(parsed)
}
