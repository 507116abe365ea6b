// src/urls/canonical.rs
// =============================================================================
// Canonical URL forms used as crawl dedup keys.
//
// The crawler treats these as the same page:
//   https://Example.com/docs/
//   https://example.com/docs?page=2
//   https://example.com/docs#install
// all of which canonicalize to "https://example.com/docs".
//
// The url crate already lower-cases scheme and host and normalizes
// percent-encoding when parsing, so canonicalization is mostly a matter of
// dropping the parts we don't key on (userinfo, query, fragment, trailing
// slash) and rebuilding the string.
// =============================================================================

use url::Url;

/// Canonicalizes a URL to `scheme://host[:port]/path`.
///
/// Query string, fragment and trailing slash (except the root `/`) are
/// dropped. Input that doesn't parse as an absolute URL with a host is
/// returned trimmed but otherwise untouched; it will fail
/// [`is_valid_for_domain`] later.
pub fn normalize(raw: &str) -> String {
    let raw = raw.trim();

    let parsed = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return raw.to_string(),
    };

    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return raw.to_string(),
    };

    let path = parsed.path();
    let path = if path == "/" {
        "/"
    } else {
        match path.trim_end_matches('/') {
            // "//" and friends collapse to the root
            "" => "/",
            trimmed => trimmed,
        }
    };

    match parsed.port() {
        Some(port) => format!("{}://{}:{}{}", parsed.scheme(), host, port, path),
        None => format!("{}://{}{}", parsed.scheme(), host, path),
    }
}

/// True when `url` is an http(s) URL on `origin_domain` or one of its
/// subdomains. A leading `www.` is ignored on both sides and ports are not
/// compared.
pub fn is_valid_for_domain(url: &str, origin_domain: &str) -> bool {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) => parsed,
        Err(_) => return false,
    };

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return false;
    }

    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return false,
    };

    let origin = hostname_of(origin_domain).to_lowercase();
    if origin.is_empty() {
        return false;
    }

    let host = strip_www(&host);
    let origin = strip_www(&origin);

    host == origin || host.ends_with(&format!(".{}", origin))
}

/// The path component of `url`, `/` when empty or unparseable.
pub fn extract_path(url: &str) -> String {
    match Url::parse(url.trim()) {
        Ok(parsed) if !parsed.path().is_empty() => parsed.path().to_string(),
        _ => "/".to_string(),
    }
}

/// The network location (`host` or `host:port`) of `url`, empty when the URL
/// has none.
pub fn get_domain(url: &str) -> String {
    let parsed = match Url::parse(url.trim()) {
        Ok(parsed) => parsed,
        Err(_) => return String::new(),
    };

    match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

// "example.com:8080" -> "example.com", "[::1]:80" -> "[::1]"
fn hostname_of(domain: &str) -> &str {
    if domain.starts_with('[') {
        return match domain.find(']') {
            Some(end) => &domain[..=end],
            None => domain,
        };
    }
    domain.split(':').next().unwrap_or(domain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_query_fragment_and_trailing_slash() {
        assert_eq!(normalize("https://example.com/docs/?page=2#top"), "https://example.com/docs");
        assert_eq!(normalize("HTTPS://Example.COM/Docs"), "https://example.com/Docs");
    }

    #[test]
    fn test_normalize_keeps_root_slash() {
        assert_eq!(normalize("https://example.com"), "https://example.com/");
        assert_eq!(normalize("https://example.com/"), "https://example.com/");
        assert_eq!(normalize("https://example.com//"), "https://example.com/");
    }

    #[test]
    fn test_normalize_keeps_non_default_port_only() {
        assert_eq!(normalize("http://example.com:8080/a/"), "http://example.com:8080/a");
        assert_eq!(normalize("https://example.com:443/a"), "https://example.com/a");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let urls = [
            "https://example.com",
            "https://example.com//",
            "https://Example.com/a/b/?x=1",
            "http://example.com:8080/path#frag",
            "https://user:pw@example.com/private/",
            "https://example.com/a%20b/",
            "not a url",
        ];
        for url in urls {
            let once = normalize(url);
            assert_eq!(normalize(&once), once, "not idempotent for {}", url);
        }
    }

    #[test]
    fn test_query_variants_collapse() {
        let a = normalize("https://example.com/page?id=1");
        let b = normalize("https://example.com/page?id=2");
        let c = normalize("https://example.com/page#section");
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_domain_scoping_accepts_www_and_subdomains() {
        assert!(is_valid_for_domain("https://example.com/a", "example.com"));
        assert!(is_valid_for_domain("https://www.example.com/a", "example.com"));
        assert!(is_valid_for_domain("https://sub.example.com/a", "example.com"));
        assert!(is_valid_for_domain("https://example.com/a", "www.example.com"));
        assert!(is_valid_for_domain("https://EXAMPLE.com/a", "Example.com"));
    }

    #[test]
    fn test_domain_scoping_rejects_other_hosts() {
        assert!(!is_valid_for_domain("https://evil.com/", "example.com"));
        assert!(!is_valid_for_domain("https://notexample.com/", "example.com"));
        assert!(!is_valid_for_domain("https://example.com.evil.com/", "example.com"));
    }

    #[test]
    fn test_domain_scoping_rejects_other_schemes_and_garbage() {
        assert!(!is_valid_for_domain("ftp://example.com/file", "example.com"));
        assert!(!is_valid_for_domain("mailto:me@example.com", "example.com"));
        assert!(!is_valid_for_domain("/relative/path", "example.com"));
        assert!(!is_valid_for_domain("https://example.com/", ""));
    }

    #[test]
    fn test_domain_scoping_ignores_ports() {
        assert!(is_valid_for_domain("http://example.com:8080/", "example.com:8080"));
        assert!(is_valid_for_domain("http://example.com:9090/", "example.com:8080"));
    }

    #[test]
    fn test_extract_path() {
        assert_eq!(extract_path("https://example.com"), "/");
        assert_eq!(extract_path("https://example.com/a/b?x=1"), "/a/b");
        assert_eq!(extract_path("::garbage::"), "/");
    }

    #[test]
    fn test_get_domain() {
        assert_eq!(get_domain("https://example.com/a"), "example.com");
        assert_eq!(get_domain("http://example.com:8080/a"), "example.com:8080");
        assert_eq!(get_domain("nope"), "");
    }
}
