// src/fetch/mod.rs
// =============================================================================
// Fetching pages.
//
// Submodules:
// - transport: a single HTTP GET (reqwest in production, scripted in tests)
// - client: retries, backoff and TLS fallback on top of a transport
// - agents: user-agent pool and per-fetch rotation
// =============================================================================

pub mod agents;
mod client;
mod transport;

pub use client::{FetchClient, FetchRequest, FetchedPage};
pub use transport::{is_html_content_type, HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
