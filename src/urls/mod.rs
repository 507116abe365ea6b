// src/urls/mod.rs
// =============================================================================
// URL canonicalization and safety checks.
//
// Submodules:
// - canonical: turns URLs into the dedup keys the crawler works with
// - guard: SSRF protection and seed pre-flight validation
//
// Nothing in here panics or returns an error for a malformed link: bad input
// simply fails closed (not valid, not safe).
// =============================================================================

mod canonical;
mod guard;

pub use canonical::{extract_path, get_domain, is_valid_for_domain, normalize};
pub use guard::{is_blocked_ip, validate_seed, HostResolver, SafetyGuard, SystemResolver};
