//! HTTP cache control module
//!
//! `ETag` generation, conditional request matching and `Cache-Control`
//! policies for site files.

use std::time::{SystemTime, UNIX_EPOCH};

/// Generate a weak `ETag` from file size and modification time
///
/// # Returns
/// Quoted `ETag` string, e.g., `W/"1c-18f3a2b9c10"`
pub fn generate_etag(len: u64, modified: Option<SystemTime>) -> String {
    let mtime_ms = modified
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_millis());
    format!("W/\"{len:x}-{mtime_ms:x}\"")
}

/// Check the client's `If-None-Match` against the server's `ETag`
///
/// Uses weak comparison, so `W/"abc"` matches `"abc"`. Supports lists and `*`.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let etag = strip_weak(etag);
    if_none_match.is_some_and(|client| {
        client
            .split(',')
            .map(str::trim)
            .any(|candidate| candidate == "*" || strip_weak(candidate) == etag)
    })
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

/// Cache-Control policy per kind of response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Build assets, cacheable for the given seconds
    Public(u32),
    /// Must revalidate on every use (the SPA entry document)
    NoCache,
    /// Never stored (error pages)
    NoStore,
}

impl CachePolicy {
    pub fn to_header_value(self) -> String {
        match self {
            Self::Public(max_age) => format!("public, max-age={max_age}"),
            Self::NoCache => "no-cache".to_string(),
            Self::NoStore => "no-store".to_string(),
        }
    }
}
