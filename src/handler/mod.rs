//! Request handler module
//!
//! Routes each request by path class and serves the built site with SPA
//! fallback. API paths are answered here but never proxied.

pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::handle_request;
