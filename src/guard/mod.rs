//! Response header guard
//!
//! Classifies each request path and wraps its response so that pages are
//! always rendered by the browser, never offered as a download.

pub mod classify;
pub mod guarded;

pub use classify::{classify, NavigationKind};
pub use guarded::{GuardedResponse, HTML_CONTENT_TYPE, NOSNIFF};
