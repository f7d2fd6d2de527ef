//! Static host for a single-page application.
//!
//! Serves a built SPA with client-side routing fallback. Every navigation
//! response passes through a header guard that keeps browsers rendering the
//! document instead of downloading it.

pub mod config;
pub mod guard;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
