//! Logger module
//!
//! Named logging entry points for the server, backed by `tracing`:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Header guard diagnostics
//! - Error and warning logging

mod format;

pub use format::AccessLogEntry;

use crate::config::{Config, LoggingConfig};
use std::fs::OpenOptions;
use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Initialize the global subscriber
///
/// `RUST_LOG` takes precedence over `logging.level`. Should be called once at
/// application startup.
pub fn init(config: &LoggingConfig) -> io::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let writer = match config.log_file.as_deref() {
        Some(path) => BoxMakeWriter::new(Mutex::new(open_log_file(path)?)),
        None => BoxMakeWriter::new(io::stdout),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(config.log_file.is_none())
        .try_init()
        .map_err(io::Error::other)
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<std::fs::File> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

pub fn log_server_start(addr: &SocketAddr, config: &Config) {
    tracing::info!(
        %addr,
        workers = ?config.server.workers,
        site_root = %config.site.root,
        entry_document = %config.site.entry_document,
        "serving on http://{addr}"
    );
}

pub fn log_static_root(root: &Path) {
    tracing::info!(root = %root.display(), "Static root resolved");
}

pub fn log_connection_accepted(peer_addr: &SocketAddr) {
    tracing::debug!(%peer_addr, "Connection accepted");
}

pub fn log_connection_error(err: &impl std::fmt::Debug) {
    tracing::error!("Failed to serve connection: {err:?}");
}

pub fn log_error(message: &str) {
    tracing::error!("{message}");
}

pub fn log_warning(message: &str) {
    tracing::warn!("{message}");
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    tracing::info!(target: "access", "{}", entry.format(format));
}

pub fn log_blocked_disposition(attempted: &str) {
    tracing::debug!(attempted, "Blocked Content-Disposition header");
}

pub fn log_forced_content_type(attempted: &str) {
    tracing::debug!(attempted, "Forcing HTML content type");
}

pub fn log_late_header(name: &str) {
    tracing::debug!(header = name, "Ignoring header change after headers were sent");
}

pub fn log_shutdown_requested(signal: &str) {
    tracing::info!(signal, "Shutdown requested, no longer accepting connections");
}

pub fn log_shutdown_complete(remaining: usize) {
    if remaining == 0 {
        tracing::info!("All connections drained, shutting down");
    } else {
        tracing::warn!(remaining, "Grace period elapsed with connections still open");
    }
}
