// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub site: SiteConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Log file path (optional, stdout if not set)
    #[serde(default)]
    pub log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
    /// Seconds to wait for in-flight connections on shutdown
    pub shutdown_grace_period: u64,
    /// Listen backlog
    pub backlog: i32,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
    pub max_body_size: u64,
}

/// Built site layout
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Directory holding the built SPA
    #[serde(default = "default_site_root")]
    pub root: String,
    /// Tried in order when `root` does not exist
    #[serde(default = "default_fallback_roots")]
    pub fallback_roots: Vec<String>,
    /// SPA entry document, relative to the resolved root
    #[serde(default = "default_entry_document")]
    pub entry_document: String,
    /// Files tried when a path names a directory
    #[serde(default = "default_index_files")]
    pub index_files: Vec<String>,
    /// `max-age` for static assets, in seconds
    #[serde(default = "default_asset_max_age")]
    pub asset_max_age: u32,
}

fn default_site_root() -> String {
    "dist/public".to_string()
}

fn default_fallback_roots() -> Vec<String> {
    vec!["public".to_string()]
}

fn default_entry_document() -> String {
    "index.html".to_string()
}

fn default_index_files() -> Vec<String> {
    vec!["index.html".to_string()]
}

const fn default_asset_max_age() -> u32 {
    3600
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: default_site_root(),
            fallback_roots: default_fallback_roots(),
            entry_document: default_entry_document(),
            index_files: default_index_files(),
            asset_max_age: default_asset_max_age(),
        }
    }
}
