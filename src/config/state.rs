// Application state module
// Holds the loaded configuration and the write-once static root

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::types::{Config, SiteConfig};
use crate::logger;

/// Application state
pub struct AppState {
    pub config: Config,

    // Resolved on first use, read-only afterwards
    static_root: OnceLock<Option<PathBuf>>,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            static_root: OnceLock::new(),
        }
    }

    /// Directory the site is served from, if any candidate exists
    pub fn static_root(&self) -> Option<&Path> {
        self.static_root
            .get_or_init(|| resolve_static_root(&self.config.site))
            .as_deref()
    }
}

/// Pick the first existing directory among `root` and `fallback_roots`
pub fn resolve_static_root(site: &SiteConfig) -> Option<PathBuf> {
    let found = std::iter::once(&site.root)
        .chain(&site.fallback_roots)
        .map(PathBuf::from)
        .find(|candidate| candidate.is_dir());

    match &found {
        Some(root) => logger::log_static_root(root),
        None => logger::log_warning(&format!(
            "Could not find the build directory '{}' (fallbacks: {:?}); only error pages will be served",
            site.root, site.fallback_roots
        )),
    }
    found
}
