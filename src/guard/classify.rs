//! Request path classification
//!
//! Decides whether a request expects an HTML page, a static file, or belongs
//! to the API namespace. Only the path component is looked at; the transport
//! has already stripped scheme, host, query and fragment.

/// Prefix reserved for application API routes
pub const API_PREFIX: &str = "/api";

/// Prefix under which the build emits static assets
pub const ASSET_PREFIX: &str = "/assets";

/// Path of the SPA entry document
pub const ENTRY_PATH: &str = "/index.html";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationKind {
    /// A page load or client-side route; must render as HTML
    Navigation,
    /// A concrete static file
    Asset,
    /// Reserved for API routes
    Api,
}

impl NavigationKind {
    pub const fn is_navigation(self) -> bool {
        matches!(self, Self::Navigation)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Asset => "asset",
            Self::Api => "api",
        }
    }
}

/// Classify a request path
///
/// Any path with a `.` is taken to name a file, except the entry document
/// itself. Extension-less paths are client-side routes.
pub fn classify(path: &str) -> NavigationKind {
    if path.starts_with(API_PREFIX) {
        NavigationKind::Api
    } else if path.starts_with(ASSET_PREFIX) || (path.contains('.') && path != ENTRY_PATH) {
        NavigationKind::Asset
    } else {
        NavigationKind::Navigation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_examples() {
        assert_eq!(classify("/"), NavigationKind::Navigation);
        assert_eq!(classify("/index.html"), NavigationKind::Navigation);
        assert_eq!(classify("/assets/app.js"), NavigationKind::Asset);
        assert_eq!(classify("/api/leads"), NavigationKind::Api);
        assert_eq!(classify("/cases"), NavigationKind::Navigation);
        assert_eq!(classify("/logo.png"), NavigationKind::Asset);
    }

    #[test]
    fn test_client_routes_are_navigation() {
        assert_eq!(classify("/materiais"), NavigationKind::Navigation);
        assert_eq!(classify("/dashboard/settings"), NavigationKind::Navigation);
        assert_eq!(classify("/blog/"), NavigationKind::Navigation);
    }

    #[test]
    fn test_prefixes_win_over_extension_rule() {
        assert_eq!(classify("/api"), NavigationKind::Api);
        assert_eq!(classify("/api/export.csv"), NavigationKind::Api);
        assert_eq!(classify("/assets"), NavigationKind::Asset);
        assert_eq!(classify("/assets/fonts"), NavigationKind::Asset);
    }

    #[test]
    fn test_any_dot_means_asset() {
        assert_eq!(classify("/report.pdf"), NavigationKind::Asset);
        assert_eq!(classify("/sub/index.html"), NavigationKind::Asset);
        assert_eq!(classify("/.well-known/security"), NavigationKind::Asset);
    }
}
