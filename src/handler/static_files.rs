//! Static file serving module
//!
//! Resolves request paths inside the built site, serves matching files and
//! falls back to the SPA entry document for client-side routes.

use crate::config::AppState;
use crate::guard::{NavigationKind, HTML_CONTENT_TYPE, NOSNIFF};
use crate::handler::router::RequestContext;
use crate::http::cache::{self, CachePolicy};
use crate::http::{error_page, Payload, ResponseWriter, WriteError};
use crate::logger;
use hyper::header::{HeaderMap, CACHE_CONTROL, CONTENT_TYPE, ETAG, X_CONTENT_TYPE_OPTIONS};
use hyper::StatusCode;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Failures delivering the SPA entry document
#[derive(Debug, Error)]
pub enum SiteError {
    #[error("entry document not found: {}", .0.display())]
    MissingEntryDocument(PathBuf),

    #[error("failed to read entry document {}: {source}", .path.display())]
    EntryDocumentReadFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(WriteError),
}

impl SiteError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingEntryDocument(_) => StatusCode::NOT_FOUND,
            Self::EntryDocumentReadFailure { .. } | Self::Write(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn from_entry_write(path: &Path, error: WriteError) -> Self {
        match error {
            WriteError::File { source, .. } if source.kind() == ErrorKind::NotFound => {
                Self::MissingEntryDocument(path.to_path_buf())
            }
            WriteError::File { source, .. } => Self::EntryDocumentReadFailure {
                path: path.to_path_buf(),
                source,
            },
            other => Self::Write(other),
        }
    }
}

/// Serve a non-API request from the site directory
pub async fn serve<W: ResponseWriter>(
    ctx: &RequestContext<'_>,
    state: &AppState,
    res: &mut W,
) -> Result<(), WriteError> {
    let site = &state.config.site;
    let root = state.static_root();

    if let Some(file) = root.and_then(|r| resolve_file(r, &ctx.path, &site.index_files)) {
        let policy = if file.file_name() == Some(OsStr::new(&site.entry_document)) {
            CachePolicy::NoCache
        } else {
            CachePolicy::Public(site.asset_max_age)
        };
        return serve_file(ctx, res, &file, policy).await;
    }

    // Missing assets are a plain 404, never the SPA shell
    if ctx.kind != NavigationKind::Navigation {
        return send_error_page(res, StatusCode::NOT_FOUND);
    }

    match serve_entry(ctx, root, &site.entry_document, res).await {
        Ok(()) => Ok(()),
        Err(SiteError::Write(e)) => Err(e),
        Err(e) => {
            match &e {
                SiteError::MissingEntryDocument(_) => logger::log_warning(&e.to_string()),
                _ => logger::log_error(&e.to_string()),
            }
            send_error_page(res, e.status())
        }
    }
}

/// Serve the SPA entry document for a client-side route
pub async fn serve_entry<W: ResponseWriter>(
    ctx: &RequestContext<'_>,
    root: Option<&Path>,
    entry_document: &str,
    res: &mut W,
) -> Result<(), SiteError> {
    let Some(root) = root else {
        return Err(SiteError::MissingEntryDocument(PathBuf::from(entry_document)));
    };
    let path = root.join(entry_document);
    serve_file(ctx, res, &path, CachePolicy::NoCache)
        .await
        .map_err(|e| SiteError::from_entry_write(&path, e))
}

/// Serve one file with `ETag` revalidation
///
/// Nothing is committed if the file cannot be read.
async fn serve_file<W: ResponseWriter>(
    ctx: &RequestContext<'_>,
    res: &mut W,
    path: &Path,
    policy: CachePolicy,
) -> Result<(), WriteError> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|source| WriteError::File {
            path: path.display().to_string(),
            source,
        })?;
    let etag = cache::generate_etag(metadata.len(), metadata.modified().ok());
    res.set_header(ETAG.as_str(), &etag)?;
    res.set_header(CACHE_CONTROL.as_str(), &policy.to_header_value())?;

    if metadata.is_file() && cache::check_etag_match(ctx.if_none_match.as_deref(), &etag) {
        res.write_head(StatusCode::NOT_MODIFIED, None, HeaderMap::new())?;
        return res.end(None);
    }

    res.send_file(path).await
}

/// Map a request path to a file under `root`
///
/// Directories resolve through `index_files`. Returns `None` for anything
/// missing or outside the root.
pub fn resolve_file(root: &Path, request_path: &str, index_files: &[String]) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        logger::log_warning(&format!("Path traversal attempt blocked: {request_path}"));
        return None;
    }

    let mut candidate = root.join(relative);
    if candidate.is_dir() {
        candidate = index_files
            .iter()
            .map(|index| candidate.join(index))
            .find(|p| p.is_file())?;
    }

    // File not found is common (404), no need to log
    let canonical = candidate.canonicalize().ok()?;
    let root_canonical = match root.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{}': {e}",
                root.display()
            ));
            return None;
        }
    };
    if !canonical.starts_with(&root_canonical) {
        logger::log_warning(&format!(
            "Path escapes static root: {request_path} -> {}",
            canonical.display()
        ));
        return None;
    }

    canonical.is_file().then_some(canonical)
}

/// Replace whatever was staged with a minimal HTML error page
///
/// Used on every non-API failure path, so it sets the HTML headers itself
/// rather than relying on the request's classification.
pub fn send_error_page<W: ResponseWriter>(res: &mut W, status: StatusCode) -> Result<(), WriteError> {
    if res.headers_sent() {
        logger::log_warning(&format!(
            "Cannot send {status} page, response already committed"
        ));
        return Ok(());
    }
    res.set_status(status);
    res.remove_header(ETAG.as_str())?;
    res.set_header(CACHE_CONTROL.as_str(), &CachePolicy::NoStore.to_header_value())?;
    res.set_header(CONTENT_TYPE.as_str(), HTML_CONTENT_TYPE)?;
    res.set_header(X_CONTENT_TYPE_OPTIONS.as_str(), NOSNIFF)?;
    res.send(Payload::Html(error_page(status)))
}
