//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: classifies the path, wraps the
//! response in the header guard and dispatches to API or static handling.

use crate::config::{AppState, HttpConfig};
use crate::guard::{classify, GuardedResponse, NavigationKind};
use crate::handler::static_files;
use crate::http::{BufferedResponse, Payload, ResponseWriter, WriteError};
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, ALLOW, CONTENT_LENGTH, SERVER};
use hyper::{Method, Request, Response, StatusCode, Version};
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// The response type every handler writes through
pub type SiteResponse = GuardedResponse<BufferedResponse>;

const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Why a request path was refused before routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("request path is not valid UTF-8 once decoded")]
    InvalidUtf8,
    #[error("request path contains an encoded '/'")]
    EncodedSlash,
    #[error("request path contains a NUL byte")]
    Nul,
}

/// Percent-decode a request path
///
/// An encoded `/` would let one segment pose as two, so it is refused rather
/// than decoded.
pub fn decode_path(raw: &str) -> Result<Cow<'_, str>, PathError> {
    if raw.to_ascii_lowercase().contains("%2f") {
        return Err(PathError::EncodedSlash);
    }
    let decoded = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| PathError::InvalidUtf8)?;
    if decoded.contains('\0') {
        return Err(PathError::Nul);
    }
    Ok(decoded)
}

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    pub method: &'a Method,
    /// Path as received, still percent-encoded
    pub raw_path: &'a str,
    /// Decoded path, used for classification and file lookup
    pub path: Cow<'a, str>,
    pub kind: NavigationKind,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub content_length: Option<String>,
    /// Set when the path could not be decoded safely
    pub path_error: Option<PathError>,
}

impl<'a> RequestContext<'a> {
    pub fn new(method: &'a Method, raw_path: &'a str) -> Self {
        let (path, path_error) = match decode_path(raw_path) {
            Ok(path) => (path, None),
            Err(e) => (Cow::Borrowed(raw_path), Some(e)),
        };
        let kind = classify(&path);
        Self {
            method,
            raw_path,
            path,
            kind,
            is_head: *method == Method::HEAD,
            if_none_match: None,
            content_length: None,
            path_error,
        }
    }

    fn from_request<B>(req: &'a Request<B>) -> Self {
        let header = |name: HeaderName| {
            req.headers()
                .get(name)
                .and_then(|v: &HeaderValue| v.to_str().ok())
                .map(ToString::to_string)
        };
        Self {
            if_none_match: header(hyper::header::IF_NONE_MATCH),
            content_length: header(CONTENT_LENGTH),
            ..Self::new(req.method(), req.uri().path())
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let ctx = RequestContext::from_request(&req);

    let response = respond(&ctx, &state).await;

    if state.config.logging.access_log {
        let entry = access_entry(&req, &ctx, &response, peer_addr, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }
    Ok(response)
}

/// Produce the full response for a request
///
/// Every write goes through the header guard. Failures that happen before
/// anything is committed turn into an HTML 500 page.
pub async fn respond(ctx: &RequestContext<'_>, state: &AppState) -> Response<Full<Bytes>> {
    let mut res = SiteResponse::new(BufferedResponse::new(ctx.is_head), ctx.kind);
    apply_server_headers(&mut res, &state.config.http);

    if let Err(e) = dispatch(ctx, state, &mut res).await {
        logger::log_error(&format!("Failed to respond to {}: {e}", ctx.path));
        if let Err(e) = static_files::send_error_page(&mut res, StatusCode::INTERNAL_SERVER_ERROR) {
            logger::log_error(&format!("Failed to send error page: {e}"));
        }
    }

    res.into_inner().into_response()
}

async fn dispatch(
    ctx: &RequestContext<'_>,
    state: &AppState,
    res: &mut SiteResponse,
) -> Result<(), WriteError> {
    // 1. Refuse paths that cannot be decoded safely
    if let Some(e) = ctx.path_error {
        logger::log_warning(&format!("Rejected request path {}: {e}", ctx.raw_path));
        return static_files::send_error_page(res, StatusCode::BAD_REQUEST);
    }

    // 2. API namespace is not served here
    if ctx.kind == NavigationKind::Api {
        res.set_status(StatusCode::NOT_FOUND);
        return res.send(Payload::Json(serde_json::json!({ "message": "Not Found" })));
    }

    // 3. Check HTTP method
    match *ctx.method {
        Method::GET | Method::HEAD => {}
        Method::OPTIONS => return write_options(res, state.config.http.enable_cors),
        _ => {
            logger::log_warning(&format!("Method not allowed: {} {}", ctx.method, ctx.path));
            res.set_header(ALLOW.as_str(), ALLOWED_METHODS)?;
            return static_files::send_error_page(res, StatusCode::METHOD_NOT_ALLOWED);
        }
    }

    // 4. Check body size
    if body_too_large(ctx.content_length.as_deref(), state.config.http.max_body_size) {
        return static_files::send_error_page(res, StatusCode::PAYLOAD_TOO_LARGE);
    }

    // 5. Static files with SPA fallback
    static_files::serve(ctx, state, res).await
}

fn apply_server_headers(res: &mut SiteResponse, http: &HttpConfig) {
    if let Err(e) = res.set_header(SERVER.as_str(), &http.server_name) {
        logger::log_warning(&format!("Skipping Server header: {e}"));
    }
}

/// Answer a preflight request
fn write_options(res: &mut SiteResponse, enable_cors: bool) -> Result<(), WriteError> {
    let mut headers = HeaderMap::new();
    headers.insert(ALLOW, HeaderValue::from_static(ALLOWED_METHODS));
    if enable_cors {
        headers.insert(
            hyper::header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            hyper::header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            hyper::header::ACCESS_CONTROL_MAX_AGE,
            HeaderValue::from_static("86400"),
        );
    }
    res.write_head(StatusCode::NO_CONTENT, None, headers)?;
    res.end(None)
}

/// Whether a declared `Content-Length` exceeds the limit
fn body_too_large(content_length: Option<&str>, max_body_size: u64) -> bool {
    let Some(size_str) = content_length else {
        return false;
    };
    match size_str.trim().parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            true
        }
        Ok(_) => false,
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            false
        }
    }
}

fn access_entry<B>(
    req: &Request<B>,
    ctx: &RequestContext<'_>,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
) -> AccessLogEntry {
    let header = |name: HeaderName| {
        req.headers()
            .get(name)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .map(ToString::to_string)
    };

    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        ctx.raw_path.to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = version_label(req.version()).to_string();
    entry.kind = ctx.kind.as_str();
    entry.status = response.status().as_u16();
    // HEAD keeps Content-Length but sends no body
    entry.body_bytes = if ctx.is_head {
        0
    } else {
        response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    };
    entry.referer = header(hyper::header::REFERER);
    entry.user_agent = header(hyper::header::USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::guard::{HTML_CONTENT_TYPE, NOSNIFF};
    use http_body_util::BodyExt;
    use hyper::header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE, ETAG, X_CONTENT_TYPE_OPTIONS};
    use std::fs;
    use std::path::Path;

    const ENTRY: &str = "<!DOCTYPE html><div id=\"root\"></div>";

    fn state_for(root: &Path) -> AppState {
        let mut config = Config::load_from("does-not-exist/config").unwrap();
        config.site.root = root.display().to_string();
        config.site.fallback_roots = Vec::new();
        AppState::new(&config)
    }

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), ENTRY).unwrap();
        fs::create_dir(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/app.js"), "console.log(1)").unwrap();
        fs::write(dir.path().join("assets/logo final.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(dir.path().join("assets/promoção.css"), "body{}").unwrap();
        fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        dir
    }

    async fn get(state: &AppState, path: &str) -> Response<Full<Bytes>> {
        respond(&RequestContext::new(&Method::GET, path), state).await
    }

    async fn body_of(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn assert_html_headers(response: &Response<Full<Bytes>>) {
        let headers = response.headers();
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), HTML_CONTENT_TYPE);
        assert_eq!(headers.get(X_CONTENT_TYPE_OPTIONS).unwrap(), NOSNIFF);
        assert!(headers.get(CONTENT_DISPOSITION).is_none());
    }

    #[tokio::test]
    async fn test_client_route_falls_back_to_entry() {
        let dir = site();
        let state = state_for(dir.path());
        let response = get(&state, "/dashboard/settings").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_html_headers(&response);
        assert_eq!(response.headers().get(CACHE_CONTROL).unwrap(), "no-cache");
        assert_eq!(body_of(response).await, ENTRY);
    }

    #[tokio::test]
    async fn test_root_and_entry_path() {
        let dir = site();
        let state = state_for(dir.path());
        for path in ["/", "/index.html"] {
            let response = get(&state, path).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_html_headers(&response);
            assert_eq!(body_of(response).await, ENTRY);
        }
    }

    #[tokio::test]
    async fn test_missing_asset_is_not_substituted() {
        let dir = site();
        let state = state_for(dir.path());
        let response = get(&state, "/report.pdf").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_html_headers(&response);
        let body = body_of(response).await;
        assert!(!body.contains("id=\"root\""));
        assert!(body.contains("Not Found"));
    }

    #[tokio::test]
    async fn test_assets_keep_their_types() {
        let dir = site();
        let state = state_for(dir.path());

        let js = get(&state, "/assets/app.js").await;
        assert_eq!(js.status(), StatusCode::OK);
        assert_eq!(js.headers().get(CONTENT_TYPE).unwrap(), "application/javascript");
        assert_eq!(
            js.headers().get(CACHE_CONTROL).unwrap(),
            "public, max-age=3600"
        );
        assert!(js.headers().get(CONTENT_DISPOSITION).is_none());

        let png = get(&state, "/logo.png").await;
        assert_eq!(png.headers().get(CONTENT_TYPE).unwrap(), "image/png");
    }

    #[tokio::test]
    async fn test_missing_entry_document_is_404_page() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path());
        let response = get(&state, "/cases").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_html_headers(&response);
        assert!(body_of(response).await.starts_with("<!DOCTYPE html>"));
    }

    #[tokio::test]
    async fn test_unreadable_entry_document_is_500_page() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("index.html")).unwrap();
        let state = state_for(dir.path());
        let response = get(&state, "/cases").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_html_headers(&response);
        assert!(response.headers().get(ETAG).is_none());
        let body = body_of(response).await;
        assert!(body.contains("Internal Server Error"));
        assert!(!body.contains("index.html"));
    }

    #[tokio::test]
    async fn test_no_static_root_at_all() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(&dir.path().join("dist/public"));
        let response = get(&state, "/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_html_headers(&response);
    }

    #[tokio::test]
    async fn test_api_paths_get_json_404() {
        let dir = site();
        let state = state_for(dir.path());
        for method in [Method::GET, Method::POST] {
            let response = respond(&RequestContext::new(&method, "/api/leads"), &state).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(
                response.headers().get(CONTENT_TYPE).unwrap(),
                "application/json"
            );
            assert!(response.headers().get(X_CONTENT_TYPE_OPTIONS).is_none());
            assert_eq!(body_of(response).await, r#"{"message":"Not Found"}"#);
        }
    }

    #[tokio::test]
    async fn test_etag_revalidation() {
        let dir = site();
        let state = state_for(dir.path());
        let first = get(&state, "/cases").await;
        let etag = first.headers().get(ETAG).unwrap().to_str().unwrap().to_string();

        let mut ctx = RequestContext::new(&Method::GET, "/cases");
        ctx.if_none_match = Some(etag);
        let response = respond(&ctx, &state).await;
        assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
        assert_html_headers(&response);
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_head_has_length_but_no_body() {
        let dir = site();
        let state = state_for(dir.path());
        let response = respond(&RequestContext::new(&Method::HEAD, "/"), &state).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_html_headers(&response);
        assert_eq!(
            response.headers().get(CONTENT_LENGTH).unwrap(),
            &ENTRY.len().to_string()
        );
        assert!(body_of(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_disallowed_method_is_html_405() {
        let dir = site();
        let state = state_for(dir.path());
        let response = respond(&RequestContext::new(&Method::DELETE, "/cases"), &state).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(ALLOW).unwrap(), ALLOWED_METHODS);
        assert_html_headers(&response);
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let dir = site();
        let state = state_for(dir.path());
        let response = respond(&RequestContext::new(&Method::OPTIONS, "/"), &state).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers().get(ALLOW).unwrap(), ALLOWED_METHODS);
        assert!(response.headers().get(CONTENT_DISPOSITION).is_none());
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let dir = site();
        let state = state_for(dir.path());
        let mut ctx = RequestContext::new(&Method::GET, "/");
        ctx.content_length = Some(u64::MAX.to_string());
        let response = respond(&ctx, &state).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_html_headers(&response);
    }

    #[tokio::test]
    async fn test_server_header() {
        let dir = site();
        let state = state_for(dir.path());
        let response = get(&state, "/").await;
        assert_eq!(response.headers().get(SERVER).unwrap(), "spa-host");
    }

    #[tokio::test]
    async fn test_encoded_file_names_are_served() {
        let dir = site();
        let state = state_for(dir.path());

        let png = get(&state, "/assets/logo%20final.png").await;
        assert_eq!(png.status(), StatusCode::OK);
        assert_eq!(png.headers().get(CONTENT_TYPE).unwrap(), "image/png");

        let css = get(&state, "/assets/promo%C3%A7%C3%A3o.css").await;
        assert_eq!(css.status(), StatusCode::OK);
        assert_eq!(css.headers().get(CONTENT_TYPE).unwrap(), "text/css");
        assert_eq!(body_of(css).await, "body{}");
    }

    #[tokio::test]
    async fn test_encoded_traversal_is_404() {
        let dir = site();
        let state = state_for(dir.path());
        for path in ["/assets/%2e%2e/%2e%2e/etc/passwd", "/%2E%2E/index.html"] {
            let response = get(&state, path).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
            assert_html_headers(&response);
        }
    }

    #[tokio::test]
    async fn test_encoded_api_prefix_is_api() {
        let dir = site();
        let state = state_for(dir.path());
        let response = get(&state, "/%61pi/leads").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_undecodable_paths_are_400() {
        let dir = site();
        let state = state_for(dir.path());
        for path in ["/%ff%fe", "/assets%2Fapp.js", "/index%00.html"] {
            let response = get(&state, path).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
            assert_html_headers(&response);
            assert!(body_of(response).await.contains("Bad Request"));
        }
    }

    #[test]
    fn test_decode_path() {
        assert_eq!(decode_path("/cases").unwrap(), "/cases");
        assert_eq!(decode_path("/logo%20final.png").unwrap(), "/logo final.png");
        assert_eq!(decode_path("/servi%C3%A7os").unwrap(), "/serviços");
        assert_eq!(decode_path("/a%2fb"), Err(PathError::EncodedSlash));
        assert_eq!(decode_path("/%c3"), Err(PathError::InvalidUtf8));
        assert_eq!(decode_path("/a%00"), Err(PathError::Nul));
    }

    #[tokio::test]
    async fn test_head_access_log_reports_no_body() {
        let dir = site();
        let state = state_for(dir.path());
        let peer: SocketAddr = "127.0.0.1:40000".parse().unwrap();

        for (method, expected) in [(Method::HEAD, 0), (Method::GET, ENTRY.len())] {
            let req = Request::builder()
                .method(method)
                .uri("/cases?utm_source=ad")
                .body(())
                .unwrap();
            let ctx = RequestContext::from_request(&req);
            let response = respond(&ctx, &state).await;
            let entry = access_entry(&req, &ctx, &response, peer, Instant::now());
            assert_eq!(entry.body_bytes, expected);
            assert_eq!(entry.path, "/cases");
            assert_eq!(entry.query.as_deref(), Some("utm_source=ad"));
        }
    }

    #[test]
    fn test_body_too_large() {
        assert!(!body_too_large(None, 10));
        assert!(!body_too_large(Some("10"), 10));
        assert!(body_too_large(Some("11"), 10));
        assert!(!body_too_large(Some("abc"), 10));
    }
}
