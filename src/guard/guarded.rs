//! Header guard
//!
//! `GuardedResponse` wraps a response transport and enforces, at every exit
//! point, that `Content-Disposition` never leaves the server and that
//! navigation responses are always typed as HTML with sniffing disabled.

use super::classify::NavigationKind;
use crate::http::writer::{
    parse_header_name, send_file_from_disk, send_payload, Payload, ResponseWriter, WriteError,
};
use crate::logger;
use hyper::header::{
    HeaderMap, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS,
};
use hyper::StatusCode;
use std::path::Path;

/// Content type forced onto every navigation response
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Value forced into `X-Content-Type-Options`
pub const NOSNIFF: &str = "nosniff";

#[derive(Debug)]
pub struct GuardedResponse<W> {
    inner: W,
    kind: NavigationKind,
}

impl<W: ResponseWriter> GuardedResponse<W> {
    pub const fn new(inner: W, kind: NavigationKind) -> Self {
        Self { inner, kind }
    }

    pub const fn inner(&self) -> &W {
        &self.inner
    }

    /// Final check before the transport is flushed
    pub fn into_inner(mut self) -> W {
        self.enforce();
        self.inner
    }

    /// Apply both invariants to the transport's header table
    ///
    /// No-op once headers are sent; the transport is the only source of
    /// truth for that flag.
    fn enforce(&mut self) {
        if self.inner.headers_sent() {
            return;
        }
        let mut result = self.inner.remove_header(CONTENT_DISPOSITION.as_str());
        if self.kind.is_navigation() {
            result = result
                .and_then(|()| {
                    self.inner
                        .set_header(CONTENT_TYPE.as_str(), HTML_CONTENT_TYPE)
                })
                .and_then(|()| self.inner.set_header(X_CONTENT_TYPE_OPTIONS.as_str(), NOSNIFF));
        }
        if let Err(e) = result {
            logger::log_warning(&format!("Header guard could not normalize headers: {e}"));
        }
    }
}

impl<W: ResponseWriter> ResponseWriter for GuardedResponse<W> {
    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.inner.set_status(status);
    }

    fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.inner.header(name)
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), WriteError> {
        if self.inner.headers_sent() {
            logger::log_late_header(name);
            return Ok(());
        }

        let header_name = parse_header_name(name)?;
        if header_name == CONTENT_DISPOSITION {
            logger::log_blocked_disposition(value);
            return Ok(());
        }

        if header_name == CONTENT_TYPE && self.kind.is_navigation() && !value.contains("text/html")
        {
            logger::log_forced_content_type(value);
            return self.inner.set_header(name, HTML_CONTENT_TYPE);
        }

        self.inner.set_header(name, value)
    }

    fn remove_header(&mut self, name: &str) -> Result<(), WriteError> {
        if self.inner.headers_sent() {
            logger::log_late_header(name);
            return Ok(());
        }
        self.inner.remove_header(name)
    }

    fn write_head(
        &mut self,
        status: StatusCode,
        reason: Option<&str>,
        mut headers: HeaderMap,
    ) -> Result<(), WriteError> {
        if self.inner.headers_sent() {
            logger::log_late_header("status line");
            return Ok(());
        }

        if headers.remove(CONTENT_DISPOSITION).is_some() {
            logger::log_blocked_disposition("(write_head)");
        }
        self.inner.remove_header(CONTENT_DISPOSITION.as_str())?;

        if self.kind.is_navigation() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
            headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static(NOSNIFF));
        }

        self.inner.write_head(status, reason, headers)
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), WriteError> {
        self.enforce();
        self.inner.write(chunk)
    }

    fn end(&mut self, chunk: Option<&[u8]>) -> Result<(), WriteError> {
        self.enforce();
        self.inner.end(chunk)
    }

    fn headers_sent(&self) -> bool {
        self.inner.headers_sent()
    }

    fn send(&mut self, payload: Payload) -> Result<(), WriteError> {
        self.enforce();
        send_payload(self, payload)
    }

    async fn send_file(&mut self, path: &Path) -> Result<(), WriteError> {
        self.enforce();
        send_file_from_disk(self, path).await
    }
}
