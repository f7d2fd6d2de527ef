//! Response writer interface
//!
//! The set of exit points through which headers and body bytes leave the
//! server. The buffered transport and the header guard both implement it, so
//! downstream code never needs to know which one it is holding.

use crate::http::mime;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use hyper::StatusCode;
use std::path::Path;
use thiserror::Error;

/// Errors raised by a response transport
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot modify headers after they are sent to the client")]
    HeadersSent,

    #[error("write after end")]
    WriteAfterEnd,

    #[error("invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("invalid value for header '{name}'")]
    InvalidHeaderValue { name: String },

    #[error("failed to read '{path}': {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Body accepted by [`ResponseWriter::send`]
///
/// Each variant implies the `Content-Type` used when the caller has not set
/// one explicitly.
#[derive(Debug, Clone)]
pub enum Payload {
    Html(String),
    Text(String),
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl Payload {
    pub const fn default_content_type(&self) -> &'static str {
        match self {
            Self::Html(_) => "text/html; charset=utf-8",
            Self::Text(_) => "text/plain; charset=utf-8",
            Self::Json(_) => "application/json",
            Self::Binary(_) => "application/octet-stream",
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Self::Html(s) | Self::Text(s) => s.into_bytes(),
            Self::Json(v) => v.to_string().into_bytes(),
            Self::Binary(b) => b,
        }
    }
}

/// Outbound response operations
///
/// Header names are case-insensitive everywhere: they are parsed into
/// [`HeaderName`], which is always lowercase.
#[allow(async_fn_in_trait)]
pub trait ResponseWriter {
    fn status(&self) -> StatusCode;

    fn set_status(&mut self, status: StatusCode);

    fn header(&self, name: &str) -> Option<&HeaderValue>;

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), WriteError>;

    fn remove_header(&mut self, name: &str) -> Result<(), WriteError>;

    /// Commit status line and headers. `headers` are merged over anything set
    /// with `set_header`, replacing same-named entries.
    fn write_head(
        &mut self,
        status: StatusCode,
        reason: Option<&str>,
        headers: HeaderMap,
    ) -> Result<(), WriteError>;

    fn write(&mut self, chunk: &[u8]) -> Result<(), WriteError>;

    /// Finish the response. Calling it again is a no-op.
    fn end(&mut self, chunk: Option<&[u8]>) -> Result<(), WriteError>;

    fn headers_sent(&self) -> bool;

    fn send(&mut self, payload: Payload) -> Result<(), WriteError>
    where
        Self: Sized,
    {
        send_payload(self, payload)
    }

    async fn send_file(&mut self, path: &Path) -> Result<(), WriteError>
    where
        Self: Sized,
    {
        send_file_from_disk(self, path).await
    }
}

/// Default `send`: fill in a content type if none is set, then end
pub fn send_payload<W: ResponseWriter>(res: &mut W, payload: Payload) -> Result<(), WriteError> {
    if res.header(CONTENT_TYPE.as_str()).is_none() {
        res.set_header(CONTENT_TYPE.as_str(), payload.default_content_type())?;
    }
    res.end(Some(&payload.into_bytes()))
}

/// Default `send_file`: read the whole file, type it by extension, then end
///
/// The file is read before any header is touched, so a failed read leaves
/// the response uncommitted.
pub async fn send_file_from_disk<W: ResponseWriter>(
    res: &mut W,
    path: &Path,
) -> Result<(), WriteError> {
    let data = tokio::fs::read(path).await.map_err(|source| WriteError::File {
        path: path.display().to_string(),
        source,
    })?;
    res.set_header(CONTENT_TYPE.as_str(), mime::content_type_for(path))?;
    res.end(Some(&data))
}

/// Parse a header name, normalising it to lowercase
pub fn parse_header_name(name: &str) -> Result<HeaderName, WriteError> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| WriteError::InvalidHeaderName(name.to_string()))
}

pub fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, WriteError> {
    HeaderValue::from_str(value).map_err(|_| WriteError::InvalidHeaderValue {
        name: name.to_string(),
    })
}
