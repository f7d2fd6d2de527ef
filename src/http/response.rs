//! Buffered response transport
//!
//! Collects status, headers and body for one request and turns them into a
//! hyper response once the handler is done. Tracks the "headers sent" flag the
//! way a streaming transport would: the first `write_head`, `write` or `end`
//! commits the head, and later header mutations are rejected.

use crate::http::writer::{parse_header_name, parse_header_value, ResponseWriter, WriteError};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::ext::ReasonPhrase;
use hyper::header::{HeaderMap, HeaderValue, CONTENT_LENGTH};
use hyper::{Response, StatusCode};

#[derive(Debug)]
pub struct BufferedResponse {
    status: StatusCode,
    reason: Option<String>,
    headers: HeaderMap,
    body: Vec<u8>,
    headers_sent: bool,
    finished: bool,
    is_head: bool,
}

impl BufferedResponse {
    pub fn new(is_head: bool) -> Self {
        Self {
            status: StatusCode::OK,
            reason: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
            headers_sent: false,
            finished: false,
            is_head,
        }
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Convert into a hyper response
    ///
    /// `Content-Length` is filled in from the body unless the status forbids a
    /// body. HEAD responses keep the length but drop the bytes.
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let Self {
            status,
            reason,
            mut headers,
            body,
            is_head,
            ..
        } = self;

        let bodiless = status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED;
        if !bodiless && !headers.contains_key(CONTENT_LENGTH) {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let body = if is_head || bodiless {
            Bytes::new()
        } else {
            Bytes::from(body)
        };

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        if let Some(reason) = reason {
            match ReasonPhrase::try_from(reason.into_bytes()) {
                Ok(phrase) => {
                    response.extensions_mut().insert(phrase);
                }
                Err(e) => log_build_error(status, &e),
            }
        }

        response
    }
}

impl ResponseWriter for BufferedResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        if !self.headers_sent {
            self.status = status;
        }
    }

    fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers.get(name.to_ascii_lowercase())
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<(), WriteError> {
        if self.headers_sent {
            return Err(WriteError::HeadersSent);
        }
        let header_name = parse_header_name(name)?;
        let header_value = parse_header_value(name, value)?;
        self.headers.insert(header_name, header_value);
        Ok(())
    }

    fn remove_header(&mut self, name: &str) -> Result<(), WriteError> {
        if self.headers_sent {
            return Err(WriteError::HeadersSent);
        }
        self.headers.remove(parse_header_name(name)?);
        Ok(())
    }

    fn write_head(
        &mut self,
        status: StatusCode,
        reason: Option<&str>,
        headers: HeaderMap,
    ) -> Result<(), WriteError> {
        if self.headers_sent {
            return Err(WriteError::HeadersSent);
        }
        for name in headers.keys() {
            self.headers.remove(name);
        }
        for (name, value) in &headers {
            self.headers.append(name, value.clone());
        }
        self.status = status;
        self.reason = reason.map(ToString::to_string);
        self.headers_sent = true;
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), WriteError> {
        if self.finished {
            return Err(WriteError::WriteAfterEnd);
        }
        self.headers_sent = true;
        self.body.extend_from_slice(chunk);
        Ok(())
    }

    fn end(&mut self, chunk: Option<&[u8]>) -> Result<(), WriteError> {
        if self.finished {
            return Ok(());
        }
        if let Some(chunk) = chunk {
            self.body.extend_from_slice(chunk);
        }
        self.headers_sent = true;
        self.finished = true;
        Ok(())
    }

    fn headers_sent(&self) -> bool {
        self.headers_sent
    }
}

fn log_build_error(status: StatusCode, error: &impl std::fmt::Display) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}

/// Minimal HTML page shown for every non-API failure
pub fn error_page(status: StatusCode) -> String {
    let reason = status.canonical_reason().unwrap_or("Error");
    let code = status.as_u16();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{code} {reason}</title>
</head>
<body>
    <h1>{reason}</h1>
</body>
</html>"#
    )
}
