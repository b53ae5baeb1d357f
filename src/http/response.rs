//! Buffered response writer handed to handlers.
//!
//! # Responsibilities
//! - Hold status, headers and body while the chain runs
//! - Commit the status on first write; later status changes are ignored
//! - Convert into an `http::Response` once the chain is done
//!
//! # Design Decisions
//! - Body is buffered; handlers run to completion before anything is sent
//! - Reused across requests through the context pool (`reset`)

use std::io;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Response, StatusCode};

#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    committed: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            committed: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Set the status code. Only the first call has an effect.
    pub fn write_header(&mut self, status: StatusCode) {
        if self.committed {
            tracing::warn!(
                current = %self.status,
                ignored = %status,
                "Response status already written"
            );
            return;
        }
        self.status = status;
        self.committed = true;
    }

    /// Append to the body, committing a 200 status if none was written.
    pub fn write_body(&mut self, data: &[u8]) {
        self.committed = true;
        self.body.extend_from_slice(data);
    }

    /// Whether a status or any body bytes have been written.
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub(crate) fn set_content_type(&mut self, value: &'static str) {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(value));
    }

    /// Reset to a fresh state for the next request.
    pub fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.committed = false;
    }

    /// Move the buffered response out, leaving this writer reset.
    pub fn take(&mut self) -> Response<Bytes> {
        let mut response = Response::new(Bytes::from(std::mem::take(&mut self.body)));
        *response.status_mut() = self.status;
        *response.headers_mut() = std::mem::take(&mut self.headers);
        self.reset();
        response
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
