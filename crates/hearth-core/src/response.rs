//! Transport-facing response abstraction.
//!
//! The closed-response guard lives here: once [`HttpResponse::close`] has
//! been called (by a filter claiming the request, or by the transport
//! signaling early termination), every further write is a no-op. Error
//! paths throughout the host check [`HttpResponse::is_closed`] before
//! synthesizing output, so cancellation never turns into a double-write.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

/// An outgoing HTTP response as the pipelines see it.
pub trait HttpResponse: Send {
    /// Current status code.
    fn status(&self) -> StatusCode;

    /// Set the status code. No effect once the response is closed.
    fn set_status(&mut self, status: StatusCode);

    /// Response headers.
    fn headers(&self) -> &HeaderMap;

    /// Mutable response headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Append bytes to the response body.
    ///
    /// Writing to a closed response is a guarded no-op, not a failure.
    fn write(&mut self, bytes: &[u8]);

    /// Mark the response complete. Idempotent.
    fn close(&mut self);

    /// Whether the response has been closed (already handled, or torn down
    /// by the transport).
    fn is_closed(&self) -> bool;
}

/// In-memory [`HttpResponse`] implementation.
#[derive(Debug, Clone, Default)]
pub struct BasicResponse {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
    closed: bool,
}

impl BasicResponse {
    /// A fresh, open response.
    pub fn new() -> Self {
        Self::default()
    }

    /// The accumulated body.
    pub fn body(&self) -> Bytes {
        Bytes::copy_from_slice(&self.body)
    }

    /// The accumulated body as UTF-8, lossy.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl HttpResponse for BasicResponse {
    fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    fn set_status(&mut self, status: StatusCode) {
        if !self.closed {
            self.status = Some(status);
        }
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write(&mut self, bytes: &[u8]) {
        if !self.closed {
            self.body.extend_from_slice(bytes);
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
