//! Raw HTTP handlers.
//!
//! A handler claims a request outright: once a raw-handler or catch-all
//! resolver returns one, normal routing is skipped and the handler owns the
//! response.

use hearth_core::{content_type, HostResult, HttpRequest, HttpResponse};
use http::StatusCode;

use crate::host::AppHost;

/// A handler that serves a request end-to-end.
pub trait HttpHandler: Send + Sync {
    /// Produce the response for `req`.
    fn process(
        &self,
        host: &AppHost,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
    ) -> HostResult<()>;
}

/// Terminal handler used when nothing else matched.
#[derive(Debug, Default)]
pub struct NotFoundHandler;

impl HttpHandler for NotFoundHandler {
    fn process(
        &self,
        host: &AppHost,
        req: &mut dyn HttpRequest,
        res: &mut dyn HttpResponse,
    ) -> HostResult<()> {
        host.write_response(
            res,
            StatusCode::NOT_FOUND,
            content_type::PLAIN_TEXT,
            format!("Handler for request not found: {}", req.path()).as_bytes(),
        );
        Ok(())
    }
}
