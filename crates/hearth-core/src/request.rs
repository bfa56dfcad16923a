//! Transport-facing request abstraction.
//!
//! The pipeline engine never sees a concrete transport type; it works
//! against the object-safe [`HttpRequest`] trait. [`BasicRequest`] is the
//! in-memory implementation used by tests and by embedders that already
//! hold a fully-read request.

use std::collections::HashMap;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde_json::Value;

/// An incoming HTTP request as the pipelines see it.
///
/// Filters may mutate headers and per-request items; the raw body is
/// read-only by the time the pipeline runs.
pub trait HttpRequest: Send {
    /// Request method.
    fn method(&self) -> &Method;

    /// Request path (no query string).
    fn path(&self) -> &str;

    /// Raw query string, if any.
    fn query_string(&self) -> Option<&str>;

    /// Request headers.
    fn headers(&self) -> &HeaderMap;

    /// Mutable request headers.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Raw request body.
    fn body(&self) -> &Bytes;

    /// Read a per-request item set by an earlier filter.
    fn item(&self, name: &str) -> Option<&Value>;

    /// Store a per-request item for later pipeline stages.
    fn set_item(&mut self, name: &str, value: Value);
}

/// In-memory [`HttpRequest`] implementation.
#[derive(Debug, Clone)]
pub struct BasicRequest {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Bytes,
    items: HashMap<String, Value>,
}

impl BasicRequest {
    /// Build a request with an explicit method.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let (path, query) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };
        Self {
            method,
            path,
            query,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            items: HashMap::new(),
        }
    }

    /// A GET request for `path`.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// A POST request for `path` carrying `body`.
    pub fn post(path: impl Into<String>, body: impl Into<Bytes>) -> Self {
        let mut req = Self::new(Method::POST, path);
        req.body = body.into();
        req
    }

    /// An OPTIONS request for `path`.
    pub fn options(path: impl Into<String>) -> Self {
        Self::new(Method::OPTIONS, path)
    }

    /// Attach a header, replacing any existing value.
    #[must_use]
    pub fn with_header(mut self, name: http::header::HeaderName, value: &str) -> Self {
        if let Ok(value) = value.parse() {
            self.headers.insert(name, value);
        }
        self
    }
}

impl HttpRequest for BasicRequest {
    fn method(&self) -> &Method {
        &self.method
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn body(&self) -> &Bytes {
        &self.body
    }

    fn item(&self, name: &str) -> Option<&Value> {
        self.items.get(name)
    }

    fn set_item(&mut self, name: &str, value: Value) {
        self.items.insert(name.to_string(), value);
    }
}
