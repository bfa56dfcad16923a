//! Per-request state with deterministic teardown.
//!
//! A [`RequestContext`] is created when a request is bound and torn down at
//! end-of-request. Teardown is a duty, not a garbage-collection hope: every
//! item tracked for release is handed back to the container adapter, which
//! disposes it best-effort.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use uuid::Uuid;

use crate::dispose::Disposable;

/// Context for one in-flight request.
#[derive(Debug)]
pub struct RequestContext {
    request_id: String,
    started: Instant,
    items: HashMap<String, Value>,
    tracked: Vec<Arc<dyn Disposable>>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// Create a context with a generated request id.
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            started: Instant::now(),
            items: HashMap::new(),
            tracked: Vec::new(),
        }
    }

    /// The unique id of this request.
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Time elapsed since the context was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Read a per-request item.
    pub fn item(&self, name: &str) -> Option<&Value> {
        self.items.get(name)
    }

    /// Store a per-request item.
    pub fn set_item(&mut self, name: impl Into<String>, value: Value) {
        self.items.insert(name.into(), value);
    }

    /// Track an item for release at end-of-request.
    pub fn track(&mut self, item: Arc<dyn Disposable>) {
        self.tracked.push(item);
    }

    /// Number of items currently tracked for release.
    pub fn tracked_len(&self) -> usize {
        self.tracked.len()
    }

    /// Hand back every tracked item, leaving the context empty.
    ///
    /// The caller (the host's end-of-request release step) disposes each
    /// item through the container adapter.
    pub fn take_tracked(&mut self) -> Vec<Arc<dyn Disposable>> {
        std::mem::take(&mut self.tracked)
    }
}
