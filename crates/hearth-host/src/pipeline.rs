//! Ordered handler chains with explicit combination semantics.
//!
//! Every extensibility point on the host is one of three chain shapes, and
//! the shape is visible in the type so a collection cannot be combined the
//! wrong way:
//!
//! - [`FilterChain`]: every entry runs, in registration order.
//! - [`ResolverChain`]: entries are tried in order; the first producing a
//!   value wins and the rest are skipped.
//! - [`RefineChain`]: every entry runs; the *last* produced value wins,
//!   so later entries refine earlier ones.
//!
//! Chains are copy-on-write: appending swaps in a new snapshot, while
//! iterating code holds the previous snapshot for the duration of one
//! request. The documented post-load `add_plugin` path can therefore append
//! concurrently with in-flight pipeline iteration without tearing.

use std::sync::Arc;

use arc_swap::ArcSwap;

use hearth_core::{HostError, HttpRequest, HttpResponse, RequestDto, ResponseDto};

use crate::handler::HttpHandler;
use crate::host::AppHost;

/// A filter running before service resolution. May inspect or mutate the
/// request and response; early termination only by closing the response.
pub type PreRequestFilter = Arc<dyn Fn(&mut dyn HttpRequest, &mut dyn HttpResponse) + Send + Sync>;

/// A filter running after the request DTO is bound, before service
/// invocation.
pub type RequestFilter =
    Arc<dyn Fn(&mut dyn HttpRequest, &mut dyn HttpResponse, &mut RequestDto) + Send + Sync>;

/// A filter running after service invocation, before the response is
/// serialized and flushed.
pub type ResponseFilter =
    Arc<dyn Fn(&mut dyn HttpRequest, &mut dyn HttpResponse, &ResponseDto) + Send + Sync>;

/// A resolver that may claim a raw request outright before routing.
pub type RawHandlerResolver =
    Arc<dyn Fn(&AppHost, &dyn HttpRequest) -> Option<Arc<dyn HttpHandler>> + Send + Sync>;

/// A fallback resolver tried when no route matches normally.
pub type CatchAllResolver =
    Arc<dyn Fn(&AppHost, &dyn HttpRequest) -> Option<Arc<dyn HttpHandler>> + Send + Sync>;

/// A handler observing a service failure; a `Some` result becomes the
/// effective error response unless a later handler refines it again.
pub type ServiceExceptionHandler =
    Arc<dyn Fn(&dyn HttpRequest, &RequestDto, &HostError) -> Option<ResponseDto> + Send + Sync>;

/// A handler for errors escaping the normal dispatch path. When any are
/// registered the host defers to them entirely.
pub type UncaughtExceptionHandler =
    Arc<dyn Fn(&mut dyn HttpRequest, &mut dyn HttpResponse, &str, &HostError) + Send + Sync>;

/// Copy-on-write ordered entries shared by all chain shapes.
struct Entries<T> {
    inner: ArcSwap<Vec<T>>,
}

impl<T: Clone> Entries<T> {
    fn new() -> Self {
        Self {
            inner: ArcSwap::from_pointee(Vec::new()),
        }
    }

    fn add(&self, entry: T) {
        self.inner.rcu(|current| {
            let mut next = (**current).clone();
            next.push(entry.clone());
            next
        });
    }

    fn snapshot(&self) -> Arc<Vec<T>> {
        self.inner.load_full()
    }

    fn len(&self) -> usize {
        self.inner.load().len()
    }
}

impl<T> std::fmt::Debug for Entries<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entries")
            .field("len", &self.inner.load().len())
            .finish()
    }
}

/// Run-all chain: every entry is invoked, in registration order.
#[derive(Debug)]
pub struct FilterChain<T> {
    entries: Entries<T>,
}

impl<T: Clone> FilterChain<T> {
    /// An empty chain.
    pub fn new() -> Self {
        Self {
            entries: Entries::new(),
        }
    }

    /// Append an entry.
    pub fn add(&self, entry: T) {
        self.entries.add(entry);
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke `visit` for every entry in order.
    ///
    /// `visit` returns `false` to stop early; the only legitimate use of
    /// that is the closed-response check, since filters themselves have no
    /// return value.
    pub fn for_each(&self, mut visit: impl FnMut(&T) -> bool) {
        for entry in self.entries.snapshot().iter() {
            if !visit(entry) {
                break;
            }
        }
    }
}

impl<T: Clone> Default for FilterChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// First-match-wins chain: entries are tried in order until one produces a
/// value; the rest are skipped.
#[derive(Debug)]
pub struct ResolverChain<T> {
    entries: Entries<T>,
}

impl<T: Clone> ResolverChain<T> {
    /// An empty chain.
    pub fn new() -> Self {
        Self {
            entries: Entries::new(),
        }
    }

    /// Append an entry.
    pub fn add(&self, entry: T) {
        self.entries.add(entry);
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Try entries in order; the first `Some` wins.
    pub fn resolve<R>(&self, mut try_entry: impl FnMut(&T) -> Option<R>) -> Option<R> {
        self.entries.snapshot().iter().find_map(|e| try_entry(e))
    }
}

impl<T: Clone> Default for ResolverChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Last-write-wins chain: every entry runs and the last produced value is
/// carried forward, so later entries refine earlier results.
#[derive(Debug)]
pub struct RefineChain<T> {
    entries: Entries<T>,
}

impl<T: Clone> RefineChain<T> {
    /// An empty chain.
    pub fn new() -> Self {
        Self {
            entries: Entries::new(),
        }
    }

    /// Append an entry.
    pub fn add(&self, entry: T) {
        self.entries.add(entry);
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the chain has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every entry; the last `Some` observed is returned.
    pub fn refine<R>(&self, mut try_entry: impl FnMut(&T) -> Option<R>) -> Option<R> {
        let mut effective = None;
        for entry in self.entries.snapshot().iter() {
            if let Some(result) = try_entry(entry) {
                effective = Some(result);
            }
        }
        effective
    }
}

impl<T: Clone> Default for RefineChain<T> {
    fn default() -> Self {
        Self::new()
    }
}
