//! Cache client contract and the in-memory fallback.
//!
//! Initialization guarantees exactly one cache-client registration: a user
//! registration always wins, and [`MemoryCacheClient`] is inserted only
//! when nothing was registered by the time plugins finished loading.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

/// Shared cache contract resolved from the container as
/// `Arc<dyn CacheClient>`.
pub trait CacheClient: Send + Sync {
    /// Fetch a value; expired entries read as absent.
    fn get(&self, key: &str) -> Option<Value>;

    /// Store a value with an optional time-to-live.
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>);

    /// Remove a value; returns whether it existed.
    fn remove(&self, key: &str) -> bool;

    /// Drop everything.
    fn clear(&self);
}

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn live(&self) -> bool {
        self.expires_at.is_none_or(|at| Instant::now() < at)
    }
}

/// In-process [`CacheClient`] used when no other cache was registered.
#[derive(Default)]
pub struct MemoryCacheClient {
    entries: DashMap<String, CacheEntry>,
}

impl std::fmt::Debug for MemoryCacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCacheClient")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl MemoryCacheClient {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheClient for MemoryCacheClient {
    fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key)?;
        if entry.live() {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.entries.remove(key);
            None
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: ttl.map(|d| Instant::now() + d),
            },
        );
    }

    fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.clear();
    }
}
