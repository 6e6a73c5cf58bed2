//! Bounded per-requester memory of the last useful query.
//!
//! Consulted only when a request arrives with an empty query, so "show me
//! more" continues where the requester left off. Only non-empty queries that
//! produced at least one result are remembered; remembering dead-end queries
//! would stick requesters on an empty continuation.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

#[derive(Debug)]
pub struct LastQueryCache {
    inner: Mutex<LruCache<String, String>>,
}

impl LastQueryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Remember `query` for `requester_id`, evicting the least-recently-used
    /// requester when at capacity. Empty queries are ignored.
    pub fn remember(&self, requester_id: &str, query: &str) {
        if query.trim().is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.put(requester_id.to_string(), query.to_string());
    }

    /// Last remembered query, refreshing the requester's recency.
    pub fn recall(&self, requester_id: &str) -> Option<String> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.get(requester_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
