//! Fixed-size pagination with per-query memoization.
//!
//! Each distinct (normalized) query owns a small state machine:
//! no entry -> pages materialized so far + a live cursor -> exhausted.
//! `get_page` serves cached pages without recomputation, fetches at most one
//! new chunk per call, and answers anything past the end with an empty
//! terminal page. Pages must be requested in non-decreasing order per query;
//! this is not random access.
//!
//! Upstream failures are swallowed here: the entry transitions to exhausted
//! and the caller sees an empty page. Callers cannot distinguish "no
//! matches" from "upstream is down" by design; the failure is logged for
//! observability.

use crate::catalog::Catalog;
use crate::rank;
use crate::score::Scorer;
use crate::textnorm;
use cardex_core::{CardRecord, CardSearchProvider, CardSearchQuery, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as AsyncMutex;

/// Results per page, matching the original deployment's answer size.
pub const DEFAULT_PAGE_SIZE: usize = 8;

/// Distinct queries kept in the pagination cache.
pub const DEFAULT_CACHE_SIZE: usize = 256;

/// Per-fetch upstream timeout.
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// One chunk from a page source: the records plus the source's continuation
/// cursor (`None` means no further data upstream).
#[derive(Debug, Clone)]
pub struct SourceChunk {
    pub records: Vec<CardRecord>,
    pub next: Option<u64>,
}

/// Where pages come from on a cache miss: ranking over an in-memory corpus,
/// or an upstream fetch for the remote variant.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, query: &str, cursor: u64) -> Result<SourceChunk>;
}

/// Ranks the catalog snapshot lazily: chunk `n` is the slice
/// `[n*page_size, (n+1)*page_size)` of the deterministic ranking.
#[derive(Debug, Clone)]
pub struct CorpusSource {
    catalog: Arc<Catalog>,
    scorer: Scorer,
    page_size: usize,
}

impl CorpusSource {
    pub fn new(catalog: Arc<Catalog>, scorer: Scorer, page_size: usize) -> Self {
        Self {
            catalog,
            scorer,
            page_size,
        }
    }
}

#[async_trait::async_trait]
impl PageSource for CorpusSource {
    async fn fetch(&self, query: &str, cursor: u64) -> Result<SourceChunk> {
        let wanted = (cursor as usize + 1) * self.page_size;
        let ranked = rank::rank(&self.scorer, query, self.catalog.iter(), wanted);
        let start = (cursor as usize) * self.page_size;
        let records = ranked.get(start..).map(|s| s.to_vec()).unwrap_or_default();
        // A full ranking means more candidates may remain below the cut.
        let next = (ranked.len() == wanted).then_some(cursor + 1);
        Ok(SourceChunk { records, next })
    }
}

/// Fetches chunks from a remote card search provider, one upstream page per
/// chunk, with a bounded per-fetch timeout.
pub struct RemoteSource {
    provider: Arc<dyn CardSearchProvider>,
    page_size: usize,
    timeout_ms: u64,
}

impl RemoteSource {
    pub fn new(provider: Arc<dyn CardSearchProvider>, page_size: usize, timeout_ms: u64) -> Self {
        Self {
            provider,
            page_size,
            timeout_ms,
        }
    }
}

#[async_trait::async_trait]
impl PageSource for RemoteSource {
    async fn fetch(&self, query: &str, cursor: u64) -> Result<SourceChunk> {
        let q = CardSearchQuery {
            query: query.to_string(),
            page: cursor,
            page_size: self.page_size,
            timeout_ms: Some(self.timeout_ms),
        };
        let page = self.provider.search(&q).await?;
        Ok(SourceChunk {
            records: page.records,
            next: page.next_page,
        })
    }
}

/// One served page: records plus the offset to request next, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub records: Vec<CardRecord>,
    pub next_offset: Option<u64>,
}

impl PageView {
    fn end() -> Self {
        Self {
            records: Vec::new(),
            next_offset: None,
        }
    }
}

/// Per-query pagination state. `next == Some(cursor)` is a live continuation;
/// `None` means exhausted.
#[derive(Debug, Default)]
struct QueryPages {
    pages: Vec<Vec<CardRecord>>,
    next: Option<u64>,
}

impl QueryPages {
    fn fresh() -> Self {
        Self {
            pages: Vec::new(),
            next: Some(0),
        }
    }
}

/// LRU cache of per-query page histories.
///
/// The outer lock only guards entry lookup; each entry has its own async
/// lock, so a slow upstream fetch for one query never stalls requests for
/// other queries.
pub struct PageCache {
    page_size: usize,
    entries: Mutex<LruCache<String, Arc<AsyncMutex<QueryPages>>>>,
}

impl PageCache {
    pub fn new(capacity: NonZeroUsize, page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of queries currently cached.
    pub fn cached_queries(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Serve page `page_idx` of `query`, fetching through `source` only when
    /// the cache runs out. Total: every outcome, including upstream failure
    /// and nonsense offsets, is a valid (possibly empty) page.
    pub async fn get_page(
        &self,
        source: &dyn PageSource,
        query: &str,
        page_idx: u64,
    ) -> PageView {
        let key = textnorm::scrub(query);
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries
                .get_or_insert(key.clone(), || Arc::new(AsyncMutex::new(QueryPages::fresh())))
                .clone()
        };

        let mut state = entry.lock().await;
        let idx = page_idx as usize;

        if idx < state.pages.len() {
            let more_after = idx + 1 < state.pages.len() || state.next.is_some();
            return PageView {
                records: state.pages[idx].clone(),
                next_offset: more_after.then_some(page_idx + 1),
            };
        }

        // Only the page right after the materialized range can be fetched;
        // anything further is unsupported random access.
        if idx > state.pages.len() {
            return PageView::end();
        }
        let Some(cursor) = state.next else {
            return PageView::end();
        };

        match source.fetch(&key, cursor).await {
            Ok(chunk) => {
                state.next = chunk.next;
                if chunk.records.is_empty() {
                    state.next = None;
                    return PageView::end();
                }
                let mut records = chunk.records;
                records.truncate(self.page_size);
                state.pages.push(records.clone());
                PageView {
                    records,
                    next_offset: state.next.map(|_| page_idx + 1),
                }
            }
            Err(e) => {
                tracing::warn!(query = %key, error = %e, "upstream fetch failed; treating as end of data");
                state.next = None;
                PageView::end()
            }
        }
    }
}
