//! The inline-query boundary: request in, page of image results out.
//!
//! Every request, however malformed, resolves to a valid (possibly empty)
//! response; nothing here can take the serving loop down. The catalog is an
//! immutable snapshot behind an `Arc`; reloads swap the snapshot without
//! touching in-flight requests.

use crate::catalog::Catalog;
use crate::lastquery::LastQueryCache;
use crate::paginate::{
    CorpusSource, PageCache, PageView, RemoteSource, DEFAULT_CACHE_SIZE,
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_PAGE_SIZE,
};
use crate::rank;
use crate::score::{FuzzyBackend, Scorer};
use cardex_core::{CardRecord, CardSearchProvider, InlineRequest, InlineResponse, ResultItem};
use std::num::NonZeroUsize;
use std::sync::{Arc, RwLock};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub page_size: usize,
    pub page_cache_queries: usize,
    pub last_query_capacity: usize,
    pub fuzzy_backend: FuzzyBackend,
    pub fetch_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_cache_queries: DEFAULT_CACHE_SIZE,
            last_query_capacity: 1_024,
            fuzzy_backend: FuzzyBackend::default(),
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
        }
    }
}

pub struct InlineService {
    catalog: RwLock<Arc<Catalog>>,
    scorer: Scorer,
    pages: PageCache,
    last_queries: LastQueryCache,
    remote: Option<Arc<dyn CardSearchProvider>>,
    page_size: usize,
    fetch_timeout_ms: u64,
}

impl InlineService {
    pub fn new(catalog: Catalog, config: ServiceConfig) -> Self {
        let page_size = config.page_size.max(1);
        Self {
            catalog: RwLock::new(Arc::new(catalog)),
            scorer: Scorer::new(config.fuzzy_backend),
            pages: PageCache::new(
                NonZeroUsize::new(config.page_cache_queries.max(1)).expect("capacity >= 1"),
                page_size,
            ),
            last_queries: LastQueryCache::new(
                NonZeroUsize::new(config.last_query_capacity.max(1)).expect("capacity >= 1"),
            ),
            remote: None,
            page_size,
            fetch_timeout_ms: config.fetch_timeout_ms,
        }
    }

    /// Route cache misses to a remote search provider instead of ranking the
    /// local catalog. Random sampling for empty queries still uses the local
    /// snapshot.
    pub fn with_remote(mut self, provider: Arc<dyn CardSearchProvider>) -> Self {
        self.remote = Some(provider);
        self
    }

    pub fn catalog_snapshot(&self) -> Arc<Catalog> {
        self.catalog.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Swap in a freshly loaded catalog. In-flight requests keep the
    /// snapshot they started with.
    pub fn swap_catalog(&self, catalog: Catalog) {
        let mut slot = self.catalog.write().unwrap_or_else(|e| e.into_inner());
        *slot = Arc::new(catalog);
    }

    /// Answer one inline request.
    pub async fn answer(&self, req: &InlineRequest) -> InlineResponse {
        let started = Instant::now();

        let Some(offset) = parse_offset(&req.offset) else {
            tracing::debug!(requester = %req.requester_id, offset = %req.offset, "unparseable offset");
            return InlineResponse::empty();
        };

        let query = req.query.trim().to_string();
        let response = if query.is_empty() {
            match self.last_queries.recall(&req.requester_id) {
                // "Show me more": continue the requester's last query.
                Some(prev) => self.serve(&prev, offset).await,
                None => self.random_sample(),
            }
        } else {
            let response = self.serve(&query, offset).await;
            // Only queries that actually produced something are worth
            // continuing later.
            if offset == 0 && !response.results.is_empty() {
                self.last_queries.remember(&req.requester_id, &query);
            }
            response
        };

        tracing::debug!(
            requester = %req.requester_id,
            query = %query,
            offset,
            results = response.results.len(),
            took_ms = started.elapsed().as_millis() as u64,
            "answered inline query"
        );
        response
    }

    async fn serve(&self, query: &str, offset: u64) -> InlineResponse {
        let view = match &self.remote {
            Some(provider) => {
                let source =
                    RemoteSource::new(provider.clone(), self.page_size, self.fetch_timeout_ms);
                self.pages.get_page(&source, query, offset).await
            }
            None => {
                let source =
                    CorpusSource::new(self.catalog_snapshot(), self.scorer, self.page_size);
                self.pages.get_page(&source, query, offset).await
            }
        };
        render(view)
    }

    fn random_sample(&self) -> InlineResponse {
        let catalog = self.catalog_snapshot();
        let records = rank::sample(catalog.iter(), self.page_size);
        // Samples are regenerated per request and never paginated.
        render(PageView {
            records,
            next_offset: None,
        })
    }
}

fn render(view: PageView) -> InlineResponse {
    InlineResponse {
        results: view.records.into_iter().map(item).collect(),
        next_offset: view
            .next_offset
            .map(|n| n.to_string())
            .unwrap_or_default(),
    }
}

fn item(rec: CardRecord) -> ResultItem {
    ResultItem {
        result_id: rec.id,
        image_url: rec.image_url,
        display_name: rec.name,
    }
}

/// Empty means "start from the beginning"; anything else must parse as a
/// page index. `None` is the malformed-input signal.
fn parse_offset(offset: &str) -> Option<u64> {
    let offset = offset.trim();
    if offset.is_empty() {
        return Some(0);
    }
    offset.parse::<u64>().ok()
}
