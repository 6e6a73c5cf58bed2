//! Local implementations for cardex: the ranking/matching engine, the
//! pagination and last-query caches, and the reqwest-backed Gatherer
//! adapters.
//!
//! The crate splits along the request path: `textnorm` + `score` + `rank`
//! turn a query and a catalog snapshot into an ordered candidate list,
//! `paginate` memoizes that list page by page, and `service` wires both
//! behind the inline-request boundary from `cardex-core`.

pub mod catalog;
pub mod gatherer;
pub mod lastquery;
pub mod paginate;
pub mod rank;
pub mod score;
pub mod service;
pub mod textnorm;

pub use catalog::{Catalog, CatalogStore};
pub use gatherer::{
    default_http_client, gatherer_endpoint_from_env, GathererClient, RemoteCatalog,
};
pub use lastquery::LastQueryCache;
pub use paginate::{
    CorpusSource, PageCache, PageSource, PageView, RemoteSource, SourceChunk, DEFAULT_CACHE_SIZE,
    DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_PAGE_SIZE,
};
pub use score::{FuzzyBackend, MatchScore, Scorer};
pub use service::{InlineService, ServiceConfig};
