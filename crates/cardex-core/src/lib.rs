use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("catalog error: {0}")]
    Catalog(String),
    #[error("catalog store error: {0}")]
    Store(String),
    #[error("upstream search failed: {0}")]
    Upstream(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// One printing of a card, as kept in the catalog.
///
/// Identity is `id`. `name` is not unique across printings; the catalog keeps
/// only the newest printing per name (see `cardex-local`). `release_date` is
/// an ISO `YYYY-MM-DD` date, so plain string comparison orders printings
/// correctly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardRecord {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub set_code: String,
    pub release_date: String,
}

impl CardRecord {
    pub fn has_image(&self) -> bool {
        !self.image_url.trim().is_empty()
    }
}

/// Inbound inline request at the service boundary.
///
/// `offset` is either empty (start from page 0) or a previously emitted
/// `next_offset` value. The caller is only partially trusted: an offset that
/// fails to parse is an input error, answered with an empty page, never a
/// crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineRequest {
    pub requester_id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub offset: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultItem {
    pub result_id: String,
    pub image_url: String,
    pub display_name: String,
}

/// Outbound page of results. `next_offset` is an opaque continuation token;
/// empty means "no more results".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineResponse {
    pub results: Vec<ResultItem>,
    pub next_offset: String,
}

impl InlineResponse {
    pub fn empty() -> Self {
        Self {
            results: Vec::new(),
            next_offset: String::new(),
        }
    }
}

/// A query against an upstream (remote) card search API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSearchQuery {
    pub query: String,
    /// Zero-based upstream page index.
    pub page: u64,
    pub page_size: usize,
    pub timeout_ms: Option<u64>,
}

impl CardSearchQuery {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// One upstream page: records plus the continuation token, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSearchPage {
    pub records: Vec<CardRecord>,
    pub next_page: Option<u64>,
}

#[async_trait::async_trait]
pub trait CardSearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, q: &CardSearchQuery) -> Result<CardSearchPage>;
}

/// Source of full catalog snapshots (bulk file load, remote catalog API).
///
/// The engine only needs a finite, re-iterable collection of records; where
/// they come from is the provider's concern.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// Version string of the newest catalog the source can provide.
    async fn latest_version(&self) -> Result<String>;
    /// Fetch every record of the newest catalog.
    async fn fetch_all(&self) -> Result<Vec<CardRecord>>;
}
