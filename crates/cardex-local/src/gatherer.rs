//! Reqwest-backed adapters for the Gatherer-style card API.
//!
//! Two concerns share the endpoint: `GathererClient` answers paged name
//! searches (the remote variant of the paginator's source), and
//! `RemoteCatalog` downloads the full catalog for the on-disk store. The
//! wire shapes here are the adapter's contract and are fixture-tested; no
//! other module knows about them.

use crate::catalog::version_key;
use cardex_core::{
    CardRecord, CardSearchPage, CardSearchProvider, CardSearchQuery, CatalogSource, Error, Result,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://api.magicthegathering.io/v1";

/// Catalog downloads fetch this many cards per request.
const CATALOG_PAGE_SIZE: usize = 100;

/// Hard cap on catalog pagination, far above any real catalog size.
const CATALOG_MAX_PAGES: u64 = 5_000;

/// Shared HTTP client with safety defaults: avoid "hang forever" on
/// DNS/TLS/body stalls. Per-request timeouts can still tighten this.
pub fn default_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("cardex-local/0.1")
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Upstream(e.to_string()))
}

pub fn gatherer_endpoint_from_env() -> Option<String> {
    std::env::var("CARDEX_GATHERER_ENDPOINT")
        .ok()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
}

fn timeout_ms_from_query(q: &CardSearchQuery) -> u64 {
    // Provider requests can hang indefinitely without an explicit timeout.
    // Keep a conservative cap even if callers pass something huge.
    q.timeout_ms.unwrap_or(10_000).clamp(1_000, 60_000)
}

#[derive(Debug, Clone)]
pub struct GathererClient {
    client: reqwest::Client,
    endpoint: String,
}

impl GathererClient {
    pub fn new(client: reqwest::Client, endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        url::Url::parse(&endpoint).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let endpoint = gatherer_endpoint_from_env().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Self::new(client, &endpoint)
    }

    fn cards_endpoint(&self) -> String {
        format!("{}/cards", self.endpoint)
    }
}

#[derive(Debug, Deserialize)]
struct GathererCardsResponse {
    cards: Option<Vec<GathererCard>>,
}

#[derive(Debug, Deserialize)]
struct GathererCard {
    id: Option<String>,
    name: Option<String>,
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
    #[serde(rename = "set")]
    set_code: Option<String>,
}

impl GathererCard {
    /// Lift a raw wire card into a record, given the set release dates.
    /// Cards without id, name, or image are dropped at the boundary.
    fn into_record(self, release_dates: &BTreeMap<String, String>) -> Option<CardRecord> {
        let id = self.id.filter(|s| !s.is_empty())?;
        let name = self.name.filter(|s| !s.is_empty())?;
        let image_url = self.image_url.filter(|s| !s.trim().is_empty())?;
        let set_code = self.set_code.unwrap_or_default();
        let release_date = release_dates.get(&set_code).cloned().unwrap_or_default();
        Some(CardRecord {
            id,
            name,
            image_url,
            set_code,
            release_date,
        })
    }
}

#[async_trait::async_trait]
impl CardSearchProvider for GathererClient {
    fn name(&self) -> &'static str {
        "gatherer"
    }

    async fn search(&self, q: &CardSearchQuery) -> Result<CardSearchPage> {
        let timeout_ms = timeout_ms_from_query(q);
        // The API pages from 1; our cursors are zero-based.
        let page = q.page.saturating_add(1);

        let resp = self
            .client
            .get(self.cards_endpoint())
            .query(&[
                ("name", q.query.as_str()),
                ("page", page.to_string().as_str()),
                ("pageSize", q.page_size.to_string().as_str()),
            ])
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("card search HTTP {status}")));
        }

        let parsed: GathererCardsResponse = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;

        let raw = parsed.cards.unwrap_or_default();
        let full_page = raw.len() >= q.page_size;
        let no_dates = BTreeMap::new();
        let records: Vec<CardRecord> = raw
            .into_iter()
            .filter_map(|c| c.into_record(&no_dates))
            .collect();

        Ok(CardSearchPage {
            records,
            // A short page means the upstream ran out. Dropped imageless
            // cards can shrink a full page, so this keys off the raw count.
            next_page: full_page.then(|| q.page + 1),
        })
    }
}

/// Full-catalog downloads: version probe, set release dates, and the paged
/// card sweep, joined into catalog-ready records.
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChangelogEntry {
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GathererSetsResponse {
    sets: Option<Vec<GathererSet>>,
}

#[derive(Debug, Deserialize)]
struct GathererSet {
    code: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<String>,
}

impl RemoteCatalog {
    pub fn new(client: reqwest::Client, endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = endpoint.trim().trim_end_matches('/').to_string();
        url::Url::parse(&endpoint).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            client,
            endpoint,
            timeout,
        })
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let endpoint = gatherer_endpoint_from_env().unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Self::new(client, &endpoint, Duration::from_secs(30))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::Upstream(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!("catalog fetch HTTP {status}")));
        }
        resp.json().await.map_err(|e| Error::Upstream(e.to_string()))
    }

    async fn fetch_release_dates(&self) -> Result<BTreeMap<String, String>> {
        let parsed: GathererSetsResponse =
            self.get_json(format!("{}/sets", self.endpoint), &[]).await?;
        let mut out = BTreeMap::new();
        for set in parsed.sets.unwrap_or_default() {
            let (Some(code), Some(date)) = (set.code, set.release_date) else {
                continue;
            };
            out.insert(code, date);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl CatalogSource for RemoteCatalog {
    async fn latest_version(&self) -> Result<String> {
        let entries: Vec<ChangelogEntry> = self
            .get_json(format!("{}/changelog", self.endpoint), &[])
            .await?;
        entries
            .into_iter()
            .filter_map(|e| e.version)
            .filter_map(|v| version_key(&v).map(|k| (k, v)))
            .max_by(|a, b| a.0.cmp(&b.0))
            .map(|(_, v)| v)
            .ok_or_else(|| Error::Upstream("changelog carried no parseable version".to_string()))
    }

    async fn fetch_all(&self) -> Result<Vec<CardRecord>> {
        let release_dates = self.fetch_release_dates().await?;
        let mut out = Vec::new();

        for page in 1..=CATALOG_MAX_PAGES {
            let parsed: GathererCardsResponse = self
                .get_json(
                    format!("{}/cards", self.endpoint),
                    &[
                        ("page", page.to_string()),
                        ("pageSize", CATALOG_PAGE_SIZE.to_string()),
                    ],
                )
                .await?;
            let raw = parsed.cards.unwrap_or_default();
            let raw_len = raw.len();
            out.extend(raw.into_iter().filter_map(|c| c.into_record(&release_dates)));
            if raw_len < CATALOG_PAGE_SIZE {
                return Ok(out);
            }
        }

        tracing::warn!(
            pages = CATALOG_MAX_PAGES,
            "catalog pagination hit the safety cap; returning what was fetched"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::Query;
    use axum::{routing::get, Json, Router};
    use std::net::SocketAddr;

    async fn serve(app: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn search_query(q: &str, page: u64) -> CardSearchQuery {
        CardSearchQuery {
            query: q.to_string(),
            page,
            page_size: 2,
            timeout_ms: Some(2_000),
        }
    }

    #[tokio::test]
    async fn search_maps_cards_and_drops_imageless_ones() {
        let app = Router::new().route(
            "/cards",
            get(|| async {
                Json(serde_json::json!({
                    "cards": [
                        {"id": "a1", "name": "Lightning Bolt", "imageUrl": "https://i/a1.png", "set": "M11"},
                        {"id": "a2", "name": "Lightning Bolt", "set": "LEA"}
                    ]
                }))
            }),
        );
        let addr = serve(app).await;

        let client =
            GathererClient::new(reqwest::Client::new(), &format!("http://{addr}")).unwrap();
        let page = client.search(&search_query("bolt", 0)).await.unwrap();

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].id, "a1");
        assert_eq!(page.records[0].set_code, "M11");
        // Two raw cards on a page_size=2 request: upstream may have more.
        assert_eq!(page.next_page, Some(1));
    }

    #[tokio::test]
    async fn short_page_terminates_the_cursor() {
        let app = Router::new().route(
            "/cards",
            get(|| async {
                Json(serde_json::json!({
                    "cards": [
                        {"id": "a1", "name": "Shock", "imageUrl": "https://i/a1.png", "set": "M21"}
                    ]
                }))
            }),
        );
        let addr = serve(app).await;

        let client =
            GathererClient::new(reqwest::Client::new(), &format!("http://{addr}")).unwrap();
        let page = client.search(&search_query("shock", 3)).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.next_page, None);
    }

    #[tokio::test]
    async fn non_2xx_surfaces_as_upstream_error() {
        let app = Router::new().route(
            "/cards",
            get(|| async { (axum::http::StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        );
        let addr = serve(app).await;

        let client =
            GathererClient::new(reqwest::Client::new(), &format!("http://{addr}")).unwrap();
        let err = client.search(&search_query("bolt", 0)).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn search_requests_one_based_pages() {
        let app = Router::new().route(
            "/cards",
            get(|Query(params): Query<BTreeMap<String, String>>| async move {
                assert_eq!(params.get("page").map(String::as_str), Some("1"));
                assert_eq!(params.get("name").map(String::as_str), Some("bolt"));
                Json(serde_json::json!({ "cards": [] }))
            }),
        );
        let addr = serve(app).await;

        let client =
            GathererClient::new(reqwest::Client::new(), &format!("http://{addr}")).unwrap();
        let page = client.search(&search_query("bolt", 0)).await.unwrap();
        assert!(page.records.is_empty());
        assert_eq!(page.next_page, None);
    }

    #[tokio::test]
    async fn remote_catalog_joins_release_dates_across_pages() {
        let app = Router::new()
            .route(
                "/changelog",
                get(|| async {
                    Json(serde_json::json!([
                        {"version": "4.9.0"},
                        {"version": "4.10.0"},
                        {"version": "not-a-version"}
                    ]))
                }),
            )
            .route(
                "/sets",
                get(|| async {
                    Json(serde_json::json!({
                        "sets": [
                            {"code": "LEA", "releaseDate": "1993-08-05"},
                            {"code": "M11", "releaseDate": "2010-07-16"}
                        ]
                    }))
                }),
            )
            .route(
                "/cards",
                get(|Query(params): Query<BTreeMap<String, String>>| async move {
                    let page: u64 = params.get("page").unwrap().parse().unwrap();
                    let cards = if page == 1 {
                        // A full page (CATALOG_PAGE_SIZE) forces a second request.
                        (0..100)
                            .map(|i| {
                                serde_json::json!({
                                    "id": format!("p1-{i}"),
                                    "name": format!("Filler {i}"),
                                    "imageUrl": format!("https://i/{i}.png"),
                                    "set": "M11"
                                })
                            })
                            .collect::<Vec<_>>()
                    } else {
                        vec![serde_json::json!({
                            "id": "p2-0",
                            "name": "Lightning Bolt",
                            "imageUrl": "https://i/bolt.png",
                            "set": "LEA"
                        })]
                    };
                    Json(serde_json::json!({ "cards": cards }))
                }),
            );
        let addr = serve(app).await;

        let remote = RemoteCatalog::new(
            reqwest::Client::new(),
            &format!("http://{addr}"),
            Duration::from_secs(2),
        )
        .unwrap();

        assert_eq!(remote.latest_version().await.unwrap(), "4.10.0");

        let records = remote.fetch_all().await.unwrap();
        assert_eq!(records.len(), 101);
        let bolt = records.iter().find(|r| r.name == "Lightning Bolt").unwrap();
        assert_eq!(bolt.release_date, "1993-08-05");
        assert_eq!(records[0].release_date, "2010-07-16");
    }

    #[test]
    fn endpoint_validation_rejects_garbage() {
        let err = GathererClient::new(reqwest::Client::new(), "not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }
}
