use anyhow::{bail, Context, Result};
use cardex_core::{CardSearchProvider, CatalogSource, InlineRequest, InlineResponse};
use cardex_local::{
    default_http_client, gatherer_endpoint_from_env, Catalog, CatalogStore, FuzzyBackend,
    GathererClient, InlineService, RemoteCatalog, ServiceConfig,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cardex-bot")]
#[command(about = "Inline card-image search (ranked matches, paged answers)", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve newline-delimited JSON inline requests on stdin, one JSON
    /// response per line on stdout, until EOF or ctrl-c.
    Serve(ServeCmd),
    /// Answer a single inline request and print the response JSON.
    Query(QueryCmd),
    /// Refresh the on-disk catalog from the remote card API when stale.
    Refresh(RefreshCmd),
    /// Diagnose configuration/launch issues (json; no secrets).
    Doctor(DoctorCmd),
    /// Print version info (json).
    Version,
}

#[derive(clap::Args, Debug, Clone)]
struct EngineArgs {
    /// Data directory holding `cards_<version>.json` catalogs.
    #[arg(long, env = "CARDEX_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Fuzzy ratio backend. Allowed: ratio, skim
    #[arg(long, default_value = "ratio")]
    fuzzy: String,
    /// Route cache misses to the remote card API instead of ranking the
    /// local catalog.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    remote: bool,
    /// Results per page.
    #[arg(long, default_value_t = cardex_local::DEFAULT_PAGE_SIZE)]
    page_size: usize,
    /// Distinct queries kept in the pagination cache.
    #[arg(long, default_value_t = cardex_local::DEFAULT_CACHE_SIZE)]
    cache_queries: usize,
    /// Requesters kept in the last-query cache.
    #[arg(long, default_value_t = 1_024)]
    last_query_capacity: usize,
    /// Per-fetch upstream timeout in milliseconds.
    #[arg(long, default_value_t = cardex_local::DEFAULT_FETCH_TIMEOUT_MS)]
    fetch_timeout_ms: u64,
}

#[derive(clap::Args, Debug)]
struct ServeCmd {
    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(clap::Args, Debug)]
struct QueryCmd {
    #[command(flatten)]
    engine: EngineArgs,
    /// Requester identity for last-query continuation.
    #[arg(long, default_value = "local")]
    user: String,
    /// Query string; empty samples random cards.
    #[arg(long, default_value = "")]
    query: String,
    /// Continuation offset from a previous response.
    #[arg(long, default_value = "")]
    offset: String,
}

#[derive(clap::Args, Debug)]
struct RefreshCmd {
    /// Data directory holding `cards_<version>.json` catalogs.
    #[arg(long, env = "CARDEX_DATA_DIR")]
    data_dir: Option<PathBuf>,
    /// Re-download even when the local catalog version matches upstream.
    #[arg(long, action = clap::ArgAction::Set, default_value_t = false)]
    force: bool,
}

#[derive(clap::Args, Debug)]
struct DoctorCmd {
    /// Data directory holding `cards_<version>.json` catalogs.
    #[arg(long, env = "CARDEX_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

fn init_tracing() {
    // Logs go to stderr; stdout is reserved for response/report JSON.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("CARDEX_LOG")
                .unwrap_or_else(|_| "cardex=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn resolve_data_dir(flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("cardex")
    })
}

fn load_catalog(store: &CatalogStore) -> Result<(Option<String>, Catalog)> {
    match store.load_newest()? {
        Some((version, catalog)) => {
            tracing::info!(version = %version, cards = catalog.len(), "catalog loaded");
            Ok((Some(version), catalog))
        }
        None => {
            tracing::warn!(dir = %store.dir().display(), "no catalog on disk; run `cardex-bot refresh`");
            Ok((None, Catalog::new()))
        }
    }
}

fn build_service(engine: &EngineArgs) -> Result<InlineService> {
    let Some(fuzzy) = FuzzyBackend::parse(&engine.fuzzy) else {
        bail!("unknown fuzzy backend {:?} (allowed: ratio, skim)", engine.fuzzy);
    };

    let store = CatalogStore::new(resolve_data_dir(engine.data_dir.clone()));
    let (_, catalog) = load_catalog(&store)?;

    let config = ServiceConfig {
        page_size: engine.page_size,
        page_cache_queries: engine.cache_queries,
        last_query_capacity: engine.last_query_capacity,
        fuzzy_backend: fuzzy,
        fetch_timeout_ms: engine.fetch_timeout_ms,
    };
    let service = InlineService::new(catalog, config);

    if engine.remote {
        let provider: Arc<dyn CardSearchProvider> =
            Arc::new(GathererClient::from_env(default_http_client()?)?);
        Ok(service.with_remote(provider))
    } else {
        Ok(service)
    }
}

/// Response line emitted by the serve loop. Requests are answered
/// concurrently, so each line carries the requester it belongs to.
#[derive(Debug, Serialize)]
struct ServeReply {
    requester_id: String,
    results: Vec<cardex_core::ResultItem>,
    next_offset: String,
}

impl ServeReply {
    fn new(requester_id: String, resp: InlineResponse) -> Self {
        Self {
            requester_id,
            results: resp.results,
            next_offset: resp.next_offset,
        }
    }
}

async fn run_serve(cmd: ServeCmd) -> Result<()> {
    let service = Arc::new(build_service(&cmd.engine)?);
    tracing::info!("serving inline queries on stdin");

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            println!("{line}");
        }
    });

    // One worker per requester: a requester's own requests stay ordered
    // (offsets are a continuation contract), while a slow upstream fetch for
    // one requester never stalls the others.
    let mut workers: std::collections::HashMap<
        String,
        tokio::sync::mpsc::UnboundedSender<InlineRequest>,
    > = std::collections::HashMap::new();

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, shutting down");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let req: InlineRequest = match serde_json::from_str(&line) {
                    Ok(req) => req,
                    Err(e) => {
                        // Partially trusted input: answer with an empty page
                        // rather than dying on a bad line.
                        tracing::warn!(error = %e, "unparseable request line");
                        let _ = tx.send(
                            serde_json::to_string(&ServeReply::new(
                                String::new(),
                                InlineResponse::empty(),
                            ))
                            .expect("serialize empty reply"),
                        );
                        continue;
                    }
                };

                let worker = workers.entry(req.requester_id.clone()).or_insert_with(|| {
                    let service = service.clone();
                    let tx = tx.clone();
                    let (worker_tx, mut worker_rx) =
                        tokio::sync::mpsc::unbounded_channel::<InlineRequest>();
                    tokio::spawn(async move {
                        while let Some(req) = worker_rx.recv().await {
                            let resp = service.answer(&req).await;
                            let reply = ServeReply::new(req.requester_id, resp);
                            let _ = tx.send(
                                serde_json::to_string(&reply).expect("serialize reply"),
                            );
                        }
                    });
                    worker_tx
                });
                let _ = worker.send(req);
            }
        }
    }

    // Close the worker queues, let them drain, then wait for the writer to
    // flush every pending reply (it ends once all senders are gone).
    drop(workers);
    drop(tx);
    writer.await.context("flushing responses")?;
    Ok(())
}

async fn run_query(cmd: QueryCmd) -> Result<()> {
    let service = build_service(&cmd.engine)?;
    let req = InlineRequest {
        requester_id: cmd.user,
        query: cmd.query,
        offset: cmd.offset,
    };
    let resp = service.answer(&req).await;
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

async fn run_refresh(cmd: RefreshCmd) -> Result<()> {
    let store = CatalogStore::new(resolve_data_dir(cmd.data_dir));
    let remote = RemoteCatalog::from_env(default_http_client()?)?;

    let latest = remote
        .latest_version()
        .await
        .context("probing remote catalog version")?;
    let local = store.newest_version();

    if !cmd.force && local.as_deref() == Some(latest.as_str()) {
        tracing::info!(version = %latest, "catalog already current");
        println!(
            "{}",
            serde_json::json!({
                "schema_version": 1,
                "kind": "refresh",
                "refreshed": false,
                "version": latest,
            })
        );
        return Ok(());
    }

    tracing::info!(local = ?local, remote = %latest, "downloading catalog");
    let records = remote.fetch_all().await.context("downloading catalog")?;
    let fetched = records.len();
    let catalog = Catalog::from_records(records);
    store.save(&latest, &catalog)?;
    tracing::info!(
        version = %latest,
        fetched,
        kept = catalog.len(),
        "catalog saved"
    );

    println!(
        "{}",
        serde_json::json!({
            "schema_version": 1,
            "kind": "refresh",
            "refreshed": true,
            "version": latest,
            "fetched": fetched,
            "cards": catalog.len(),
        })
    );
    Ok(())
}

fn run_doctor(cmd: DoctorCmd) -> Result<()> {
    let data_dir = resolve_data_dir(cmd.data_dir);
    let store = CatalogStore::new(data_dir.clone());
    let version = store.newest_version();
    let cards = match &version {
        Some(v) => store.load(v).map(|c| c.len()).ok(),
        None => None,
    };

    println!(
        "{}",
        serde_json::json!({
            "schema_version": 1,
            "kind": "doctor",
            "data_dir": data_dir.display().to_string(),
            "catalog_present": version.is_some(),
            "catalog_version": version,
            "catalog_cards": cards,
            "endpoint": gatherer_endpoint_from_env()
                .unwrap_or_else(|| "https://api.magicthegathering.io/v1 (default)".to_string()),
        })
    );
    Ok(())
}

fn run_version() -> Result<()> {
    println!(
        "{}",
        serde_json::json!({
            "schema_version": 1,
            "kind": "version",
            "name": "cardex-bot",
            "version": env!("CARGO_PKG_VERSION"),
        })
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(cmd) => run_serve(cmd).await,
        Commands::Query(cmd) => run_query(cmd).await,
        Commands::Refresh(cmd) => run_refresh(cmd).await,
        Commands::Doctor(cmd) => run_doctor(cmd),
        Commands::Version => run_version(),
    }
}
