//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling. Requests dispatch on
//! (method, path) to the route modules; all shared services hang off
//! [`AppState`], constructed explicitly in `main` and passed down - no
//! module-level client handles.

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::cache::{self, CacheConfig, ContentCache};
use crate::config::Args;
use crate::db::MongoClient;
use crate::ledger::{LedgerClient, SimulatedLedger};
use crate::logging::ActivityLogger;
use crate::routes;
use crate::routes::BoxBody;
use crate::types::CanopyError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub mongo: Option<MongoClient>,
    /// In-process cache for credit listings, stats, and user profiles
    pub cache: Arc<ContentCache>,
    /// Simulated blockchain side channel
    pub ledger: Arc<dyn LedgerClient>,
    /// Audit trail writer
    pub activity: ActivityLogger,
}

impl AppState {
    /// Create AppState without a database (dev mode only)
    pub fn new(args: Args) -> Self {
        let cache = Arc::new(ContentCache::new(CacheConfig::from_args(&args)));
        Self {
            args,
            mongo: None,
            cache,
            ledger: Arc::new(SimulatedLedger::new()),
            activity: ActivityLogger::new(None),
        }
    }

    /// Create AppState with services
    pub fn with_services(args: Args, mongo: Option<MongoClient>) -> Self {
        let cache = Arc::new(ContentCache::new(CacheConfig::from_args(&args)));
        let activity = ActivityLogger::new(mongo.clone());
        Self {
            args,
            mongo,
            cache,
            ledger: Arc::new(SimulatedLedger::new()),
            activity,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), CanopyError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Canopy listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - weak JWT secret permitted");
    }

    // Start cache cleanup task
    cache::spawn_cleanup_task(Arc::clone(&state.cache));
    info!(
        "Cache service enabled (max {} entries, list TTL {}s)",
        state.cache.config().max_entries,
        state.cache.config().list_ttl.as_secs()
    );

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    // CORS preflight
    if method == Method::OPTIONS {
        return Ok(routes::cors_preflight());
    }

    let response = match path.as_str() {
        // Liveness probe
        "/health" | "/healthz" => routes::health_check(Arc::clone(&state)),

        // Version info for deployment verification
        "/version" => routes::version_info(),

        p if p.starts_with("/api/auth") => {
            routes::handle_auth_request(req, Arc::clone(&state)).await
        }

        p if p.starts_with("/api/credits") => {
            routes::handle_credit_request(req, Arc::clone(&state)).await
        }

        p if p.starts_with("/api/users") => {
            routes::handle_user_request(req, Arc::clone(&state)).await
        }

        p if p.starts_with("/api/gamification") => {
            routes::handle_gamification_request(req, Arc::clone(&state)).await
        }

        p if p.starts_with("/api/reports") => {
            routes::handle_report_request(req, Arc::clone(&state)).await
        }

        p if p.starts_with("/api/admin") => {
            routes::handle_admin_request(req, Arc::clone(&state)).await
        }

        _ => routes::error_response(StatusCode::NOT_FOUND, "Not found", None),
    };

    Ok(response)
}
