//! Health and version endpoints

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::routes::{json_response, BoxBody};
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    node_id: String,
    database: &'static str,
    cache_entries: usize,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    name: &'static str,
    version: &'static str,
}

/// GET /health - Liveness probe, returns 200 while the process is running
pub fn health_check(state: Arc<AppState>) -> Response<BoxBody> {
    let database = if state.mongo.is_some() {
        "connected"
    } else {
        "unconfigured"
    };

    json_response(
        StatusCode::OK,
        &HealthResponse {
            status: "ok",
            node_id: state.args.node_id.to_string(),
            database,
            cache_entries: state.cache.stats().entries,
        },
    )
}

/// GET /version - Build info for deployment verification
pub fn version_info() -> Response<BoxBody> {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
