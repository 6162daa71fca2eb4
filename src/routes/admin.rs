//! HTTP routes for site administration
//!
//! - GET /api/admin/settings - Read site settings (any authenticated user)
//! - PUT /api/admin/settings - Update site settings (regulators only)

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::Role;
use crate::db::schemas::{SiteSettingsDoc, SITE_SETTINGS_COLLECTION, SITE_SETTINGS_KEY};
use crate::routes::{
    authenticate, error_response, error_to_response, json_response, parse_json_body, require_role,
    BoxBody,
};
use crate::server::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub maintenance_mode: bool,
    pub registration_open: bool,
    pub marketplace_fee_percent: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub maintenance_mode: Option<bool>,
    #[serde(default)]
    pub registration_open: Option<bool>,
    #[serde(default)]
    pub marketplace_fee_percent: Option<f64>,
}

fn settings_to_response(settings: &SiteSettingsDoc) -> SettingsResponse {
    SettingsResponse {
        maintenance_mode: settings.maintenance_mode,
        registration_open: settings.registration_open,
        marketplace_fee_percent: settings.marketplace_fee_percent,
    }
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /api/admin/* routes
pub async fn handle_admin_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let method = req.method().clone();
    let path = req.uri().path().split('?').next().unwrap_or("").to_string();

    match (method, path.as_str()) {
        (Method::GET, "/api/admin/settings") => handle_get_settings(req, state).await,
        (Method::PUT, "/api/admin/settings") => handle_update_settings(req, state).await,

        (_, "/api/admin/settings") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
        }

        _ => error_response(StatusCode::NOT_FOUND, "Admin endpoint not found", None),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /api/admin/settings
async fn handle_get_settings(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    if let Err(resp) = authenticate(&req, &state).await {
        return resp;
    }

    let mongo = match &state.mongo {
        Some(m) => m,
        None => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Database not available",
                Some("DB_UNAVAILABLE"),
            )
        }
    };

    let collection = match mongo
        .collection::<SiteSettingsDoc>(SITE_SETTINGS_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting settings collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    // Missing singleton means defaults
    let settings = match collection.find_one(doc! { "key": SITE_SETTINGS_KEY }).await {
        Ok(Some(s)) => s,
        Ok(None) => SiteSettingsDoc::default(),
        Err(e) => {
            warn!("Error loading settings: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    json_response(StatusCode::OK, &settings_to_response(&settings))
}

/// PUT /api/admin/settings (regulators only)
async fn handle_update_settings(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require_role(&ctx, &[Role::Regulator]) {
        return resp;
    }

    let body: UpdateSettingsRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_to_response(e, None),
    };

    if let Some(fee) = body.marketplace_fee_percent {
        if !fee.is_finite() || !(0.0..=100.0).contains(&fee) {
            return error_response(
                StatusCode::BAD_REQUEST,
                "marketplaceFeePercent must be between 0 and 100",
                None,
            );
        }
    }

    let mongo = match &state.mongo {
        Some(m) => m,
        None => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Database not available",
                Some("DB_UNAVAILABLE"),
            )
        }
    };

    let collection = match mongo
        .collection::<SiteSettingsDoc>(SITE_SETTINGS_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting settings collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let mut settings = match collection.find_one(doc! { "key": SITE_SETTINGS_KEY }).await {
        Ok(Some(s)) => s,
        Ok(None) => SiteSettingsDoc::default(),
        Err(e) => {
            warn!("Error loading settings: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    if let Some(maintenance_mode) = body.maintenance_mode {
        settings.maintenance_mode = maintenance_mode;
    }
    if let Some(registration_open) = body.registration_open {
        settings.registration_open = registration_open;
    }
    if let Some(fee) = body.marketplace_fee_percent {
        settings.marketplace_fee_percent = fee;
    }

    let update = doc! {
        "$set": {
            "key": SITE_SETTINGS_KEY,
            "maintenance_mode": settings.maintenance_mode,
            "registration_open": settings.registration_open,
            "marketplace_fee_percent": settings.marketplace_fee_percent,
            "metadata.updated_at": bson::DateTime::now(),
        },
        "$setOnInsert": {
            "metadata.created_at": bson::DateTime::now(),
            "metadata.is_deleted": false,
        },
    };

    if let Err(e) = collection
        .inner()
        .update_one(doc! { "key": SITE_SETTINGS_KEY }, update)
        .upsert(true)
        .await
    {
        warn!("Error updating settings: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update settings",
            Some("DB_ERROR"),
        );
    }

    info!("Site settings updated by {}", ctx.claims.identifier);

    state
        .activity
        .record(
            ctx.user_id,
            "settings.update",
            doc! {
                "maintenance_mode": settings.maintenance_mode,
                "registration_open": settings.registration_open,
                "marketplace_fee_percent": settings.marketplace_fee_percent,
            },
        )
        .await;

    json_response(StatusCode::OK, &settings_to_response(&settings))
}
