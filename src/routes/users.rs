//! HTTP routes for user accounts
//!
//! - GET    /api/users/profile              - Own profile (cache-aside)
//! - PUT    /api/users/settings             - Update own preferences
//! - POST   /api/users/onboarding/complete  - Finish onboarding
//! - POST   /api/users/verify/:id           - Verify a user (regulators)
//! - DELETE /api/users/:id                  - Soft-delete a user (regulators)

use bson::{doc, oid::ObjectId};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::Role;
use crate::cache::{user_profile_key, user_profile_prefix};
use crate::db::schemas::{OnboardingStatus, UserDoc, USER_COLLECTION};
use crate::routes::{
    authenticate, error_response, error_to_response, json_response, parse_json_body,
    raw_json_response, require_role, BoxBody, SuccessResponse,
};
use crate::server::AppState;

// =============================================================================
// Response Types
// =============================================================================

/// User as rendered on the wire (never includes the password hash)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: String,
    pub email: String,
    pub user_type: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub onboarding_status: OnboardingStatus,
    pub verified: bool,
    pub settings: SettingsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSummary {
    pub notifications: bool,
    pub language: String,
    pub theme: String,
    pub two_factor_auth: bool,
}

/// Convert a stored user to its wire form
pub fn user_to_summary(user: &UserDoc) -> UserSummary {
    UserSummary {
        id: user._id.map(|id| id.to_hex()).unwrap_or_default(),
        name: user.name.clone(),
        email: user.identifier.clone(),
        user_type: user.user_type,
        organization: user.organization.clone(),
        phone: user.phone.clone(),
        onboarding_status: user.onboarding_status,
        verified: user.verified,
        settings: SettingsSummary {
            notifications: user.settings.notifications,
            language: user.settings.language.clone(),
            theme: user.settings.theme.clone(),
            two_factor_auth: user.settings.two_factor_auth,
        },
        created_at: user
            .metadata
            .created_at
            .and_then(|d| d.try_to_rfc3339_string().ok()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    #[serde(default)]
    pub notifications: Option<bool>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub two_factor_auth: Option<bool>,
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /api/users/* routes
pub async fn handle_user_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let method = req.method().clone();
    let path = req.uri().path().split('?').next().unwrap_or("").to_string();

    match (method, path.as_str()) {
        (Method::GET, "/api/users/profile") => handle_profile(req, state).await,
        (Method::PUT, "/api/users/settings") => handle_update_settings(req, state).await,
        (Method::POST, "/api/users/onboarding/complete") => {
            handle_complete_onboarding(req, state).await
        }
        (Method::POST, p) if p.starts_with("/api/users/verify/") => {
            let id = p.strip_prefix("/api/users/verify/").unwrap_or("");
            handle_verify(req, state, id.to_string()).await
        }
        (Method::DELETE, p) if p.starts_with("/api/users/") => {
            let id = p.strip_prefix("/api/users/").unwrap_or("");
            handle_delete(req, state, id.to_string()).await
        }

        _ => error_response(StatusCode::NOT_FOUND, "User endpoint not found", None),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /api/users/profile - Own profile, cache-aside on a per-user key
async fn handle_profile(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let storage_key = user_profile_key(&ctx.user_id.to_hex());
    if let Some(entry) = state.cache.get(&storage_key) {
        return raw_json_response(StatusCode::OK, entry.data);
    }

    let summary = user_to_summary(&ctx.user);
    let body = match serde_json::to_vec(&summary) {
        Ok(b) => b,
        Err(e) => {
            warn!("Error serializing profile: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Serialization error",
                None,
            );
        }
    };

    state
        .cache
        .set(&storage_key, body.clone(), state.cache.config().profile_ttl);

    raw_json_response(StatusCode::OK, body)
}

/// PUT /api/users/settings - Update own preferences
async fn handle_update_settings(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let body: UpdateSettingsRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_to_response(e, None),
    };

    let mut user = ctx.user;
    if let Some(notifications) = body.notifications {
        user.settings.notifications = notifications;
    }
    if let Some(language) = body.language {
        if language.trim().is_empty() {
            return error_response(StatusCode::BAD_REQUEST, "language cannot be empty", None);
        }
        user.settings.language = language;
    }
    if let Some(theme) = body.theme {
        match theme.as_str() {
            "light" | "dark" => user.settings.theme = theme,
            _ => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "theme must be 'light' or 'dark'",
                    None,
                )
            }
        }
    }
    if let Some(two_factor_auth) = body.two_factor_auth {
        user.settings.two_factor_auth = two_factor_auth;
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

    let collection = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting users collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let settings_bson = match bson::to_bson(&user.settings) {
        Ok(b) => b,
        Err(e) => {
            warn!("Error encoding settings: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Serialization error",
                None,
            );
        }
    };

    if let Err(e) = collection
        .update_one(
            doc! { "_id": ctx.user_id },
            doc! { "$set": {
                "settings": settings_bson,
                "metadata.updated_at": bson::DateTime::now(),
            }},
        )
        .await
    {
        warn!("Error updating settings: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update settings",
            Some("DB_ERROR"),
        );
    }

    state
        .cache
        .invalidate_pattern(&user_profile_prefix(&ctx.user_id.to_hex()));

    json_response(StatusCode::OK, &user_to_summary(&user))
}

/// POST /api/users/onboarding/complete
///
/// Pending -> Completed only; the transition is a conditional update so a
/// bypassed or already-completed user gets a state error, not a silent write.
async fn handle_complete_onboarding(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

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

    let collection = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting users collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let updated = match collection
        .find_one_and_update(
            doc! { "_id": ctx.user_id, "onboarding_status": "pending" },
            doc! { "$set": { "onboarding_status": "completed" } },
        )
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "Onboarding is not pending",
                Some("INVALID_STATE"),
            )
        }
        Err(e) => {
            warn!("Error completing onboarding: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    state
        .cache
        .invalidate_pattern(&user_profile_prefix(&ctx.user_id.to_hex()));

    info!("Onboarding completed: {}", ctx.claims.identifier);

    json_response(StatusCode::OK, &user_to_summary(&updated))
}

/// POST /api/users/verify/:id - Mark a user verified (regulators only)
async fn handle_verify(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: String,
) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require_role(&ctx, &[Role::Regulator]) {
        return resp;
    }

    let target_id = match ObjectId::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid user id", None),
    };

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

    let collection = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting users collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let updated = match collection
        .find_one_and_update(
            doc! { "_id": target_id },
            doc! { "$set": { "verified": true } },
        )
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "User not found", Some("NOT_FOUND"))
        }
        Err(e) => {
            warn!("Error verifying user: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    info!(
        "User verified: {} by regulator {}",
        updated.identifier, ctx.claims.identifier
    );

    state
        .activity
        .record(
            ctx.user_id,
            "user.verify",
            doc! { "target": target_id, "email": &updated.identifier },
        )
        .await;

    state
        .cache
        .invalidate_pattern(&user_profile_prefix(&target_id.to_hex()));

    // Mirror the verification onto the ledger; failure aborts the request
    // (the verification itself is already committed - no rollback)
    if let Err(e) = state
        .ledger
        .update_user(&serde_json::json!({
            "user": target_id.to_hex(),
            "verified": true,
        }))
        .await
    {
        warn!("Ledger update failed after verification: {}", e);
        return error_to_response(e, Some("LEDGER_ERROR"));
    }

    json_response(StatusCode::OK, &user_to_summary(&updated))
}

/// DELETE /api/users/:id - Soft-delete a user (regulators only)
async fn handle_delete(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: String,
) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require_role(&ctx, &[Role::Regulator]) {
        return resp;
    }

    let target_id = match ObjectId::parse_str(&id) {
        Ok(id) => id,
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid user id", None),
    };

    if target_id == ctx.user_id {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Cannot delete your own account",
            Some("INVALID_STATE"),
        );
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

    let collection = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting users collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let target = match collection.find_one(doc! { "_id": target_id }).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "User not found", Some("NOT_FOUND"))
        }
        Err(e) => {
            warn!("Error loading user: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    if let Err(e) = collection.soft_delete(doc! { "_id": target_id }).await {
        warn!("Error deleting user: {}", e);
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to delete user",
            Some("DB_ERROR"),
        );
    }

    info!(
        "User deleted: {} by regulator {}",
        target.identifier, ctx.claims.identifier
    );

    state
        .activity
        .record(
            ctx.user_id,
            "user.delete",
            doc! { "target": target_id, "email": &target.identifier },
        )
        .await;

    state
        .cache
        .invalidate_pattern(&user_profile_prefix(&target_id.to_hex()));

    json_response(
        StatusCode::OK,
        &SuccessResponse {
            success: true,
            message: "User deleted".into(),
        },
    )
}
