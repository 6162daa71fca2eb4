//! HTTP routes for Canopy
//!
//! Shared response helpers and the authentication/authorization guards used
//! by every handler. Guards fail closed: a missing or invalid token is 401,
//! a role outside the operation's allow-list is 403. `require_role` takes the
//! context produced by `authenticate`, so a handler cannot check roles
//! without having authenticated first.

pub mod admin;
pub mod auth_routes;
pub mod credits;
pub mod gamification;
pub mod health;
pub mod reports;
pub mod users;

pub use admin::handle_admin_request;
pub use auth_routes::handle_auth_request;
pub use credits::handle_credit_request;
pub use gamification::handle_gamification_request;
pub use health::{health_check, version_info};
pub use reports::handle_report_request;
pub use users::handle_user_request;

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::{extract_token_from_header, Claims, JwtValidator, Role};
use crate::db::schemas::{UserDoc, USER_COLLECTION};
use crate::server::AppState;
use crate::types::CanopyError;

pub(crate) type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Standard error payload
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Standard success payload for operations without a richer body
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

// =============================================================================
// Response Helpers
// =============================================================================

pub(crate) fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn empty_body() -> BoxBody {
    Full::new(Bytes::new())
        .map_err(|never| match never {})
        .boxed()
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<BoxBody> {
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(json))
        .unwrap()
}

/// Respond with pre-serialized JSON bytes (cache hits)
pub(crate) fn raw_json_response(status: StatusCode, body: Vec<u8>) -> Response<BoxBody> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .body(full_body(body))
        .unwrap()
}

pub(crate) fn error_response(
    status: StatusCode,
    error: &str,
    code: Option<&str>,
) -> Response<BoxBody> {
    json_response(
        status,
        &ErrorResponse {
            error: error.to_string(),
            code: code.map(|c| c.to_string()),
        },
    )
}

/// Map a domain error to its HTTP response
pub(crate) fn error_to_response(err: CanopyError, code: Option<&str>) -> Response<BoxBody> {
    let (status, body) = err.into_status_code_and_body();
    error_response(status, &body, code)
}

pub(crate) fn cors_preflight() -> Response<BoxBody> {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS")
        .header("Access-Control-Allow-Headers", "Content-Type, Authorization")
        .header("Access-Control-Max-Age", "86400")
        .body(empty_body())
        .unwrap()
}

pub(crate) async fn parse_json_body<T: for<'de> Deserialize<'de>>(
    req: Request<Incoming>,
) -> Result<T, CanopyError> {
    let body = req
        .collect()
        .await
        .map_err(|e| CanopyError::Http(format!("Failed to read body: {}", e)))?;

    let bytes = body.to_bytes();
    if bytes.len() > 65536 {
        return Err(CanopyError::Http("Request body too large".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| CanopyError::Validation(format!("Invalid JSON: {}", e)))
}

pub(crate) fn get_auth_header(req: &Request<Incoming>) -> Option<&str> {
    req.headers()
        .get(hyper::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

// =============================================================================
// Auth Guards
// =============================================================================

/// Authenticated request context: verified claims plus the loaded user
pub struct AuthContext {
    pub claims: Claims,
    pub user: UserDoc,
    pub user_id: ObjectId,
}

#[allow(clippy::result_large_err)]
pub(crate) fn get_jwt_validator(state: &AppState) -> Result<JwtValidator, Response<BoxBody>> {
    if state.args.dev_mode {
        Ok(JwtValidator::new_dev())
    } else {
        match &state.args.jwt_secret {
            Some(secret) => JwtValidator::new(secret.clone(), state.args.jwt_expiry_seconds)
                .map_err(|e| {
                    error_response(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        &format!("JWT config error: {e}"),
                        Some("JWT_CONFIG_ERROR"),
                    )
                }),
            None => Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "JWT secret not configured",
                Some("JWT_CONFIG_ERROR"),
            )),
        }
    }
}

/// Verify the bearer token and load the user it names.
///
/// Fails closed: missing/invalid/expired tokens, revoked token versions,
/// and inactive or deleted users all yield 401.
pub(crate) async fn authenticate(
    req: &Request<Incoming>,
    state: &AppState,
) -> Result<AuthContext, Response<BoxBody>> {
    let auth_header = get_auth_header(req);
    let token = match extract_token_from_header(auth_header) {
        Some(t) => t,
        None => {
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                "No token provided",
                Some("NO_TOKEN"),
            ))
        }
    };

    let jwt = get_jwt_validator(state)?;
    let result = jwt.verify_token(token);

    if !result.valid {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            result.error.as_deref().unwrap_or("Invalid token"),
            Some("INVALID_TOKEN"),
        ));
    }

    let claims = result.claims.unwrap();

    let user_id = match ObjectId::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                "Invalid token subject",
                Some("INVALID_TOKEN"),
            ))
        }
    };

    let mongo = match &state.mongo {
        Some(m) => m,
        None => {
            return Err(error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Database not available",
                Some("DB_UNAVAILABLE"),
            ))
        }
    };

    let collection = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting users collection: {}", e);
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            ));
        }
    };

    let user = match collection
        .find_one(doc! { "_id": user_id, "is_active": true })
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            return Err(error_response(
                StatusCode::UNAUTHORIZED,
                "User not found or inactive",
                Some("INVALID_TOKEN"),
            ))
        }
        Err(e) => {
            warn!("Error loading user for auth: {}", e);
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            ));
        }
    };

    if user.token_version != claims.version {
        return Err(error_response(
            StatusCode::UNAUTHORIZED,
            "Token has been revoked",
            Some("TOKEN_REVOKED"),
        ));
    }

    Ok(AuthContext {
        claims,
        user,
        user_id,
    })
}

/// Reject mutating marketplace operations while maintenance mode is on.
/// A missing settings document means maintenance is off.
pub(crate) async fn ensure_not_in_maintenance(
    state: &AppState,
) -> Result<(), Response<BoxBody>> {
    use crate::db::schemas::{SiteSettingsDoc, SITE_SETTINGS_COLLECTION, SITE_SETTINGS_KEY};

    let Some(ref mongo) = state.mongo else {
        return Ok(());
    };

    let collection = match mongo
        .collection::<SiteSettingsDoc>(SITE_SETTINGS_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting settings collection: {}", e);
            return Ok(());
        }
    };

    match collection.find_one(doc! { "key": SITE_SETTINGS_KEY }).await {
        Ok(Some(settings)) if settings.maintenance_mode => Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Marketplace is under maintenance",
            Some("MAINTENANCE"),
        )),
        _ => Ok(()),
    }
}

/// Reject with 403 unless the authenticated role is in the allow-list
#[allow(clippy::result_large_err)]
pub(crate) fn require_role(
    ctx: &AuthContext,
    allowed: &[Role],
) -> Result<(), Response<BoxBody>> {
    if ctx.user.user_type.is_allowed(allowed) {
        Ok(())
    } else {
        let roles: Vec<String> = allowed.iter().map(|r| r.to_string()).collect();
        Err(error_response(
            StatusCode::FORBIDDEN,
            &format!("Requires role: {}", roles.join(" or ")),
            Some("FORBIDDEN"),
        ))
    }
}
