//! HTTP routes for authentication
//!
//! - POST /api/auth/register - Create an account and get tokens
//! - POST /api/auth/login    - Authenticate and get tokens
//! - POST /api/auth/refresh  - Exchange a refresh token for a new pair
//! - GET  /api/auth/me       - Get current user info from token

use bson::doc;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, Role, TokenInput};
use crate::db::schemas::{
    SiteSettingsDoc, UserDoc, SITE_SETTINGS_COLLECTION, SITE_SETTINGS_KEY, USER_COLLECTION,
};
use crate::routes::users::{user_to_summary, UserSummary};
use crate::routes::{
    authenticate, error_response, error_to_response, get_jwt_validator, json_response,
    parse_json_body, BoxBody, ErrorResponse,
};
use crate::server::AppState;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub user_type: Role,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Pre-verified users skip onboarding
    #[serde(default)]
    pub pre_verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserSummary,
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /api/auth/* routes
pub async fn handle_auth_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let method = req.method().clone();
    // Remove query string for matching
    let path = req.uri().path().split('?').next().unwrap_or("").to_string();

    match (method, path.as_str()) {
        (Method::POST, "/api/auth/register") => handle_register(req, state).await,
        (Method::POST, "/api/auth/login") => handle_login(req, state).await,
        (Method::POST, "/api/auth/refresh") => handle_refresh(req, state).await,
        (Method::GET, "/api/auth/me") => handle_me(req, state).await,

        (_, "/api/auth/register") | (_, "/api/auth/login") | (_, "/api/auth/refresh")
        | (_, "/api/auth/me") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
        }

        _ => error_response(StatusCode::NOT_FOUND, "Auth endpoint not found", None),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// POST /api/auth/register
///
/// Flow:
/// 1. Validate required fields and password strength
/// 2. Reject when registration is closed in site settings
/// 3. Check if email already exists
/// 4. Hash password with argon2, store the user
/// 5. Generate and return access + refresh tokens
async fn handle_register(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let body: RegisterRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_to_response(e, None),
    };

    if body.name.trim().is_empty() || body.email.trim().is_empty() || body.password.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: name, email, password",
            None,
        );
    }

    if !body.email.contains('@') {
        return error_response(
            StatusCode::BAD_REQUEST,
            "email must be a valid email address",
            Some("INVALID_EMAIL"),
        );
    }

    // Validate password strength (minimum 8 characters)
    if body.password.len() < 8 {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Password must be at least 8 characters",
            Some("WEAK_PASSWORD"),
        );
    }

    let jwt = match get_jwt_validator(&state) {
        Ok(j) => j,
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

    // Registration can be closed site-wide by a regulator
    if let Ok(settings_collection) = mongo
        .collection::<SiteSettingsDoc>(SITE_SETTINGS_COLLECTION)
        .await
    {
        if let Ok(Some(settings)) = settings_collection
            .find_one(doc! { "key": SITE_SETTINGS_KEY })
            .await
        {
            if !settings.registration_open {
                return error_response(
                    StatusCode::FORBIDDEN,
                    "Registration is currently closed",
                    Some("REGISTRATION_CLOSED"),
                );
            }
        }
    }

    let collection = match mongo.collection::<UserDoc>(USER_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            return json_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &ErrorResponse {
                    error: format!("Database error: {}", e),
                    code: Some("DB_ERROR".into()),
                },
            )
        }
    };

    // Check for an existing account with this email
    match collection.find_one(doc! { "identifier": &body.email }).await {
        Ok(Some(_)) => {
            return error_response(
                StatusCode::CONFLICT,
                "An account with this email already exists",
                Some("EMAIL_EXISTS"),
            )
        }
        Ok(None) => {}
        Err(e) => {
            warn!("Error checking existing user: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    }

    let password_hash = match hash_password(&body.password) {
        Ok(h) => h,
        Err(e) => {
            warn!("Password hashing failed: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed",
                Some("HASH_ERROR"),
            );
        }
    };

    let user = UserDoc::new(
        body.name.trim().to_string(),
        body.email.trim().to_lowercase(),
        password_hash,
        body.user_type,
        body.organization,
        body.phone,
        body.pre_verified,
    );

    let user_id = match collection.insert_one(user.clone()).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Error inserting user: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Registration failed",
                Some("DB_ERROR"),
            );
        }
    };

    info!("Registered {} user: {}", user.user_type, user.identifier);

    let mut stored = user;
    stored._id = Some(user_id);

    let input = TokenInput {
        user_id: user_id.to_hex(),
        identifier: stored.identifier.clone(),
        role: stored.user_type,
        token_version: stored.token_version,
    };

    let access_token = match jwt.generate_token(input.clone()) {
        Ok(t) => t,
        Err(e) => return error_to_response(e, Some("TOKEN_ERROR")),
    };
    let refresh_token = match jwt.generate_refresh_token(input) {
        Ok(t) => t,
        Err(e) => return error_to_response(e, Some("TOKEN_ERROR")),
    };

    json_response(
        StatusCode::CREATED,
        &AuthResponse {
            access_token,
            refresh_token,
            user: user_to_summary(&stored),
        },
    )
}

/// POST /api/auth/login
async fn handle_login(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let body: LoginRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_to_response(e, None),
    };

    if body.email.is_empty() || body.password.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Missing required fields: email, password",
            None,
        );
    }

    let jwt = match get_jwt_validator(&state) {
        Ok(j) => j,
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

    // Look up user by email
    let user = match collection
        .find_one(doc! { "identifier": body.email.trim().to_lowercase(), "is_active": true })
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!("Login failed - user not found: {}", body.email);
            // Generic error to prevent user enumeration
            return error_response(
                StatusCode::BAD_REQUEST,
                "Invalid credentials",
                Some("INVALID_CREDENTIALS"),
            );
        }
        Err(e) => {
            warn!("Error finding user: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    // Verify password
    let password_valid = match verify_password(&body.password, &user.password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            warn!("Password verification error: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication error",
                Some("AUTH_ERROR"),
            );
        }
    };

    if !password_valid {
        warn!("Login failed - invalid password: {}", body.email);
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid credentials",
            Some("INVALID_CREDENTIALS"),
        );
    }

    let user_id = match user._id {
        Some(id) => id,
        None => {
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "User record missing id",
                Some("DB_ERROR"),
            )
        }
    };

    info!("Login successful: {}", user.identifier);

    let input = TokenInput {
        user_id: user_id.to_hex(),
        identifier: user.identifier.clone(),
        role: user.user_type,
        token_version: user.token_version,
    };

    let access_token = match jwt.generate_token(input.clone()) {
        Ok(t) => t,
        Err(e) => return error_to_response(e, Some("TOKEN_ERROR")),
    };
    let refresh_token = match jwt.generate_refresh_token(input) {
        Ok(t) => t,
        Err(e) => return error_to_response(e, Some("TOKEN_ERROR")),
    };

    json_response(
        StatusCode::OK,
        &AuthResponse {
            access_token,
            refresh_token,
            user: user_to_summary(&user),
        },
    )
}

/// POST /api/auth/refresh
///
/// Exchanges a valid refresh token for a fresh access/refresh pair. The
/// stored token_version must still match, so a server-side bump revokes
/// refresh tokens too.
async fn handle_refresh(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let body: RefreshRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_to_response(e, None),
    };

    let jwt = match get_jwt_validator(&state) {
        Ok(j) => j,
        Err(resp) => return resp,
    };

    let result = jwt.verify_token(&body.refresh_token);
    if !result.valid {
        return error_response(
            StatusCode::UNAUTHORIZED,
            result.error.as_deref().unwrap_or("Invalid refresh token"),
            Some("INVALID_TOKEN"),
        );
    }
    let claims = result.claims.unwrap();

    let user_id = match bson::oid::ObjectId::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "Invalid token subject",
                Some("INVALID_TOKEN"),
            )
        }
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

    let user = match collection
        .find_one(doc! { "_id": user_id, "is_active": true })
        .await
    {
        Ok(Some(u)) => u,
        Ok(None) => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "User not found or inactive",
                Some("INVALID_TOKEN"),
            )
        }
        Err(e) => {
            warn!("Error loading user for refresh: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    if user.token_version != claims.version {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Token has been revoked",
            Some("TOKEN_REVOKED"),
        );
    }

    let input = TokenInput {
        user_id: user_id.to_hex(),
        identifier: user.identifier.clone(),
        role: user.user_type,
        token_version: user.token_version,
    };

    let access_token = match jwt.generate_token(input.clone()) {
        Ok(t) => t,
        Err(e) => return error_to_response(e, Some("TOKEN_ERROR")),
    };
    let refresh_token = match jwt.generate_refresh_token(input) {
        Ok(t) => t,
        Err(e) => return error_to_response(e, Some("TOKEN_ERROR")),
    };

    json_response(
        StatusCode::OK,
        &AuthResponse {
            access_token,
            refresh_token,
            user: user_to_summary(&user),
        },
    )
}

/// GET /api/auth/me
async fn handle_me(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    json_response(StatusCode::OK, &user_to_summary(&ctx.user))
}
