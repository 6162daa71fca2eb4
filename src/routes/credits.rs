//! HTTP routes for the credit marketplace
//!
//! - GET  /api/credits          - List credits (filtered, paginated, cached)
//! - POST /api/credits          - Create a listing (farmers)
//! - POST /api/credits/buy/:id  - Purchase a credit (industries)
//! - GET  /api/credits/stats    - Aggregated marketplace totals

use bson::{doc, oid::ObjectId, Document};
use futures::stream::StreamExt;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::Role;
use crate::cache::{CreditListKey, CREDIT_PREFIX, CREDIT_STATS_KEY};
use crate::credits::{
    can_purchase, purchase_filter, purchase_update, Coordinates, CreditStatus, CreditType,
    Location, NewCredit,
};
use crate::db::schemas::{AchievementKind, CreditDoc, CREDIT_COLLECTION};
use crate::routes::{
    authenticate, ensure_not_in_maintenance, error_response, error_to_response, json_response,
    parse_json_body, raw_json_response, require_role, AuthContext, BoxBody,
};
use crate::server::AppState;
use crate::types::CanopyError;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCreditRequest {
    pub amount: f64,
    pub price: f64,
    pub credit_type: CreditType,
    pub location: LocationRequest,
}

#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub state: String,
    pub district: String,
    #[serde(default)]
    pub coordinates: Option<CoordinatesRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CoordinatesRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// Credit as rendered on the wire
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditSummary {
    pub id: String,
    pub farmer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub credit_type: CreditType,
    pub amount: f64,
    pub price: f64,
    pub status: CreditStatus,
    pub location: Location,
    pub sustainability_metrics: MetricsSummary,
    pub trading_history: Vec<TradeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub carbon_reduction: f64,
    pub water_saved: f64,
    pub soil_health: f64,
    pub biodiversity_score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSummary {
    pub date: String,
    pub price: f64,
    pub buyer: String,
    pub seller: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

#[derive(Debug, Serialize)]
pub struct CreditListResponse {
    pub credits: Vec<CreditSummary>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResponse {
    pub message: String,
    pub credit: CreditSummary,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreditStats {
    pub total_credits: u64,
    pub available: u64,
    pub sold: u64,
    pub pending: u64,
    pub total_amount: f64,
    pub total_carbon_reduction: f64,
    pub total_water_saved: f64,
}

/// Convert a stored credit to its wire form
pub fn credit_to_summary(credit: &CreditDoc) -> CreditSummary {
    CreditSummary {
        id: credit._id.map(|id| id.to_hex()).unwrap_or_default(),
        farmer: credit.farmer.to_hex(),
        owner: credit.owner.map(|id| id.to_hex()),
        credit_type: credit.credit_type,
        amount: credit.amount,
        price: credit.price,
        status: credit.status,
        location: credit.location.clone(),
        sustainability_metrics: MetricsSummary {
            carbon_reduction: credit.sustainability_metrics.carbon_reduction,
            water_saved: credit.sustainability_metrics.water_saved,
            soil_health: credit.sustainability_metrics.soil_health,
            biodiversity_score: credit.sustainability_metrics.biodiversity_score,
        },
        trading_history: credit
            .trading_history
            .iter()
            .map(|t| TradeSummary {
                date: t.date.try_to_rfc3339_string().unwrap_or_default(),
                price: t.price,
                buyer: t.buyer.to_hex(),
                seller: t.seller.to_hex(),
            })
            .collect(),
        created_at: credit
            .metadata
            .created_at
            .and_then(|d| d.try_to_rfc3339_string().ok()),
    }
}

// =============================================================================
// Listing Query
// =============================================================================

/// Parsed and normalized listing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CreditListQuery {
    pub page: u32,
    pub limit: u32,
    pub status: Option<CreditStatus>,
    pub credit_type: Option<CreditType>,
    pub user_id: Option<ObjectId>,
    pub start_date: Option<bson::DateTime>,
    pub end_date: Option<bson::DateTime>,
}

impl Default for CreditListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            status: None,
            credit_type: None,
            user_id: None,
            start_date: None,
            end_date: None,
        }
    }
}

impl CreditListQuery {
    /// Parse query parameters, rejecting unknown enum values and malformed
    /// ids/dates so bad filters surface as 400 instead of empty results.
    pub fn from_query_string(query: Option<&str>) -> Result<Self, CanopyError> {
        let mut params = Self::default();

        let Some(q) = query else {
            return Ok(params);
        };

        for pair in q.split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = urlencoding::decode(value).unwrap_or_default();
            if value.is_empty() {
                continue;
            }
            match key {
                "page" => params.page = value.parse().unwrap_or(1).max(1),
                "limit" => params.limit = value.parse::<u32>().unwrap_or(20).clamp(1, 100),
                "status" => {
                    params.status = Some(CreditStatus::parse(&value).ok_or_else(|| {
                        CanopyError::Validation(format!("Unknown status: {}", value))
                    })?)
                }
                "type" => {
                    params.credit_type = Some(CreditType::parse(&value).ok_or_else(|| {
                        CanopyError::Validation(format!("Unknown credit type: {}", value))
                    })?)
                }
                "userId" | "user_id" => {
                    params.user_id = Some(ObjectId::parse_str(value.as_ref()).map_err(|_| {
                        CanopyError::Validation(format!("Invalid userId: {}", value))
                    })?)
                }
                "startDate" | "start_date" => {
                    params.start_date = Some(parse_date(&value).ok_or_else(|| {
                        CanopyError::Validation(format!("Invalid startDate: {}", value))
                    })?)
                }
                "endDate" | "end_date" => {
                    params.end_date = Some(parse_date(&value).ok_or_else(|| {
                        CanopyError::Validation(format!("Invalid endDate: {}", value))
                    })?)
                }
                _ => {}
            }
        }

        Ok(params)
    }

    /// Derive the cache identity from the full normalized parameter set
    pub fn cache_key(&self) -> CreditListKey {
        CreditListKey {
            page: self.page,
            limit: self.limit,
            status: self.status.map(|s| s.to_string()),
            credit_type: self.credit_type.map(|t| t.to_string()),
            user_id: self.user_id.map(|id| id.to_hex()),
            start_date: self
                .start_date
                .map(|d| d.timestamp_millis().to_string()),
            end_date: self.end_date.map(|d| d.timestamp_millis().to_string()),
        }
    }

    /// Build the MongoDB filter for this query
    pub fn to_filter(&self) -> Document {
        let mut filter = doc! {};

        if let Some(status) = self.status {
            filter.insert("status", status.as_str());
        }
        if let Some(credit_type) = self.credit_type {
            filter.insert("credit_type", credit_type.to_string());
        }
        if let Some(user_id) = self.user_id {
            // Matches credits the user listed or now owns
            filter.insert(
                "$or",
                vec![doc! { "farmer": user_id }, doc! { "owner": user_id }],
            );
        }

        let mut range = doc! {};
        if let Some(start) = self.start_date {
            range.insert("$gte", start);
        }
        if let Some(end) = self.end_date {
            range.insert("$lte", end);
        }
        if !range.is_empty() {
            filter.insert("metadata.created_at", range);
        }

        filter
    }
}

fn parse_date(value: &str) -> Option<bson::DateTime> {
    use chrono::{DateTime, NaiveDate, Utc};

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(bson::DateTime::from_chrono(dt.with_timezone(&Utc)));
    }

    // Plain dates are taken as UTC midnight
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let dt = date.and_hms_opt(0, 0, 0)?.and_utc();
    Some(bson::DateTime::from_chrono(dt))
}

/// Total page count for a result set: ceil(total / limit)
pub fn total_pages(total: u64, limit: u32) -> u32 {
    if limit == 0 {
        return 0;
    }
    total.div_ceil(limit as u64) as u32
}

/// Clamp a requested page so the returned page never exceeds the page count
pub fn clamp_page(page: u32, total_pages: u32) -> u32 {
    page.max(1).min(total_pages.max(1))
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /api/credits* routes
pub async fn handle_credit_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let method = req.method().clone();
    let path = req.uri().path().split('?').next().unwrap_or("").to_string();

    match (method, path.as_str()) {
        (Method::GET, "/api/credits") => handle_list(req, state).await,
        (Method::POST, "/api/credits") => handle_create(req, state).await,
        (Method::GET, "/api/credits/stats") => handle_stats(req, state).await,
        (Method::POST, p) if p.starts_with("/api/credits/buy/") => {
            let id = p.strip_prefix("/api/credits/buy/").unwrap_or("");
            handle_buy(req, state, id.to_string()).await
        }

        (_, "/api/credits") | (_, "/api/credits/stats") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
        }

        _ => error_response(StatusCode::NOT_FOUND, "Credit endpoint not found", None),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /api/credits - List credits, cache-aside on the normalized query
async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    if let Err(resp) = authenticate(&req, &state).await {
        return resp;
    }

    let query = match CreditListQuery::from_query_string(req.uri().query()) {
        Ok(q) => q,
        Err(e) => return error_to_response(e, Some("INVALID_QUERY")),
    };

    let storage_key = query.cache_key().to_storage_key();
    if let Some(entry) = state.cache.get(&storage_key) {
        return raw_json_response(StatusCode::OK, entry.data);
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

    let collection = match mongo.collection::<CreditDoc>(CREDIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting credits collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let mut filter = query.to_filter();
    filter.insert("metadata.is_deleted", doc! { "$ne": true });

    let total = match collection.inner().count_documents(filter.clone()).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error counting credits: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let pages = total_pages(total, query.limit);
    let page = clamp_page(query.page, pages);
    let skip = ((page - 1) * query.limit) as u64;

    let options = FindOptions::builder()
        .sort(doc! { "metadata.created_at": -1 })
        .skip(skip)
        .limit(query.limit as i64)
        .build();

    let mut cursor = match collection.inner().find(filter).with_options(options).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error finding credits: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let mut credits = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(credit) => credits.push(credit_to_summary(&credit)),
            Err(e) => warn!("Error reading credit document: {}", e),
        }
    }

    let response = CreditListResponse {
        credits,
        pagination: Pagination {
            page,
            limit: query.limit,
            total,
            total_pages: pages,
        },
    };

    let body = match serde_json::to_vec(&response) {
        Ok(b) => b,
        Err(e) => {
            warn!("Error serializing credit list: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Serialization error",
                None,
            );
        }
    };

    state
        .cache
        .set(&storage_key, body.clone(), state.cache.config().list_ttl);

    raw_json_response(StatusCode::OK, body)
}

/// POST /api/credits - Create a listing (farmers only)
async fn handle_create(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require_role(&ctx, &[Role::Farmer]) {
        return resp;
    }
    if let Err(resp) = ensure_not_in_maintenance(&state).await {
        return resp;
    }

    let body: CreateCreditRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_to_response(e, None),
    };

    let location = Location {
        state: body.location.state.trim().to_string(),
        district: body.location.district.trim().to_string(),
        coordinates: body.location.coordinates.map(|c| Coordinates {
            latitude: c.latitude,
            longitude: c.longitude,
        }),
    };

    let new_credit =
        match NewCredit::validate(body.credit_type, body.amount, body.price, location) {
            Ok(c) => c,
            Err(e) => return error_to_response(e, Some("VALIDATION_ERROR")),
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

    let collection = match mongo.collection::<CreditDoc>(CREDIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting credits collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let mut credit = new_credit.into_doc(ctx.user_id);
    let credit_id = match collection.insert_one(credit.clone()).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Error inserting credit: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create credit",
                Some("DB_ERROR"),
            );
        }
    };
    credit._id = Some(credit_id);

    info!(
        "Credit listed: {} {} x{} by {}",
        credit_id, credit.credit_type, credit.amount, ctx.claims.identifier
    );

    // New listing changes every cached credit view
    state.cache.invalidate_pattern(CREDIT_PREFIX);

    json_response(StatusCode::CREATED, &credit_to_summary(&credit))
}

/// POST /api/credits/buy/:id - Purchase a credit (industries only)
///
/// The status check and the write are one conditional update: the filter
/// matches only while status is Available, so of two concurrent buyers
/// exactly one succeeds and the other observes a lost race.
async fn handle_buy(
    req: Request<Incoming>,
    state: Arc<AppState>,
    id: String,
) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    if let Err(resp) = require_role(&ctx, &[Role::Industry]) {
        return resp;
    }
    if let Err(resp) = ensure_not_in_maintenance(&state).await {
        return resp;
    }

    let credit_id = match ObjectId::parse_str(&id) {
        Ok(id) => id,
        Err(_) => {
            return error_response(StatusCode::BAD_REQUEST, "Invalid credit id", None)
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

    let collection = match mongo.collection::<CreditDoc>(CREDIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting credits collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let credit = match collection.find_one(doc! { "_id": credit_id }).await {
        Ok(Some(c)) => c,
        Ok(None) => {
            return error_response(StatusCode::NOT_FOUND, "Credit not found", Some("NOT_FOUND"))
        }
        Err(e) => {
            warn!("Error loading credit: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    if let Err(e) = can_purchase(&credit, ctx.user_id) {
        return error_to_response(e, Some("INVALID_STATE"));
    }

    // Atomic check-then-set: only matches while still Available
    let updated = match collection
        .find_one_and_update(
            purchase_filter(credit_id),
            purchase_update(ctx.user_id, credit.farmer, credit.price),
        )
        .await
    {
        Ok(Some(c)) => c,
        Ok(None) => {
            // Another buyer won the race between our read and this update
            return error_response(
                StatusCode::BAD_REQUEST,
                "Credit is not available for purchase",
                Some("INVALID_STATE"),
            );
        }
        Err(e) => {
            warn!("Error purchasing credit: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    info!(
        "Credit purchased: {} by {} for {}",
        credit_id, ctx.claims.identifier, credit.price
    );

    state.cache.invalidate_pattern(CREDIT_PREFIX);

    state
        .activity
        .record(
            ctx.user_id,
            "credit.purchase",
            doc! {
                "credit": credit_id,
                "price": credit.price,
                "seller": credit.farmer,
            },
        )
        .await;

    // Gamification side channel; a ledger failure aborts the request (the
    // purchase itself is already committed - no rollback)
    if let Err(e) = record_purchase_achievement(&state, &ctx).await {
        warn!("Achievement update failed after purchase: {}", e);
        return error_to_response(e, Some("LEDGER_ERROR"));
    }

    json_response(
        StatusCode::OK,
        &PurchaseResponse {
            message: "Credit purchased successfully".into(),
            credit: credit_to_summary(&updated),
        },
    )
}

/// Advance the buyer's purchase badge, mirroring to the simulated ledger
async fn record_purchase_achievement(
    state: &AppState,
    ctx: &AuthContext,
) -> Result<(), CanopyError> {
    crate::routes::gamification::advance_achievement(
        state,
        ctx.user_id,
        AchievementKind::Badge,
        "Carbon Buyer",
        "Purchase carbon credits on the marketplace",
    )
    .await
    .map(|_| ())
}

/// GET /api/credits/stats - Aggregated totals, cache-aside
async fn handle_stats(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    if let Err(resp) = authenticate(&req, &state).await {
        return resp;
    }

    if let Some(entry) = state.cache.get(CREDIT_STATS_KEY) {
        return raw_json_response(StatusCode::OK, entry.data);
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

    let collection = match mongo.collection::<CreditDoc>(CREDIT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting credits collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let pipeline = vec![
        doc! { "$match": { "metadata.is_deleted": { "$ne": true } } },
        doc! { "$group": {
            "_id": "$status",
            "count": { "$sum": 1 },
            "amount": { "$sum": "$amount" },
            "carbon_reduction": { "$sum": "$sustainability_metrics.carbon_reduction" },
            "water_saved": { "$sum": "$sustainability_metrics.water_saved" },
        }},
    ];

    let mut cursor = match collection.inner().aggregate(pipeline).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error aggregating credit stats: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let mut stats = CreditStats::default();
    while let Some(result) = cursor.next().await {
        let group = match result {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Error reading stats group: {}", e);
                continue;
            }
        };

        let count = group
            .get_i64("count")
            .ok()
            .or_else(|| group.get_i32("count").ok().map(|c| c as i64))
            .unwrap_or(0) as u64;
        stats.total_credits += count;
        stats.total_amount += group.get_f64("amount").unwrap_or(0.0);
        stats.total_carbon_reduction += group.get_f64("carbon_reduction").unwrap_or(0.0);
        stats.total_water_saved += group.get_f64("water_saved").unwrap_or(0.0);

        match group.get_str("_id") {
            Ok("Available") => stats.available += count,
            Ok("Sold") => stats.sold += count,
            Ok("Pending") => stats.pending += count,
            _ => {}
        }
    }

    let body = match serde_json::to_vec(&stats) {
        Ok(b) => b,
        Err(e) => {
            warn!("Error serializing stats: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Serialization error",
                None,
            );
        }
    };

    state
        .cache
        .set(CREDIT_STATS_KEY, body.clone(), state.cache.config().list_ttl);

    raw_json_response(StatusCode::OK, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_is_ceiling() {
        assert_eq!(total_pages(0, 20), 0);
        assert_eq!(total_pages(1, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(100, 20), 5);
        assert_eq!(total_pages(101, 20), 6);
    }

    #[test]
    fn test_clamp_page_never_exceeds_total() {
        assert_eq!(clamp_page(1, 5), 1);
        assert_eq!(clamp_page(5, 5), 5);
        assert_eq!(clamp_page(9, 5), 5);
        // Page floor is 1 even with no results
        assert_eq!(clamp_page(3, 0), 1);
        assert_eq!(clamp_page(0, 5), 1);
    }

    #[test]
    fn test_query_defaults() {
        let q = CreditListQuery::from_query_string(None).unwrap();
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, 20);
        assert!(q.status.is_none());
        assert!(q.credit_type.is_none());
    }

    #[test]
    fn test_query_parsing() {
        let q = CreditListQuery::from_query_string(Some(
            "page=3&limit=50&status=Available&type=Soil%20Carbon",
        ))
        .unwrap();
        assert_eq!(q.page, 3);
        assert_eq!(q.limit, 50);
        assert_eq!(q.status, Some(CreditStatus::Available));
        assert_eq!(q.credit_type, Some(CreditType::SoilCarbon));
    }

    #[test]
    fn test_query_rejects_unknown_enum_values() {
        assert!(CreditListQuery::from_query_string(Some("status=Retired")).is_err());
        assert!(CreditListQuery::from_query_string(Some("type=Wind")).is_err());
        assert!(CreditListQuery::from_query_string(Some("userId=nothex")).is_err());
        assert!(CreditListQuery::from_query_string(Some("startDate=yesterday")).is_err());
    }

    #[test]
    fn test_query_limit_clamped() {
        let q = CreditListQuery::from_query_string(Some("limit=1000")).unwrap();
        assert_eq!(q.limit, 100);
        let q = CreditListQuery::from_query_string(Some("limit=0")).unwrap();
        assert_eq!(q.limit, 1);
    }

    #[test]
    fn test_cache_key_reflects_every_parameter() {
        let base = CreditListQuery::from_query_string(Some("page=1&limit=20"))
            .unwrap()
            .cache_key();
        let filtered = CreditListQuery::from_query_string(Some("page=1&limit=20&status=Sold"))
            .unwrap()
            .cache_key();
        let paged = CreditListQuery::from_query_string(Some("page=2&limit=20"))
            .unwrap()
            .cache_key();
        let dated =
            CreditListQuery::from_query_string(Some("page=1&limit=20&startDate=2026-01-01"))
                .unwrap()
                .cache_key();

        assert_ne!(base.to_storage_key(), filtered.to_storage_key());
        assert_ne!(base.to_storage_key(), paged.to_storage_key());
        assert_ne!(base.to_storage_key(), dated.to_storage_key());
    }

    #[test]
    fn test_cache_key_ignores_parameter_order() {
        let a = CreditListQuery::from_query_string(Some("status=Available&page=2&limit=10"))
            .unwrap()
            .cache_key();
        let b = CreditListQuery::from_query_string(Some("limit=10&page=2&status=Available"))
            .unwrap()
            .cache_key();
        assert_eq!(a.to_storage_key(), b.to_storage_key());
    }

    #[test]
    fn test_filter_shape() {
        let user = ObjectId::new();
        let q = CreditListQuery {
            status: Some(CreditStatus::Available),
            credit_type: Some(CreditType::Agroforestry),
            user_id: Some(user),
            ..Default::default()
        };
        let filter = q.to_filter();
        assert_eq!(filter.get_str("status").unwrap(), "Available");
        assert_eq!(filter.get_str("credit_type").unwrap(), "Agroforestry");
        assert!(filter.get_array("$or").is_ok());
    }

    #[test]
    fn test_date_parsing() {
        assert!(parse_date("2026-01-15").is_some());
        assert!(parse_date("2026-01-15T10:30:00Z").is_some());
        assert!(parse_date("January").is_none());

        let midnight = parse_date("2026-01-15").unwrap();
        let explicit = parse_date("2026-01-15T00:00:00Z").unwrap();
        assert_eq!(midnight, explicit);
    }
}
