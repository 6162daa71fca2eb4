//! HTTP routes for sustainability reports
//!
//! - POST /api/reports - Generate a snapshot of the caller's marketplace position
//! - GET  /api/reports - List own reports, newest first

use bson::{doc, oid::ObjectId};
use futures::stream::StreamExt;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use mongodb::options::FindOptions;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use crate::credits::CreditStatus;
use crate::db::schemas::{
    CreditDoc, ReportDoc, ReportTotals, CREDIT_COLLECTION, REPORT_COLLECTION,
};
use crate::routes::{authenticate, error_response, json_response, BoxBody};
use crate::server::AppState;

// =============================================================================
// Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub id: String,
    pub totals: TotalsSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsSummary {
    pub credits_listed: i64,
    pub credits_sold: i64,
    pub credits_owned: i64,
    pub total_amount: f64,
    pub total_carbon_reduction: f64,
    pub total_water_saved: f64,
}

fn report_to_summary(report: &ReportDoc) -> ReportSummary {
    ReportSummary {
        id: report._id.map(|id| id.to_hex()).unwrap_or_default(),
        totals: TotalsSummary {
            credits_listed: report.totals.credits_listed,
            credits_sold: report.totals.credits_sold,
            credits_owned: report.totals.credits_owned,
            total_amount: report.totals.total_amount,
            total_carbon_reduction: report.totals.total_carbon_reduction,
            total_water_saved: report.totals.total_water_saved,
        },
        created_at: report
            .metadata
            .created_at
            .and_then(|d| d.try_to_rfc3339_string().ok()),
    }
}

/// Fold a user's credits (listed or owned) into report totals
pub fn compute_totals(user_id: ObjectId, credits: &[CreditDoc]) -> ReportTotals {
    let mut totals = ReportTotals::default();

    for credit in credits {
        if credit.farmer == user_id {
            totals.credits_listed += 1;
            if credit.status == CreditStatus::Sold {
                totals.credits_sold += 1;
            }
        }
        if credit.owner == Some(user_id) {
            totals.credits_owned += 1;
        }
        totals.total_amount += credit.amount;
        totals.total_carbon_reduction += credit.sustainability_metrics.carbon_reduction;
        totals.total_water_saved += credit.sustainability_metrics.water_saved;
    }

    totals
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /api/reports routes
pub async fn handle_report_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let method = req.method().clone();
    let path = req.uri().path().split('?').next().unwrap_or("").to_string();

    match (method, path.as_str()) {
        (Method::POST, "/api/reports") => handle_generate(req, state).await,
        (Method::GET, "/api/reports") => handle_list(req, state).await,

        (_, "/api/reports") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed", None)
        }

        _ => error_response(StatusCode::NOT_FOUND, "Report endpoint not found", None),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// POST /api/reports - Snapshot the caller's position from the credits collection
async fn handle_generate(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
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

    let credits_collection = match mongo.collection::<CreditDoc>(CREDIT_COLLECTION).await {
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

    let credits = match credits_collection
        .find_many(doc! {
            "$or": [ { "farmer": ctx.user_id }, { "owner": ctx.user_id } ]
        })
        .await
    {
        Ok(list) => list,
        Err(e) => {
            warn!("Error loading credits for report: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let totals = compute_totals(ctx.user_id, &credits);
    let mut report = ReportDoc::new(ctx.user_id, totals);

    let reports_collection = match mongo.collection::<ReportDoc>(REPORT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting reports collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let report_id = match reports_collection.insert_one(report.clone()).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Error inserting report: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to generate report",
                Some("DB_ERROR"),
            );
        }
    };
    report._id = Some(report_id);

    json_response(StatusCode::CREATED, &report_to_summary(&report))
}

/// GET /api/reports - Own reports, newest first
async fn handle_list(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
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

    let collection = match mongo.collection::<ReportDoc>(REPORT_COLLECTION).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting reports collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let options = FindOptions::builder()
        .sort(doc! { "metadata.created_at": -1 })
        .limit(50)
        .build();

    let filter = doc! {
        "user": ctx.user_id,
        "metadata.is_deleted": { "$ne": true },
    };

    let mut cursor = match collection.inner().find(filter).with_options(options).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error listing reports: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let mut reports = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(report) => reports.push(report_to_summary(&report)),
            Err(e) => warn!("Error reading report document: {}", e),
        }
    }

    json_response(StatusCode::OK, &reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credits::{compute_metrics, CreditType, Location, NewCredit};

    fn credit(farmer: ObjectId, owner: Option<ObjectId>, sold: bool, amount: f64) -> CreditDoc {
        let mut doc = NewCredit::validate(
            CreditType::RenewableEnergy,
            amount,
            5.0,
            Location {
                state: "Kerala".into(),
                district: "Idukki".into(),
                coordinates: None,
            },
        )
        .unwrap()
        .into_doc(farmer);
        doc.owner = owner;
        if sold {
            doc.status = CreditStatus::Sold;
        }
        doc
    }

    #[test]
    fn test_totals_split_listed_sold_owned() {
        let farmer = ObjectId::new();
        let buyer = ObjectId::new();

        let credits = vec![
            credit(farmer, None, false, 100.0),
            credit(farmer, Some(buyer), true, 200.0),
        ];

        let farmer_totals = compute_totals(farmer, &credits);
        assert_eq!(farmer_totals.credits_listed, 2);
        assert_eq!(farmer_totals.credits_sold, 1);
        assert_eq!(farmer_totals.credits_owned, 0);
        assert_eq!(farmer_totals.total_amount, 300.0);
        // Renewable Energy: amount * 0.5 * 1.5
        let expected = compute_metrics(CreditType::RenewableEnergy, 100.0).carbon_reduction
            + compute_metrics(CreditType::RenewableEnergy, 200.0).carbon_reduction;
        assert_eq!(farmer_totals.total_carbon_reduction, expected);

        let buyer_totals = compute_totals(buyer, &credits[1..]);
        assert_eq!(buyer_totals.credits_listed, 0);
        assert_eq!(buyer_totals.credits_owned, 1);
        assert_eq!(buyer_totals.total_amount, 200.0);
    }

    #[test]
    fn test_totals_empty() {
        let totals = compute_totals(ObjectId::new(), &[]);
        assert_eq!(totals.credits_listed, 0);
        assert_eq!(totals.total_amount, 0.0);
    }
}
