//! HTTP routes for gamification
//!
//! - GET  /api/gamification/leaderboard   - Users ranked by points
//! - GET  /api/gamification/achievements  - Own achievements
//! - POST /api/gamification/actions       - Record a qualifying action
//!
//! The first qualifying action creates an achievement (mirrored to the
//! ledger); each subsequent matching action advances its counter.

use bson::{doc, oid::ObjectId};
use futures::stream::StreamExt;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::db::schemas::{AchievementDoc, AchievementKind, ACHIEVEMENT_COLLECTION, USER_COLLECTION};
use crate::routes::{
    authenticate, error_response, error_to_response, json_response, parse_json_body, BoxBody,
};
use crate::server::AppState;
use crate::types::CanopyError;

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementSummary {
    pub id: String,
    pub kind: AchievementKind,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_count: Option<i64>,
    pub points: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_ref: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user: String,
    pub name: String,
    pub points: i64,
}

fn achievement_to_summary(a: &AchievementDoc) -> AchievementSummary {
    AchievementSummary {
        id: a._id.map(|id| id.to_hex()).unwrap_or_default(),
        kind: a.kind,
        title: a.title.clone(),
        description: a.description.clone(),
        progress: a.progress,
        streak_count: a.streak_count,
        referral_count: a.referral_count,
        points: a.points,
        ledger_ref: a.ledger_ref.clone(),
    }
}

/// Qualifying actions and the achievement each one drives
fn achievement_for_action(action: &str) -> Option<(AchievementKind, &'static str, &'static str)> {
    match action {
        "credit_listed" => Some((
            AchievementKind::Badge,
            "Green Lister",
            "List carbon credits on the marketplace",
        )),
        "credit_purchased" => Some((
            AchievementKind::Badge,
            "Carbon Buyer",
            "Purchase carbon credits on the marketplace",
        )),
        "daily_login" => Some((
            AchievementKind::Streak,
            "Daily Streak",
            "Sign in on consecutive days",
        )),
        "referral" => Some((
            AchievementKind::Referral,
            "Community Builder",
            "Refer new members to the marketplace",
        )),
        "challenge_progress" => Some((
            AchievementKind::Challenge,
            "Sustainability Challenge",
            "Work through the seasonal sustainability challenge",
        )),
        _ => None,
    }
}

// =============================================================================
// Shared Achievement Logic
// =============================================================================

/// Create or advance an achievement for one qualifying action, mirroring the
/// change to the simulated ledger. Errors propagate to the caller, which
/// aborts the triggering request (no rollback of prior writes).
pub(crate) async fn advance_achievement(
    state: &AppState,
    user_id: ObjectId,
    kind: AchievementKind,
    title: &str,
    description: &str,
) -> Result<AchievementDoc, CanopyError> {
    let mongo = state
        .mongo
        .as_ref()
        .ok_or_else(|| CanopyError::Database("Database not available".into()))?;

    let collection = mongo
        .collection::<AchievementDoc>(ACHIEVEMENT_COLLECTION)
        .await?;

    let kind_bson = bson::to_bson(&kind)
        .map_err(|e| CanopyError::Internal(format!("Unserializable kind: {}", e)))?;
    let filter = doc! { "user": user_id, "kind": kind_bson, "title": title };

    match collection.find_one(filter.clone()).await? {
        Some(mut achievement) => {
            achievement.advance();
            state
                .ledger
                .update_achievement(&serde_json::json!({
                    "user": user_id.to_hex(),
                    "title": title,
                    "progress": achievement.progress,
                    "streakCount": achievement.streak_count,
                    "referralCount": achievement.referral_count,
                    "points": achievement.points,
                }))
                .await?;
            collection
                .update_one(
                    filter,
                    doc! { "$set": {
                        "progress": achievement.progress,
                        "streak_count": achievement.streak_count,
                        "referral_count": achievement.referral_count,
                        "points": achievement.points,
                        "metadata.updated_at": bson::DateTime::now(),
                    }},
                )
                .await?;
            Ok(achievement)
        }
        None => {
            let mut achievement =
                AchievementDoc::new(user_id, kind, title.to_string(), description.to_string());
            let receipt = state
                .ledger
                .create_achievement(&serde_json::json!({
                    "user": user_id.to_hex(),
                    "title": title,
                    "kind": kind,
                }))
                .await?;
            achievement.ledger_ref = Some(receipt.tx_id);
            let id = collection.insert_one(achievement.clone()).await?;
            achievement._id = Some(id);
            Ok(achievement)
        }
    }
}

// =============================================================================
// Route Handler
// =============================================================================

/// Main handler for /api/gamification/* routes
pub async fn handle_gamification_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<BoxBody> {
    let method = req.method().clone();
    let path = req.uri().path().split('?').next().unwrap_or("").to_string();

    match (method, path.as_str()) {
        (Method::GET, "/api/gamification/leaderboard") => handle_leaderboard(req, state).await,
        (Method::GET, "/api/gamification/achievements") => handle_achievements(req, state).await,
        (Method::POST, "/api/gamification/actions") => handle_action(req, state).await,

        _ => error_response(
            StatusCode::NOT_FOUND,
            "Gamification endpoint not found",
            None,
        ),
    }
}

// =============================================================================
// Endpoint Handlers
// =============================================================================

/// GET /api/gamification/leaderboard?limit - Users ranked by total points
async fn handle_leaderboard(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    if let Err(resp) = authenticate(&req, &state).await {
        return resp;
    }

    let limit: i64 = req
        .uri()
        .query()
        .and_then(|q| {
            q.split('&')
                .find_map(|pair| pair.strip_prefix("limit="))
                .and_then(|v| v.parse().ok())
        })
        .unwrap_or(10);
    let limit = limit.clamp(1, 100);

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
        .collection::<AchievementDoc>(ACHIEVEMENT_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting achievements collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let pipeline = vec![
        doc! { "$match": { "metadata.is_deleted": { "$ne": true } } },
        doc! { "$group": { "_id": "$user", "points": { "$sum": "$points" } } },
        doc! { "$sort": { "points": -1, "_id": 1 } },
        doc! { "$limit": limit },
        doc! { "$lookup": {
            "from": USER_COLLECTION,
            "localField": "_id",
            "foreignField": "_id",
            "as": "user_doc",
        }},
        doc! { "$unwind": { "path": "$user_doc", "preserveNullAndEmptyArrays": true } },
    ];

    let mut cursor = match collection.inner().aggregate(pipeline).await {
        Ok(c) => c,
        Err(e) => {
            warn!("Error aggregating leaderboard: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let mut entries = Vec::new();
    while let Some(result) = cursor.next().await {
        let group = match result {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Error reading leaderboard row: {}", e);
                continue;
            }
        };

        let user = group
            .get_object_id("_id")
            .map(|id| id.to_hex())
            .unwrap_or_default();
        let name = group
            .get_document("user_doc")
            .ok()
            .and_then(|u| u.get_str("name").ok())
            .unwrap_or("Unknown")
            .to_string();
        let points = group
            .get_i64("points")
            .or_else(|_| group.get_i32("points").map(|p| p as i64))
            .unwrap_or(0);

        entries.push(LeaderboardEntry {
            rank: entries.len() as u32 + 1,
            user,
            name,
            points,
        });
    }

    json_response(StatusCode::OK, &entries)
}

/// GET /api/gamification/achievements - Own achievements
async fn handle_achievements(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
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

    let collection = match mongo
        .collection::<AchievementDoc>(ACHIEVEMENT_COLLECTION)
        .await
    {
        Ok(c) => c,
        Err(e) => {
            warn!("Error getting achievements collection: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let achievements = match collection.find_many(doc! { "user": ctx.user_id }).await {
        Ok(list) => list,
        Err(e) => {
            warn!("Error listing achievements: {}", e);
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some("DB_ERROR"),
            );
        }
    };

    let summaries: Vec<AchievementSummary> =
        achievements.iter().map(achievement_to_summary).collect();

    json_response(StatusCode::OK, &summaries)
}

/// POST /api/gamification/actions - Record a qualifying action
async fn handle_action(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let ctx = match authenticate(&req, &state).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let body: ActionRequest = match parse_json_body(req).await {
        Ok(b) => b,
        Err(e) => return error_to_response(e, None),
    };

    let Some((kind, title, description)) = achievement_for_action(&body.action) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &format!("Unknown action: {}", body.action),
            Some("UNKNOWN_ACTION"),
        );
    };

    match advance_achievement(&state, ctx.user_id, kind, title, description).await {
        Ok(achievement) => json_response(StatusCode::OK, &achievement_to_summary(&achievement)),
        Err(e) => {
            warn!("Error recording action '{}': {}", body.action, e);
            error_to_response(e, None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_actions_map_to_achievements() {
        let (kind, title, _) = achievement_for_action("credit_purchased").unwrap();
        assert_eq!(kind, AchievementKind::Badge);
        assert_eq!(title, "Carbon Buyer");

        let (kind, _, _) = achievement_for_action("daily_login").unwrap();
        assert_eq!(kind, AchievementKind::Streak);

        let (kind, _, _) = achievement_for_action("referral").unwrap();
        assert_eq!(kind, AchievementKind::Referral);

        let (kind, _, _) = achievement_for_action("challenge_progress").unwrap();
        assert_eq!(kind, AchievementKind::Challenge);
    }

    #[test]
    fn test_unknown_actions_rejected() {
        assert!(achievement_for_action("hack_the_planet").is_none());
        assert!(achievement_for_action("").is_none());
    }
}
