//! Achievement document schema
//!
//! Gamification records, polymorphic over kind: badges and challenges carry
//! percentage progress, streaks a consecutive-day counter, referrals a
//! referral counter. Created on the first qualifying action, advanced on
//! each subsequent matching action.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for achievements
pub const ACHIEVEMENT_COLLECTION: &str = "achievements";

/// Achievement variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum AchievementKind {
    #[default]
    Badge,
    Challenge,
    Streak,
    Referral,
}

/// Achievement document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct AchievementDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Owning user
    pub user: ObjectId,

    /// Variant
    pub kind: AchievementKind,

    /// Achievement title (unique per user and kind)
    pub title: String,

    /// Human-readable description
    pub description: String,

    /// Completion percentage, badges and challenges only (0-100)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<i32>,

    /// Consecutive-action counter, streaks only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak_count: Option<i64>,

    /// Referral counter, referrals only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referral_count: Option<i64>,

    /// Leaderboard points accrued by this achievement
    #[serde(default)]
    pub points: i64,

    /// Transaction id returned by the ledger side channel
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_ref: Option<String>,
}

/// Points granted per qualifying action, by kind
fn points_per_action(kind: AchievementKind) -> i64 {
    match kind {
        AchievementKind::Badge => 10,
        AchievementKind::Challenge => 25,
        AchievementKind::Streak => 5,
        AchievementKind::Referral => 50,
    }
}

impl AchievementDoc {
    /// Create the achievement for a user's first qualifying action
    pub fn new(user: ObjectId, kind: AchievementKind, title: String, description: String) -> Self {
        let mut doc = Self {
            _id: None,
            metadata: Metadata::new(),
            user,
            kind,
            title,
            description,
            progress: None,
            streak_count: None,
            referral_count: None,
            points: 0,
            ledger_ref: None,
        };
        doc.advance();
        doc
    }

    /// Advance the variant-specific counter for one qualifying action
    pub fn advance(&mut self) {
        match self.kind {
            AchievementKind::Badge | AchievementKind::Challenge => {
                let next = self.progress.unwrap_or(0).saturating_add(10).min(100);
                self.progress = Some(next);
            }
            AchievementKind::Streak => {
                self.streak_count = Some(self.streak_count.unwrap_or(0) + 1);
            }
            AchievementKind::Referral => {
                self.referral_count = Some(self.referral_count.unwrap_or(0) + 1);
            }
        }
        self.points += points_per_action(self.kind);
    }

    /// Whether the achievement has reached its terminal state
    pub fn is_complete(&self) -> bool {
        match self.kind {
            AchievementKind::Badge | AchievementKind::Challenge => self.progress == Some(100),
            // Counters are open-ended
            AchievementKind::Streak | AchievementKind::Referral => false,
        }
    }
}

impl IntoIndexes for AchievementDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // One achievement per (user, kind, title)
            (
                doc! { "user": 1, "kind": 1, "title": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("user_kind_title_unique".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for AchievementDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badge_progress_advances_and_caps() {
        let mut badge = AchievementDoc::new(
            ObjectId::new(),
            AchievementKind::Badge,
            "First Purchase".into(),
            "Buy a carbon credit".into(),
        );
        assert_eq!(badge.progress, Some(10));
        assert_eq!(badge.points, 10);

        for _ in 0..20 {
            badge.advance();
        }
        // Progress caps at 100; points keep accruing
        assert_eq!(badge.progress, Some(100));
        assert!(badge.is_complete());
        assert_eq!(badge.points, 210);
    }

    #[test]
    fn test_streak_counts_actions() {
        let mut streak = AchievementDoc::new(
            ObjectId::new(),
            AchievementKind::Streak,
            "Daily Trader".into(),
            "Trade on consecutive days".into(),
        );
        assert_eq!(streak.streak_count, Some(1));
        assert!(streak.progress.is_none());

        streak.advance();
        streak.advance();
        assert_eq!(streak.streak_count, Some(3));
        assert_eq!(streak.points, 15);
        assert!(!streak.is_complete());
    }

    #[test]
    fn test_referral_counts_and_points() {
        let mut referral = AchievementDoc::new(
            ObjectId::new(),
            AchievementKind::Referral,
            "Community Builder".into(),
            "Refer another farmer".into(),
        );
        assert_eq!(referral.referral_count, Some(1));
        assert_eq!(referral.points, 50);
        referral.advance();
        assert_eq!(referral.referral_count, Some(2));
        assert_eq!(referral.points, 100);
    }

    #[test]
    fn test_kind_wire_format() {
        assert_eq!(
            serde_json::to_string(&AchievementKind::Badge).unwrap(),
            "\"BADGE\""
        );
        let parsed: AchievementKind = serde_json::from_str("\"REFERRAL\"").unwrap();
        assert_eq!(parsed, AchievementKind::Referral);
    }
}
