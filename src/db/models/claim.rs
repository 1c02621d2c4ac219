use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::db::models::balance::UserId;
use crate::db::models::prize::{Prize, PrizeId};

/// Base claim table model. At most one row per (user_id, prize_id); rows are
/// inserted by the claim transaction, never updated, never deleted by the
/// normal flow.
#[derive(Debug, Clone, sqlx::FromRow)]
#[allow(dead_code)]
pub struct Claim {
    pub user_id: UserId,
    pub prize_id: PrizeId,
    pub claimed_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimOutcome {
    Claimed,
    AlreadyClaimed,
    InsufficientPoints,
    PrizeInactive,
    NotFound,
}

impl ClaimOutcome {
    /// `already_claimed` is an idempotent success: callers render it exactly
    /// like a fresh claim.
    pub fn is_success(&self) -> bool {
        matches!(self, ClaimOutcome::Claimed | ClaimOutcome::AlreadyClaimed)
    }
}

/// Pre-insert checks for a claim attempt, against a fresh balance read.
/// Returns the terminal outcome when the claim cannot proceed, `None` when
/// the insert should be attempted. These checks only avoid pointless write
/// attempts; the uniqueness constraint on (user_id, prize_id) remains the
/// actual correctness boundary under concurrency.
pub fn precheck(prize: Option<&Prize>, points: i64, already_claimed: bool) -> Option<ClaimOutcome> {
    let Some(prize) = prize else {
        return Some(ClaimOutcome::NotFound);
    };

    if !prize.is_active {
        return Some(ClaimOutcome::PrizeInactive);
    }
    if already_claimed {
        return Some(ClaimOutcome::AlreadyClaimed);
    }
    if points < prize.points_required {
        return Some(ClaimOutcome::InsufficientPoints);
    }

    None
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn prize(points_required: i64, is_active: bool) -> Prize {
        let now = Utc::now().naive_utc();
        Prize {
            id: PrizeId(Uuid::new_v4()),
            title: "Finalist Pin".to_string(),
            description: String::new(),
            points_required,
            display_order: 0,
            is_active,
            created_by: "admin".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_missing_prize() {
        assert_eq!(precheck(None, 1000, false), Some(ClaimOutcome::NotFound));
    }

    #[test]
    fn test_inactive_prize_wins_over_other_checks() {
        let p = prize(100, false);
        // inactive is reported even when the user could otherwise claim
        assert_eq!(
            precheck(Some(&p), 500, false),
            Some(ClaimOutcome::PrizeInactive)
        );
        assert_eq!(
            precheck(Some(&p), 0, true),
            Some(ClaimOutcome::PrizeInactive)
        );
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        let p = prize(100, true);
        assert_eq!(
            precheck(Some(&p), 99, false),
            Some(ClaimOutcome::InsufficientPoints)
        );
        assert_eq!(precheck(Some(&p), 100, false), None);
        assert_eq!(precheck(Some(&p), 101, false), None);
    }

    #[test]
    fn test_existing_claim_short_circuits() {
        let p = prize(100, true);
        let outcome = precheck(Some(&p), 150, true).unwrap();
        assert_eq!(outcome, ClaimOutcome::AlreadyClaimed);
        assert!(outcome.is_success());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&ClaimOutcome::InsufficientPoints).unwrap();
        assert_eq!(json, "\"insufficient_points\"");

        let json = serde_json::to_string(&ClaimOutcome::AlreadyClaimed).unwrap();
        assert_eq!(json, "\"already_claimed\"");
    }
}
