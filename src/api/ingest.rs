use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use tracing::instrument;

use crate::api::handler::BalanceView;
use crate::api::server::{AppState, JsonResult, RouteError};
use crate::constants::{
    PARTICIPANT_POINTS, REASON_ADMIN_ADJUSTMENT, REASON_MATCH_PARTICIPANT, REASON_MATCH_WINNER,
    WINNER_POINTS,
};
use crate::db::models::FieldError;
use crate::db::prelude::{LedgerRepository, Repository, UserId};

/// Match-result event from the tournament collaborator. The delta may be
/// priced upstream; when omitted, the standard match reasons carry their
/// default point values.
#[derive(Debug, Deserialize)]
pub struct MatchResultEvent {
    pub user_id: String,
    pub delta_points: Option<i64>,
    pub reason: String,
}

/// Default pricing for the standard match reasons.
fn default_delta(reason: &str) -> Option<i64> {
    match reason {
        REASON_MATCH_WINNER => Some(WINNER_POINTS),
        REASON_MATCH_PARTICIPANT => Some(PARTICIPANT_POINTS),
        _ => None,
    }
}

/// Manual admin override; the delta may be negative but the resulting
/// balance may not.
#[derive(Debug, Deserialize)]
pub struct AdjustmentEvent {
    pub user_id: String,
    pub delta_points: i64,
    #[serde(default = "default_adjustment_reason")]
    pub reason: String,
}

fn default_adjustment_reason() -> String {
    REASON_ADMIN_ADJUSTMENT.to_string()
}

#[instrument(skip(state, event), fields(user = event.user_id))]
pub async fn ingest_match_result(
    State(state): State<Arc<AppState>>,
    Json(event): Json<MatchResultEvent>,
) -> JsonResult<BalanceView> {
    if event.reason.trim().is_empty() {
        return Err(FieldError::new("reason", "must not be empty").into());
    }

    let delta = match event.delta_points.or_else(|| default_delta(&event.reason)) {
        Some(delta) if delta > 0 => delta,
        Some(_) => {
            return Err(FieldError::new("delta_points", "match results must award points").into());
        }
        None => {
            return Err(FieldError::new(
                "delta_points",
                "required for non-standard match reasons",
            )
            .into());
        }
    };

    let user_id: UserId = event.user_id.into();
    let balance = LedgerRepository::new(state.db_pool)
        .apply_delta(&user_id, delta, &event.reason)
        .await
        .map_err(map_balance_err)?;

    Ok(Json(balance.into()))
}

#[instrument(skip(state, event), fields(user = event.user_id))]
pub async fn ingest_adjustment(
    State(state): State<Arc<AppState>>,
    Json(event): Json<AdjustmentEvent>,
) -> JsonResult<BalanceView> {
    if event.delta_points == 0 {
        return Err(FieldError::new("delta_points", "adjustment must be non-zero").into());
    }

    let user_id: UserId = event.user_id.into();
    let balance = LedgerRepository::new(state.db_pool)
        .apply_delta(&user_id, event.delta_points, &event.reason)
        .await
        .map_err(map_balance_err)?;

    Ok(Json(balance.into()))
}

/// The `points >= 0` check constraint is the floor for admin corrections;
/// tripping it is reported as a field-level rejection.
fn map_balance_err(e: sqlx::Error) -> RouteError {
    match e.as_database_error() {
        Some(db) if db.is_check_violation() => {
            FieldError::new("delta_points", "would take the balance below zero").into()
        }
        _ => RouteError::SqlxError(e),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_standard_reasons_carry_default_pricing() {
        assert_eq!(default_delta(REASON_MATCH_WINNER), Some(WINNER_POINTS));
        assert_eq!(
            default_delta(REASON_MATCH_PARTICIPANT),
            Some(PARTICIPANT_POINTS)
        );
        assert_eq!(default_delta("tiebreaker_bonus"), None);
    }

    #[test]
    fn test_match_event_delta_is_optional() {
        let event: MatchResultEvent =
            serde_json::from_str(r#"{"user_id": "42", "reason": "match_winner"}"#).unwrap();
        assert_eq!(event.delta_points, None);
        assert_eq!(default_delta(&event.reason), Some(WINNER_POINTS));
    }
}
