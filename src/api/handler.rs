use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use http::StatusCode;
use serde::Serialize;
use tracing::instrument;

use crate::api::server::{AppState, JsonResult, RouteError};
use crate::db::prelude::{
    ClaimOutcome, ClaimRepository, LedgerRepository, PrizeId, PrizeRepository, Repository, Trend,
    UserBalance, UserId,
};
use crate::progression::eligibility::{PrizeProgress, evaluate};
use crate::progression::track::TrackInsets;

#[derive(Debug, Serialize)]
pub struct BalanceView {
    pub user_id: UserId,
    pub points: i64,
    pub trend: Trend,
}

impl From<UserBalance> for BalanceView {
    fn from(value: UserBalance) -> Self {
        Self {
            trend: value.trend(),
            user_id: value.user_id,
            points: value.points,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub balance: BalanceView,
    pub prizes: Vec<PrizeProgress>,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub status: ClaimOutcome,
}

/// Reward track snapshot for the authenticated user: current balance plus
/// the tri-state and track position of every active prize.
#[instrument(skip(state))]
pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
) -> JsonResult<ProgressResponse> {
    let ledger = LedgerRepository::new(state.db_pool);
    let prize_repo = PrizeRepository::new(state.db_pool);
    let claim_repo = ClaimRepository::new(state.db_pool);

    let balance = ledger.balance_of(&user_id).await?;
    let prizes = prize_repo.active().await?;
    let claims = claim_repo.claimed_prize_ids(&user_id).await?;

    let entries = evaluate(balance.points, &prizes, &claims, TrackInsets::default());

    Ok(Json(ProgressResponse {
        balance: balance.into(),
        prizes: entries,
    }))
}

/// The only user-facing mutation. Outcomes map 1:1 onto response codes:
/// success-equivalent outcomes are 200, business-rule failures 409, and an
/// unknown prize 404. `already_claimed` is deliberately not an error.
#[instrument(skip(state))]
pub async fn post_claim(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<UserId>,
    Path(prize_id): Path<PrizeId>,
) -> Result<Response, RouteError> {
    let outcome = ClaimRepository::new(state.db_pool)
        .claim(&user_id, &prize_id)
        .await?;

    let status = if outcome.is_success() {
        StatusCode::OK
    } else if outcome == ClaimOutcome::NotFound {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::CONFLICT
    };

    Ok((status, Json(ClaimResponse { status: outcome })).into_response())
}
