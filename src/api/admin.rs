use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::api::server::{AppState, JsonResult, RouteError};
use crate::constants::USER_ID_HEADER;
use crate::db::models::prize::{
    AdminPrizeEntry, NewPrize, PrizeId, PrizePatch, ReorderEntry, validate_reorder,
};
use crate::db::models::balance::PointEvent;
use crate::db::models::{FieldError, PaginatedResponse};
use crate::db::prelude::{LedgerRepository, Prize, PrizeRepository, Repository, UserId};
use crate::db::repositories::prize::HardDelete;

#[inline]
const fn default_limit() -> i64 {
    50
}

/// Largest page an admin listing will serve in one request.
const MAX_PAGE_SIZE: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct AdminListParams {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub include_inactive: bool,
}

impl AdminListParams {
    /// Out-of-range paging is a caller error, reported field-level rather
    /// than coerced or passed through to the database.
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.limit < 1 || self.limit > MAX_PAGE_SIZE {
            return Err(FieldError::new(
                "limit",
                format!("must be between 1 and {MAX_PAGE_SIZE}"),
            ));
        }
        if self.page < 0 {
            return Err(FieldError::new("page", "must be non-negative"));
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub hard: bool,
}

#[derive(Debug, Serialize)]
pub struct ReorderResponse {
    pub reordered: usize,
}

/// Paginated catalog with per-prize claim counts. The counts come from one
/// batched aggregation; when that aggregation fails the listing degrades to
/// zero counts instead of failing outright.
#[instrument(skip(state))]
pub async fn list_prizes(
    Query(params): Query<AdminListParams>,
    State(state): State<Arc<AppState>>,
) -> JsonResult<PaginatedResponse<AdminPrizeEntry>> {
    params.validate()?;

    let limit = params.limit;
    let offset = params.page * limit;

    let repo = PrizeRepository::new(state.db_pool);
    let (prizes, total_items) = repo.list(limit, offset, params.include_inactive).await?;

    let ids: Vec<PrizeId> = prizes.iter().map(|p| p.id).collect();
    let counts: HashMap<PrizeId, i64> = match repo.claim_counts(&ids).await {
        Ok(counts) => counts,
        Err(e) => {
            tracing::warn!(error = ?e, "claim count aggregation unavailable, reporting zeroes");
            HashMap::new()
        }
    };

    let entries = prizes
        .into_iter()
        .map(|prize| AdminPrizeEntry {
            claimed_count: counts.get(&prize.id).copied().unwrap_or(0),
            prize,
        })
        .collect();

    Ok(Json(PaginatedResponse::new(
        entries,
        total_items,
        limit,
        params.page,
    )))
}

#[instrument(skip(state, headers, new))]
pub async fn create_prize(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(new): Json<NewPrize>,
) -> Result<Response, RouteError> {
    new.validate()?;

    let created_by = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("admin");

    let prize = PrizeRepository::new(state.db_pool)
        .create(&new, created_by)
        .await
        .map_err(map_order_conflict)?;

    Ok((StatusCode::CREATED, Json(prize)).into_response())
}

#[instrument(skip(state, patch))]
pub async fn update_prize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PrizeId>,
    Json(patch): Json<PrizePatch>,
) -> JsonResult<Prize> {
    patch.validate()?;

    match PrizeRepository::new(state.db_pool)
        .update(&id, &patch)
        .await
        .map_err(map_order_conflict)?
    {
        Some(prize) => Ok(Json(prize)),
        None => Err(RouteError::PrizeNotFound(id)),
    }
}

/// Soft delete by default: the prize is deactivated and existing claims are
/// preserved. `?hard=true` removes the row entirely, but only when no claim
/// references it.
#[instrument(skip(state))]
pub async fn delete_prize(
    State(state): State<Arc<AppState>>,
    Path(id): Path<PrizeId>,
    Query(params): Query<DeleteParams>,
) -> Result<Response, RouteError> {
    let repo = PrizeRepository::new(state.db_pool);

    if params.hard {
        return match repo.hard_delete(&id).await? {
            HardDelete::Deleted => Ok(StatusCode::NO_CONTENT.into_response()),
            HardDelete::HasClaims(claims) => Err(RouteError::PrizeHasClaims {
                prize_id: id,
                claims,
            }),
            HardDelete::NotFound => Err(RouteError::PrizeNotFound(id)),
        };
    }

    match repo.soft_delete(&id).await? {
        Some(prize) => Ok(Json(prize).into_response()),
        None => Err(RouteError::PrizeNotFound(id)),
    }
}

/// Batch reorder with all-or-nothing semantics: the batch is validated in
/// full before any write, and any mid-batch failure rolls every order back.
#[instrument(skip(state, entries), fields(batch = entries.len()))]
pub async fn reorder_prizes(
    State(state): State<Arc<AppState>>,
    Json(entries): Json<Vec<ReorderEntry>>,
) -> JsonResult<ReorderResponse> {
    validate_reorder(&entries)?;

    PrizeRepository::new(state.db_pool)
        .reorder(&entries)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => {
                FieldError::new("id", "unknown prize id in reorder batch").into()
            }
            other => map_order_conflict(other),
        })?;

    Ok(Json(ReorderResponse {
        reordered: entries.len(),
    }))
}

/// The partial unique index on active display_order reports collisions as
/// database uniqueness violations; everything else passes through.
fn map_order_conflict(e: sqlx::Error) -> RouteError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => RouteError::DuplicateDisplayOrder,
        _ => RouteError::SqlxError(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct EventListParams {
    #[serde(default = "default_event_limit")]
    pub limit: i64,
}

#[inline]
const fn default_event_limit() -> i64 {
    100
}

/// Recent ledger audit events for one user, newest first.
#[instrument(skip(state))]
pub async fn list_point_events(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
    Query(params): Query<EventListParams>,
) -> JsonResult<Vec<PointEvent>> {
    if params.limit < 1 || params.limit > MAX_PAGE_SIZE {
        return Err(FieldError::new(
            "limit",
            format!("must be between 1 and {MAX_PAGE_SIZE}"),
        )
        .into());
    }

    let events = LedgerRepository::new(state.db_pool)
        .events_of(&user_id, params.limit)
        .await?;

    Ok(Json(events))
}

#[cfg(test)]
mod test {
    use super::*;

    fn params(limit: i64, page: i64) -> AdminListParams {
        AdminListParams {
            limit,
            page,
            include_inactive: false,
        }
    }

    #[test]
    fn test_list_params_reject_negative_page() {
        let err = params(50, -1).validate().unwrap_err();
        assert_eq!(err.field, "page");
    }

    #[test]
    fn test_list_params_reject_bad_limit() {
        assert_eq!(params(0, 0).validate().unwrap_err().field, "limit");
        assert_eq!(
            params(MAX_PAGE_SIZE + 1, 0).validate().unwrap_err().field,
            "limit"
        );

        assert!(params(1, 0).validate().is_ok());
        assert!(params(MAX_PAGE_SIZE, 0).validate().is_ok());
        assert!(params(50, 3).validate().is_ok());
    }
}
