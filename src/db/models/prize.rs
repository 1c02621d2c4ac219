use core::fmt;
use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::FieldError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct PrizeId(pub Uuid);

/// Base prize table model. Among active prizes `display_order` is unique,
/// enforced by a partial unique index rather than application logic.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Prize {
    pub id: PrizeId,
    pub title: String,
    pub description: String,
    pub points_required: i64,
    pub display_order: i32,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPrize {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub points_required: i64,
    pub display_order: i32,
}

impl NewPrize {
    pub fn validate(&self) -> Result<(), FieldError> {
        if self.title.trim().is_empty() {
            return Err(FieldError::new("title", "must not be empty"));
        }
        if self.points_required < 0 {
            return Err(FieldError::new("points_required", "must be non-negative"));
        }
        if self.display_order < 0 {
            return Err(FieldError::new("display_order", "must be non-negative"));
        }

        Ok(())
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrizePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub points_required: Option<i64>,
    pub display_order: Option<i32>,
    pub is_active: Option<bool>,
}

impl PrizePatch {
    pub fn validate(&self) -> Result<(), FieldError> {
        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            return Err(FieldError::new("title", "must not be empty"));
        }
        if let Some(points) = self.points_required
            && points < 0
        {
            return Err(FieldError::new("points_required", "must be non-negative"));
        }
        if let Some(order) = self.display_order
            && order < 0
        {
            return Err(FieldError::new("display_order", "must be non-negative"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReorderEntry {
    pub id: PrizeId,
    pub display_order: i32,
}

/// A reorder batch must be internally consistent before any row is touched;
/// the applied batch is then all-or-nothing inside one transaction.
pub fn validate_reorder(entries: &[ReorderEntry]) -> Result<(), FieldError> {
    if entries.is_empty() {
        return Err(FieldError::new("entries", "reorder batch must not be empty"));
    }

    let mut seen_ids = HashSet::new();
    let mut seen_orders = HashSet::new();

    for entry in entries {
        if entry.display_order < 0 {
            return Err(FieldError::new("display_order", "must be non-negative"));
        }
        if !seen_ids.insert(entry.id) {
            return Err(FieldError::new(
                "id",
                format!("prize '{}' appears more than once", entry.id),
            ));
        }
        if !seen_orders.insert(entry.display_order) {
            return Err(FieldError::new(
                "display_order",
                format!("order {} requested more than once", entry.display_order),
            ));
        }
    }

    Ok(())
}

/// Admin listing entry; claimed_count comes from a batched aggregation and
/// degrades to zero when that aggregation is unavailable.
#[derive(Debug, Serialize)]
pub struct AdminPrizeEntry {
    #[serde(flatten)]
    pub prize: Prize,
    pub claimed_count: i64,
}

impl From<Uuid> for PrizeId {
    fn from(value: Uuid) -> Self {
        PrizeId(value)
    }
}

impl fmt::Display for PrizeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
