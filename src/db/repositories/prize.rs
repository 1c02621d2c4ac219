use std::collections::HashMap;

use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;
use uuid::Uuid;

use super::sql_fragment;
use crate::db::models::prize::{NewPrize, Prize, PrizeId, PrizePatch, ReorderEntry};
use crate::db::repositories::{Repository, Tx};

#[derive(Debug)]
pub struct PrizeRepository {
    pool: &'static Pool<Postgres>,
}

/// Terminal state of a hard-delete attempt. A prize with existing claims is
/// never deleted; the conflict is reported back to the admin caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardDelete {
    Deleted,
    HasClaims(i64),
    NotFound,
}

#[async_trait::async_trait]
impl Repository for PrizeRepository {
    type Ident = PrizeId;
    type Output = Prize;

    const BASE_FIELDS: &'static str = sql_fragment::PRIZE_FIELDS;
    const TABLE_NAME: &'static str = "prize";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl PrizeRepository {
    /// Active catalog in track order, the snapshot both the progress read
    /// and the eligibility evaluation are computed from.
    #[instrument(skip(self))]
    pub async fn active(&self) -> SqlxResult<Vec<Prize>> {
        sqlx::query_as::<_, Prize>(&format!(
            "SELECT {} FROM prize WHERE is_active ORDER BY display_order ASC",
            Self::BASE_FIELDS
        ))
        .fetch_all(self.pool)
        .await
    }

    #[instrument(skip(self, new), fields(title = new.title))]
    pub async fn create(&self, new: &NewPrize, created_by: &str) -> SqlxResult<Prize> {
        match sqlx::query_as::<_, Prize>(&format!(
            r#"
            INSERT INTO prize (
                id,
                title,
                description,
                points_required,
                display_order,
                is_active,
                created_by,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, TRUE, $6, NOW(), NOW())
            RETURNING {}
            "#,
            Self::BASE_FIELDS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.points_required)
        .bind(new.display_order)
        .bind(created_by)
        .fetch_one(self.pool)
        .await
        {
            Ok(prize) => Ok(prize),
            Err(e) => {
                tracing::error!(error = ?e, "failure during prize insertion");
                Err(e)
            }
        }
    }

    /// Partial patch; absent fields keep their stored value. Activating or
    /// re-ordering into an occupied active slot surfaces as a uniqueness
    /// violation from the partial index.
    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: &PrizeId, patch: &PrizePatch) -> SqlxResult<Option<Prize>> {
        sqlx::query_as::<_, Prize>(&format!(
            r#"
            UPDATE prize
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                points_required = COALESCE($4, points_required),
                display_order = COALESCE($5, display_order),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Self::BASE_FIELDS
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(patch.points_required)
        .bind(patch.display_order)
        .bind(patch.is_active)
        .fetch_optional(self.pool)
        .await
    }

    /// Soft delete: the prize stops appearing on the track and stops being
    /// claimable, but existing claims are untouched.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: &PrizeId) -> SqlxResult<Option<Prize>> {
        sqlx::query_as::<_, Prize>(&format!(
            r#"
            UPDATE prize
            SET is_active = FALSE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            Self::BASE_FIELDS
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await
    }

    /// Hard delete, blocked while any claim row references the prize. The
    /// claim count check and the delete run in one transaction so a claim
    /// landing in between cannot orphan itself.
    #[instrument(skip(self))]
    pub async fn hard_delete(&self, id: &PrizeId) -> SqlxResult<HardDelete> {
        Tx::with_tx(self.pool, |mut tx| async move {
            let result = async {
                let claims = sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM claim WHERE prize_id = $1",
                )
                .bind(id)
                .fetch_one(&mut **tx.inner_mut()?)
                .await?;

                if claims > 0 {
                    return Ok(HardDelete::HasClaims(claims));
                }

                let deleted = sqlx::query("DELETE FROM prize WHERE id = $1")
                    .bind(id)
                    .execute(&mut **tx.inner_mut()?)
                    .await?;

                if deleted.rows_affected() == 0 {
                    Ok(HardDelete::NotFound)
                } else {
                    Ok(HardDelete::Deleted)
                }
            }
            .await;

            (tx, result)
        })
        .await
    }

    /// All-or-nothing batch reorder: every entry applies or none do. Rows
    /// are first parked on negative orders so the batch cannot collide with
    /// its own intermediate state; a collision with an untouched active row
    /// rolls the whole batch back as a uniqueness violation.
    #[instrument(skip(self, entries), fields(batch = entries.len()))]
    pub async fn reorder(&self, entries: &[ReorderEntry]) -> SqlxResult<()> {
        let ids: Vec<PrizeId> = entries.iter().map(|e| e.id).collect();

        Tx::with_tx(self.pool, |mut tx| async move {
            let result = async {
                tx.park_display_orders(&ids).await?;

                for entry in entries {
                    let rows = tx.set_display_order(&entry.id, entry.display_order).await?;
                    if rows == 0 {
                        return Err(sqlx::Error::RowNotFound);
                    }
                }

                Ok(())
            }
            .await;

            (tx, result)
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
        include_inactive: bool,
    ) -> SqlxResult<(Vec<Prize>, i64)> {
        let total_items = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM prize WHERE is_active OR $1",
        )
        .bind(include_inactive)
        .fetch_one(self.pool)
        .await?;

        let prizes = sqlx::query_as::<_, Prize>(&format!(
            r#"
            SELECT {}
            FROM prize
            WHERE is_active OR $1
            ORDER BY display_order ASC, created_at ASC
            LIMIT $2 OFFSET $3
            "#,
            Self::BASE_FIELDS
        ))
        .bind(include_inactive)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok((prizes, total_items))
    }

    /// One batched aggregation for a page of prizes rather than one COUNT
    /// per row. Callers degrade to zero counts when this query fails; the
    /// listing itself must not.
    #[instrument(skip(self, ids))]
    pub async fn claim_counts(&self, ids: &[PrizeId]) -> SqlxResult<HashMap<PrizeId, i64>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let raw_ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();

        let rows = sqlx::query_as::<_, (PrizeId, i64)>(
            r#"
            SELECT prize_id, COUNT(*)
            FROM claim
            WHERE prize_id = ANY($1)
            GROUP BY prize_id
            "#,
        )
        .bind(&raw_ids)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod test {
    use sqlx::PgPool;

    use super::*;
    use crate::db::repositories::test_pool;

    async fn seed(pool: &'static PgPool, title: &str, display_order: i32) -> Prize {
        PrizeRepository::new(pool)
            .create(
                &NewPrize {
                    title: title.to_string(),
                    description: String::new(),
                    points_required: 100,
                    display_order,
                },
                "admin",
            )
            .await
            .unwrap()
    }

    async fn order_of(repo: &PrizeRepository, id: &PrizeId) -> i32 {
        repo.get_by_id(id).await.unwrap().unwrap().display_order
    }

    #[sqlx::test]
    async fn test_reorder_applies_whole_batch(pool: PgPool) {
        let pool = test_pool::leak(pool);
        let repo = PrizeRepository::new(pool);

        let a = seed(pool, "tier-a", 0).await;
        let b = seed(pool, "tier-b", 1).await;
        let c = seed(pool, "tier-c", 2).await;

        // rotate every order by one; naive sequential updates would trip
        // the unique index mid-batch
        repo.reorder(&[
            ReorderEntry {
                id: a.id,
                display_order: 1,
            },
            ReorderEntry {
                id: b.id,
                display_order: 2,
            },
            ReorderEntry {
                id: c.id,
                display_order: 0,
            },
        ])
        .await
        .unwrap();

        assert_eq!(order_of(&repo, &a.id).await, 1);
        assert_eq!(order_of(&repo, &b.id).await, 2);
        assert_eq!(order_of(&repo, &c.id).await, 0);
    }

    #[sqlx::test]
    async fn test_reorder_unknown_id_rolls_back(pool: PgPool) {
        let pool = test_pool::leak(pool);
        let repo = PrizeRepository::new(pool);

        let a = seed(pool, "tier-a", 0).await;
        let b = seed(pool, "tier-b", 1).await;
        let ghost = PrizeId(Uuid::new_v4());

        let err = repo
            .reorder(&[
                ReorderEntry {
                    id: a.id,
                    display_order: 1,
                },
                ReorderEntry {
                    id: b.id,
                    display_order: 0,
                },
                ReorderEntry {
                    id: ghost,
                    display_order: 5,
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, sqlx::Error::RowNotFound));

        // the valid entries rolled back with the batch
        assert_eq!(order_of(&repo, &a.id).await, 0);
        assert_eq!(order_of(&repo, &b.id).await, 1);
    }

    #[sqlx::test]
    async fn test_reorder_collision_with_untouched_prize_rolls_back(pool: PgPool) {
        let pool = test_pool::leak(pool);
        let repo = PrizeRepository::new(pool);

        let a = seed(pool, "tier-a", 0).await;
        let _b = seed(pool, "tier-b", 1).await;
        let c = seed(pool, "tier-c", 2).await;

        // order 2 is held by an active prize outside the batch
        let err = repo
            .reorder(&[ReorderEntry {
                id: a.id,
                display_order: 2,
            }])
            .await
            .unwrap_err();
        assert!(err.as_database_error().unwrap().is_unique_violation());

        assert_eq!(order_of(&repo, &a.id).await, 0);
        assert_eq!(order_of(&repo, &c.id).await, 2);
    }
}
