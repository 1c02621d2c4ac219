use core::fmt;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Result as SqlxResult, Transaction};
use tracing::instrument;
use uuid::Uuid;

use crate::db::models::balance::{UserBalance, UserId};
use crate::db::models::prize::PrizeId;

pub mod claim;
pub mod ledger;
pub mod prize;

pub struct Tx<'a> {
    inner: Option<Transaction<'a, Postgres>>,
}

impl<'a> Tx<'a> {
    /// Runs `f` inside a transaction, committing on `Ok` and rolling back on
    /// `Err`. The closure returns the `Tx` back so the borrow checker can
    /// follow the handoff.
    #[instrument(skip(pool, f))]
    pub async fn with_tx<F, Fut, T>(pool: &'static Pool<Postgres>, f: F) -> SqlxResult<T>
    where
        F: FnOnce(Tx<'a>) -> Fut,
        Fut: Future<Output = (Tx<'a>, SqlxResult<T>)>,
    {
        let tx = Self::begin(pool).await?;
        let (mut tx, result) = f(tx).await;

        match result {
            Ok(val) => {
                tx.commit().await?;
                Ok(val)
            }
            Err(e) => {
                tracing::trace!(error = ?e, "transacted query failure");
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    #[instrument(skip(pool))]
    pub async fn begin(pool: &'static Pool<Postgres>) -> SqlxResult<Self> {
        let inner = pool.begin().await?;
        Ok(Self { inner: Some(inner) })
    }

    #[instrument(skip(self))]
    pub async fn commit(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.commit().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    #[instrument(skip(self))]
    pub async fn rollback(&mut self) -> SqlxResult<()> {
        if let Some(tx) = self.inner.take() {
            tx.rollback().await
        } else {
            Err(sqlx::Error::Protocol(
                "Transaction already completed".into(),
            ))
        }
    }

    fn inner_mut(&mut self) -> SqlxResult<&mut Transaction<'a, Postgres>> {
        self.inner
            .as_mut()
            .ok_or_else(|| sqlx::Error::Protocol("Transaction already completed".into()))
    }

    /// Applies a signed point delta to a user's balance, creating the row on
    /// first contact. The `points >= 0` check constraint rejects deltas that
    /// would take the balance negative.
    #[instrument(skip(self))]
    pub async fn apply_point_delta(
        &mut self,
        user_id: &UserId,
        delta: i64,
        trend: &str,
    ) -> SqlxResult<UserBalance> {
        sqlx::query_as::<_, UserBalance>(
            r#"
            INSERT INTO user_balance (
                user_id,
                points,
                trend,
                updated_at
            )
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                points = user_balance.points + $2,
                trend = $3,
                updated_at = NOW()
            RETURNING
                user_id,
                points,
                trend,
                updated_at
            "#,
        )
        .bind(user_id)
        .bind(delta)
        .bind(trend)
        .fetch_one(&mut **self.inner_mut()?)
        .await
    }

    #[instrument(skip(self))]
    pub async fn insert_point_event(
        &mut self,
        user_id: &UserId,
        delta: i64,
        reason: &str,
    ) -> SqlxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO point_event (
                id,
                user_id,
                delta,
                reason,
                created_at
            )
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(delta)
        .bind(reason)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(())
    }

    /// Moves the targeted prizes onto negative display orders so a reorder
    /// batch can reassign final orders without tripping the partial unique
    /// index against its own intermediate state. Final orders are validated
    /// non-negative, so the parked range cannot collide.
    #[instrument(skip(self, ids))]
    pub async fn park_display_orders(&mut self, ids: &[PrizeId]) -> SqlxResult<()> {
        let raw_ids: Vec<Uuid> = ids.iter().map(|id| id.0).collect();

        sqlx::query(
            r#"
            UPDATE prize
            SET display_order = -(display_order + 1),
                updated_at = NOW()
            WHERE id = ANY($1)
            "#,
        )
        .bind(&raw_ids)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn set_display_order(
        &mut self,
        id: &PrizeId,
        display_order: i32,
    ) -> SqlxResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE prize
            SET display_order = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(display_order)
        .execute(&mut **self.inner_mut()?)
        .await?;

        Ok(result.rows_affected())
    }
}

pub mod sql_fragment {
    pub const PRIZE_FIELDS: &str = r#"
        id,
        title,
        description,
        points_required,
        display_order,
        is_active,
        created_by,
        created_at,
        updated_at
    "#;

    pub const BALANCE_FIELDS: &str = r#"
        user_id,
        points,
        trend,
        updated_at
    "#;

    pub const CLAIM_FIELDS: &str = r#"
        user_id,
        prize_id,
        claimed_at
    "#;

    pub const EVENT_FIELDS: &str = r#"
        id,
        user_id,
        delta,
        reason,
        created_at
    "#;
}

#[cfg(test)]
pub(crate) mod test_pool {
    use sqlx::{PgPool, Pool, Postgres};

    /// Repositories hold a `&'static` pool; per-test pools are leaked to
    /// satisfy the lifetime.
    pub fn leak(pool: PgPool) -> &'static Pool<Postgres> {
        Box::leak(Box::new(pool))
    }
}

#[async_trait]
pub trait Repository {
    type Ident: for<'q> sqlx::Encode<'q, Postgres> + sqlx::Type<Postgres> + Send + Sync + fmt::Debug;
    type Output: for<'r> sqlx::FromRow<'r, <Postgres as sqlx::Database>::Row>
        + Sized
        + Unpin
        + Send
        + fmt::Debug;

    const BASE_FIELDS: &'static str;
    const TABLE_NAME: &'static str;
    const ID_COLUMN: &'static str = "id";

    fn new(pool: &'static Pool<Postgres>) -> Self
    where
        Self: Sized;

    fn pool(&self) -> &'static Pool<Postgres>;

    #[instrument(skip(self, id))]
    async fn get_by_id(&self, id: &Self::Ident) -> SqlxResult<Option<Self::Output>> {
        sqlx::query_as::<_, Self::Output>(&format!(
            "SELECT {} FROM {} WHERE {} = $1",
            Self::BASE_FIELDS,
            Self::TABLE_NAME,
            Self::ID_COLUMN
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
    }
}
