use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::balance::{PointEvent, Trend, UserBalance, UserId};
use crate::db::repositories::{Repository, Tx};

/// Sole writer of user balances. Match results and admin adjustments land
/// here; nothing else mutates the `points` column.
#[derive(Debug)]
pub struct LedgerRepository {
    pool: &'static Pool<Postgres>,
}

#[async_trait::async_trait]
impl Repository for LedgerRepository {
    type Ident = UserId;
    type Output = UserBalance;

    const BASE_FIELDS: &'static str = sql_fragment::BALANCE_FIELDS;
    const TABLE_NAME: &'static str = "user_balance";
    const ID_COLUMN: &'static str = "user_id";

    fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &'static Pool<Postgres> {
        self.pool
    }
}

impl LedgerRepository {
    /// Current points for a user, zero when the ledger has never seen them.
    #[instrument(skip(self))]
    pub async fn points_of(&self, user_id: &UserId) -> SqlxResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE((SELECT points FROM user_balance WHERE user_id = $1), 0)",
        )
        .bind(user_id)
        .fetch_one(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn balance_of(&self, user_id: &UserId) -> SqlxResult<UserBalance> {
        Ok(self
            .get_by_id(user_id)
            .await?
            .unwrap_or_else(|| UserBalance::zero(user_id.clone())))
    }

    /// Most recent audit events for a user, newest first.
    #[instrument(skip(self))]
    pub async fn events_of(&self, user_id: &UserId, limit: i64) -> SqlxResult<Vec<PointEvent>> {
        sqlx::query_as::<_, PointEvent>(&format!(
            r#"
            SELECT {}
            FROM point_event
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
            sql_fragment::EVENT_FIELDS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await
    }

    /// Applies a signed delta and records the audit event in one
    /// transaction. A delta that would take the balance negative is rejected
    /// by the schema's check constraint and rolls back both writes.
    #[instrument(skip(self), fields(user = user_id.0))]
    pub async fn apply_delta(
        &self,
        user_id: &UserId,
        delta: i64,
        reason: &str,
    ) -> SqlxResult<UserBalance> {
        let trend = Trend::from_delta(delta);

        Tx::with_tx(self.pool, |mut tx| async move {
            let result = async {
                let balance = tx.apply_point_delta(user_id, delta, trend.as_str()).await?;
                tx.insert_point_event(user_id, delta, reason).await?;

                Ok(balance)
            }
            .await;

            (tx, result)
        })
        .await
    }
}

#[cfg(test)]
mod test {
    use sqlx::PgPool;

    use super::*;
    use crate::db::repositories::test_pool;

    #[sqlx::test]
    async fn test_apply_delta_upserts_and_audits(pool: PgPool) {
        let pool = test_pool::leak(pool);
        let repo = LedgerRepository::new(pool);
        let user: UserId = "user-ledger".into();

        let balance = repo.apply_delta(&user, 10, "match_winner").await.unwrap();
        assert_eq!(balance.points, 10);
        assert_eq!(balance.trend(), Trend::Up);

        let balance = repo.apply_delta(&user, 3, "match_participant").await.unwrap();
        assert_eq!(balance.points, 13);

        let events = repo.events_of(&user, 10).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events.iter().map(|e| e.delta).sum::<i64>(), 13);
    }

    #[sqlx::test]
    async fn test_overdraw_rolls_back_balance_and_audit(pool: PgPool) {
        let pool = test_pool::leak(pool);
        let repo = LedgerRepository::new(pool);
        let user: UserId = "user-floor".into();

        repo.apply_delta(&user, 5, "match_participant").await.unwrap();

        let err = repo
            .apply_delta(&user, -10, "admin_adjustment")
            .await
            .unwrap_err();
        assert!(err.as_database_error().unwrap().is_check_violation());

        // neither the balance write nor the audit row survived the rollback
        assert_eq!(repo.balance_of(&user).await.unwrap().points, 5);
        assert_eq!(repo.events_of(&user, 10).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    async fn test_unseen_user_reads_zero(pool: PgPool) {
        let pool = test_pool::leak(pool);
        let repo = LedgerRepository::new(pool);
        let user: UserId = "user-nobody".into();

        assert_eq!(repo.points_of(&user).await.unwrap(), 0);
        assert_eq!(repo.balance_of(&user).await.unwrap().points, 0);
    }
}
