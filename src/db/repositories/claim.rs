use std::collections::HashSet;

use sqlx::{Pool, Postgres, Result as SqlxResult};
use tracing::instrument;

use super::sql_fragment;
use crate::db::models::balance::UserId;
use crate::db::models::claim::{Claim, ClaimOutcome, precheck};
use crate::db::models::prize::PrizeId;
use crate::db::repositories::Repository;
use crate::db::repositories::ledger::LedgerRepository;
use crate::db::repositories::prize::PrizeRepository;

pub struct ClaimRepository {
    pool: &'static Pool<Postgres>,
}

impl ClaimRepository {
    pub fn new(pool: &'static Pool<Postgres>) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, user_id: &UserId, prize_id: &PrizeId) -> SqlxResult<Option<Claim>> {
        sqlx::query_as::<_, Claim>(&format!(
            "SELECT {} FROM claim WHERE user_id = $1 AND prize_id = $2",
            sql_fragment::CLAIM_FIELDS
        ))
        .bind(user_id)
        .bind(prize_id)
        .fetch_optional(self.pool)
        .await
    }

    #[instrument(skip(self))]
    pub async fn claimed_prize_ids(&self, user_id: &UserId) -> SqlxResult<HashSet<PrizeId>> {
        let ids = sqlx::query_scalar::<_, PrizeId>(
            "SELECT prize_id FROM claim WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(ids.into_iter().collect())
    }

    /// The claim transaction. Eligibility is re-checked against a fresh
    /// balance read, never a client-supplied one, then the insert races on
    /// the (user_id, prize_id) primary key: zero rows affected means a
    /// concurrent request won, which callers treat as `already_claimed`.
    /// The balance itself is never touched here.
    #[instrument(skip(self), fields(user = user_id.0, prize = %prize_id))]
    pub async fn claim(&self, user_id: &UserId, prize_id: &PrizeId) -> SqlxResult<ClaimOutcome> {
        let prize = PrizeRepository::new(self.pool).get_by_id(prize_id).await?;
        let points = LedgerRepository::new(self.pool).points_of(user_id).await?;
        let already_claimed = self.get(user_id, prize_id).await?.is_some();

        if let Some(outcome) = precheck(prize.as_ref(), points, already_claimed) {
            tracing::debug!(?outcome, "claim rejected before insert");
            return Ok(outcome);
        }

        let inserted = sqlx::query(
            r#"
            INSERT INTO claim (
                user_id,
                prize_id,
                claimed_at
            )
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id, prize_id)
            DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(prize_id)
        .execute(self.pool)
        .await?;

        if inserted.rows_affected() == 0 {
            // lost the race against a concurrent claim for the same pair
            tracing::debug!("duplicate claim suppressed by uniqueness constraint");
            Ok(ClaimOutcome::AlreadyClaimed)
        } else {
            tracing::info!("claim recorded");
            Ok(ClaimOutcome::Claimed)
        }
    }
}

#[cfg(test)]
mod test {
    use sqlx::PgPool;

    use super::*;
    use crate::db::models::prize::NewPrize;
    use crate::db::repositories::test_pool;

    async fn seed_prize(pool: &'static PgPool, points_required: i64) -> PrizeId {
        PrizeRepository::new(pool)
            .create(
                &NewPrize {
                    title: "Champion Hoodie".to_string(),
                    description: String::new(),
                    points_required,
                    display_order: 0,
                },
                "admin",
            )
            .await
            .unwrap()
            .id
    }

    async fn claim_rows(pool: &'static PgPool, prize_id: &PrizeId) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM claim WHERE prize_id = $1")
            .bind(prize_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[sqlx::test]
    async fn test_duplicate_claim_keeps_one_row(pool: PgPool) {
        let pool = test_pool::leak(pool);
        let prize_id = seed_prize(pool, 50).await;
        let user: UserId = "user-dup".into();

        LedgerRepository::new(pool)
            .apply_delta(&user, 100, "match_winner")
            .await
            .unwrap();

        let repo = ClaimRepository::new(pool);
        assert_eq!(
            repo.claim(&user, &prize_id).await.unwrap(),
            ClaimOutcome::Claimed
        );
        assert_eq!(
            repo.claim(&user, &prize_id).await.unwrap(),
            ClaimOutcome::AlreadyClaimed
        );

        assert_eq!(claim_rows(pool, &prize_id).await, 1);
    }

    #[sqlx::test]
    async fn test_concurrent_claims_record_one_row(pool: PgPool) {
        let pool = test_pool::leak(pool);
        let prize_id = seed_prize(pool, 50).await;
        let user: UserId = "user-race".into();

        LedgerRepository::new(pool)
            .apply_delta(&user, 100, "match_winner")
            .await
            .unwrap();

        // both attempts pass the pre-checks; the primary key decides
        let repo_a = ClaimRepository::new(pool);
        let repo_b = ClaimRepository::new(pool);
        let (a, b) = tokio::join!(
            repo_a.claim(&user, &prize_id),
            repo_b.claim(&user, &prize_id),
        );

        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == ClaimOutcome::Claimed)
                .count(),
            1
        );
        assert!(outcomes.iter().all(|o| o.is_success()));

        assert_eq!(claim_rows(pool, &prize_id).await, 1);
    }

    #[sqlx::test]
    async fn test_insufficient_points_leaves_no_row(pool: PgPool) {
        let pool = test_pool::leak(pool);
        let prize_id = seed_prize(pool, 100).await;
        let user: UserId = "user-poor".into();

        LedgerRepository::new(pool)
            .apply_delta(&user, 10, "match_participant")
            .await
            .unwrap();

        let outcome = ClaimRepository::new(pool)
            .claim(&user, &prize_id)
            .await
            .unwrap();

        assert_eq!(outcome, ClaimOutcome::InsufficientPoints);
        assert_eq!(claim_rows(pool, &prize_id).await, 0);
    }
}
