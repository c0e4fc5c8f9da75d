//! Postgres-backed store
//!
//! A unit of work is one `sqlx::Transaction`. Locking reads use
//! `SELECT ... FOR UPDATE`, and every transaction sets a local
//! `lock_timeout` so a contended row surfaces as a concurrency conflict
//! instead of blocking forever.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

use super::{Store, UnitOfWork};
use crate::db;
use crate::error::{EngineError, EngineResult};
use crate::loan::{Loan, LoanStatus, Repayment};
use crate::models::{User, UserStatus};
use crate::reputation::{NewReputationEvent, Reputation, ReputationEvent};

/// Store over a Postgres connection pool
#[derive(Clone)]
pub struct PgStore {
    db_pool: PgPool,
    lock_timeout: Duration,
}

impl PgStore {
    pub fn new(db_pool: PgPool, lock_timeout: Duration) -> Self {
        Self {
            db_pool,
            lock_timeout,
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> EngineResult<Box<dyn UnitOfWork>> {
        let mut tx = self.db_pool.begin().await?;

        // SET does not take bind parameters; the value is an integer we own.
        sqlx::query(&format!(
            "SET LOCAL lock_timeout = '{}ms'",
            self.lock_timeout.as_millis()
        ))
        .execute(&mut *tx)
        .await?;

        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn user(&self, user_id: Uuid) -> EngineResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(user)
    }

    async fn loan(&self, loan_id: Uuid) -> EngineResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(loan_id)
            .fetch_optional(&self.db_pool)
            .await?;
        Ok(loan)
    }

    async fn reputation(&self, user_id: Uuid) -> EngineResult<Option<Reputation>> {
        let reputation =
            sqlx::query_as::<_, Reputation>("SELECT * FROM reputations WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.db_pool)
                .await?;
        Ok(reputation)
    }

    async fn reputation_history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> EngineResult<Vec<ReputationEvent>> {
        let events = sqlx::query_as::<_, ReputationEvent>(
            r#"
            SELECT * FROM reputation_events
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(events)
    }

    async fn overdue_loan_ids(&self, now: DateTime<Utc>) -> EngineResult<Vec<Uuid>> {
        let ids = sqlx::query_as::<_, (Uuid,)>(
            "SELECT id FROM loans WHERE status = $1 AND due_at < $2 ORDER BY due_at",
        )
        .bind(LoanStatus::Active)
        .bind(now)
        .fetch_all(&self.db_pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn ping(&self) -> EngineResult<()> {
        db::check_health(&self.db_pool)
            .await
            .map_err(|e| EngineError::Storage(e.to_string()))
    }
}

/// One Postgres transaction; rolled back by sqlx if dropped uncommitted
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_loan(&mut self, loan_id: Uuid) -> EngineResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
            .bind(loan_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(loan)
    }

    async fn repayments_for_loan(&mut self, loan_id: Uuid) -> EngineResult<Vec<Repayment>> {
        let repayments = sqlx::query_as::<_, Repayment>(
            "SELECT * FROM repayments WHERE loan_id = $1 ORDER BY paid_at, id",
        )
        .bind(loan_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(repayments)
    }

    async fn insert_repayment(&mut self, repayment: &Repayment) -> EngineResult<()> {
        sqlx::query("INSERT INTO repayments (id, loan_id, amount, paid_at) VALUES ($1, $2, $3, $4)")
            .bind(repayment.id)
            .bind(repayment.loan_id)
            .bind(repayment.amount)
            .bind(repayment.paid_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn update_loan(&mut self, loan: &Loan) -> EngineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE loans
            SET due_at = $1, partial_extension_used = $2, status = $3, late_days = $4,
                updated_at = $5
            WHERE id = $6
            "#,
        )
        .bind(loan.due_at)
        .bind(loan.partial_extension_used)
        .bind(loan.status)
        .bind(loan.late_days)
        .bind(Utc::now())
        .bind(loan.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("Loan {} not found", loan.id)));
        }
        Ok(())
    }

    async fn count_active_loans(&mut self, user_id: Uuid) -> EngineResult<i64> {
        let (count,) = sqlx::query_as::<_, (i64,)>(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(LoanStatus::Active)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn lock_reputation(&mut self, user_id: Uuid) -> EngineResult<Option<Reputation>> {
        let reputation = sqlx::query_as::<_, Reputation>(
            "SELECT * FROM reputations WHERE user_id = $1 FOR UPDATE",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(reputation)
    }

    async fn update_reputation(&mut self, reputation: &Reputation) -> EngineResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE reputations
            SET score = $1, consecutive_late_count = $2, clean_cycle_count = $3,
                max_score_before_last_penalty = $4, updated_at = $5
            WHERE user_id = $6
            "#,
        )
        .bind(reputation.score)
        .bind(reputation.consecutive_late_count)
        .bind(reputation.clean_cycle_count)
        .bind(reputation.max_score_before_last_penalty)
        .bind(reputation.updated_at)
        .bind(reputation.user_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!(
                "Reputation for user {} not found",
                reputation.user_id
            )));
        }
        Ok(())
    }

    async fn append_reputation_event(
        &mut self,
        user_id: Uuid,
        event: &NewReputationEvent,
    ) -> EngineResult<ReputationEvent> {
        let stored = sqlx::query_as::<_, ReputationEvent>(
            r#"
            INSERT INTO reputation_events (
                user_id, event_type, delta, previous_score, new_score, loan_id, reason, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(event.event_type)
        .bind(event.delta)
        .bind(event.previous_score)
        .bind(event.new_score)
        .bind(event.loan_id)
        .bind(&event.reason)
        .bind(Utc::now())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(stored)
    }

    async fn lock_user(&mut self, user_id: Uuid) -> EngineResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(user)
    }

    async fn set_user_status(&mut self, user_id: Uuid, status: UserStatus) -> EngineResult<()> {
        let result = sqlx::query("UPDATE users SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::NotFound(format!("User {} not found", user_id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> EngineResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
