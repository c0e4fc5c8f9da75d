//! Storage seam for the engine
//!
//! Every mutation runs inside a [`UnitOfWork`]: a transactional handle that
//! either commits all of its writes or none of them. Dropping a unit of work
//! without calling [`UnitOfWork::commit`] rolls it back. The `lock_*`
//! methods take an exclusive lock on the row that is held until the unit of
//! work ends, so two writers on the same loan or reputation never interleave.
//!
//! Lock order is loan, then reputation, then user. Every caller follows it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EngineResult;
use crate::loan::{Loan, Repayment};
use crate::models::{User, UserStatus};
use crate::reputation::{NewReputationEvent, Reputation, ReputationEvent};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Entry point to persistence: opens units of work and serves plain reads
#[async_trait]
pub trait Store: Send + Sync {
    /// Start a new unit of work
    async fn begin(&self) -> EngineResult<Box<dyn UnitOfWork>>;

    async fn user(&self, user_id: Uuid) -> EngineResult<Option<User>>;

    async fn loan(&self, loan_id: Uuid) -> EngineResult<Option<Loan>>;

    async fn reputation(&self, user_id: Uuid) -> EngineResult<Option<Reputation>>;

    /// Most recent events first
    async fn reputation_history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> EngineResult<Vec<ReputationEvent>>;

    /// Ids of ACTIVE loans whose due date is before `now`
    async fn overdue_loan_ids(&self, now: DateTime<Utc>) -> EngineResult<Vec<Uuid>>;

    /// Cheap liveness probe for health checks
    async fn ping(&self) -> EngineResult<()>;
}

/// Transactional handle; all reads and writes through it commit or roll back together
#[async_trait]
pub trait UnitOfWork: Send {
    async fn lock_loan(&mut self, loan_id: Uuid) -> EngineResult<Option<Loan>>;

    /// Prior repayments for a loan, oldest first
    async fn repayments_for_loan(&mut self, loan_id: Uuid) -> EngineResult<Vec<Repayment>>;

    async fn insert_repayment(&mut self, repayment: &Repayment) -> EngineResult<()>;

    /// Persist the mutable loan fields (due date, extension flag, status, late days)
    async fn update_loan(&mut self, loan: &Loan) -> EngineResult<()>;

    async fn count_active_loans(&mut self, user_id: Uuid) -> EngineResult<i64>;

    async fn lock_reputation(&mut self, user_id: Uuid) -> EngineResult<Option<Reputation>>;

    async fn update_reputation(&mut self, reputation: &Reputation) -> EngineResult<()>;

    async fn append_reputation_event(
        &mut self,
        user_id: Uuid,
        event: &NewReputationEvent,
    ) -> EngineResult<ReputationEvent>;

    async fn lock_user(&mut self, user_id: Uuid) -> EngineResult<Option<User>>;

    async fn set_user_status(&mut self, user_id: Uuid, status: UserStatus) -> EngineResult<()>;

    async fn commit(self: Box<Self>) -> EngineResult<()>;
}
