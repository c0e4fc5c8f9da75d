//! In-process store
//!
//! A unit of work holds the store's mutex for its whole lifetime and edits a
//! private copy of the state. `commit` publishes the copy; dropping the unit
//! of work throws it away. Waiting for the mutex is bounded by the lock
//! timeout, after which the caller gets `ConcurrencyConflict`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, UnitOfWork};
use crate::error::{EngineError, EngineResult};
use crate::loan::{Loan, LoanStatus, Repayment};
use crate::models::{User, UserStatus};
use crate::reputation::{NewReputationEvent, Reputation, ReputationEvent};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    loans: HashMap<Uuid, Loan>,
    repayments: Vec<Repayment>,
    reputations: HashMap<Uuid, Reputation>,
    /// Append-only, in commit order
    events: Vec<ReputationEvent>,
    next_event_id: i64,
}

/// Store kept in memory, shared by cloning
#[derive(Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
}

impl MemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            lock_timeout,
        }
    }

    async fn read(&self) -> EngineResult<MutexGuard<'_, MemoryState>> {
        tokio::time::timeout(self.lock_timeout, self.state.lock())
            .await
            .map_err(|_| lock_timed_out(self.lock_timeout))
    }

    /// Register a user together with their reputation row
    pub async fn insert_user(&self, user: User, reputation: Option<Reputation>) -> EngineResult<()> {
        let mut state = self.read().await?;
        if let Some(reputation) = reputation {
            state.reputations.insert(reputation.user_id, reputation);
        }
        state.users.insert(user.id, user);
        Ok(())
    }

    /// Hand a loan over from the origination side
    pub async fn insert_loan(&self, loan: Loan) -> EngineResult<()> {
        let mut state = self.read().await?;
        if !state.users.contains_key(&loan.user_id) {
            return Err(EngineError::NotFound(format!("User {} not found", loan.user_id)));
        }
        state.loans.insert(loan.id, loan);
        Ok(())
    }

    pub async fn repayments(&self, loan_id: Uuid) -> EngineResult<Vec<Repayment>> {
        let state = self.read().await?;
        Ok(state.repayments_for(loan_id))
    }
}

impl MemoryState {
    fn repayments_for(&self, loan_id: Uuid) -> Vec<Repayment> {
        let mut repayments: Vec<Repayment> = self
            .repayments
            .iter()
            .filter(|r| r.loan_id == loan_id)
            .cloned()
            .collect();
        repayments.sort_by_key(|r| r.paid_at);
        repayments
    }
}

fn lock_timed_out(timeout: Duration) -> EngineError {
    EngineError::ConcurrencyConflict(format!(
        "Could not acquire store lock within {}ms",
        timeout.as_millis()
    ))
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> EngineResult<Box<dyn UnitOfWork>> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| lock_timed_out(self.lock_timeout))?;
        let working = (*guard).clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }

    async fn user(&self, user_id: Uuid) -> EngineResult<Option<User>> {
        Ok(self.read().await?.users.get(&user_id).cloned())
    }

    async fn loan(&self, loan_id: Uuid) -> EngineResult<Option<Loan>> {
        Ok(self.read().await?.loans.get(&loan_id).cloned())
    }

    async fn reputation(&self, user_id: Uuid) -> EngineResult<Option<Reputation>> {
        Ok(self.read().await?.reputations.get(&user_id).cloned())
    }

    async fn reputation_history(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> EngineResult<Vec<ReputationEvent>> {
        let state = self.read().await?;
        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .events
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn overdue_loan_ids(&self, now: DateTime<Utc>) -> EngineResult<Vec<Uuid>> {
        let state = self.read().await?;
        let mut overdue: Vec<&Loan> = state
            .loans
            .values()
            .filter(|l| l.status == LoanStatus::Active && l.due_at.is_some_and(|due| due < now))
            .collect();
        overdue.sort_by_key(|l| l.due_at);
        Ok(overdue.into_iter().map(|l| l.id).collect())
    }

    async fn ping(&self) -> EngineResult<()> {
        self.read().await.map(|_| ())
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_loan(&mut self, loan_id: Uuid) -> EngineResult<Option<Loan>> {
        Ok(self.working.loans.get(&loan_id).cloned())
    }

    async fn repayments_for_loan(&mut self, loan_id: Uuid) -> EngineResult<Vec<Repayment>> {
        Ok(self.working.repayments_for(loan_id))
    }

    async fn insert_repayment(&mut self, repayment: &Repayment) -> EngineResult<()> {
        if !self.working.loans.contains_key(&repayment.loan_id) {
            return Err(EngineError::NotFound(format!(
                "Loan {} not found",
                repayment.loan_id
            )));
        }
        self.working.repayments.push(repayment.clone());
        Ok(())
    }

    async fn update_loan(&mut self, loan: &Loan) -> EngineResult<()> {
        let stored = self
            .working
            .loans
            .get_mut(&loan.id)
            .ok_or_else(|| EngineError::NotFound(format!("Loan {} not found", loan.id)))?;
        stored.due_at = loan.due_at;
        stored.partial_extension_used = loan.partial_extension_used;
        stored.status = loan.status;
        stored.late_days = loan.late_days;
        stored.updated_at = Utc::now();
        Ok(())
    }

    async fn count_active_loans(&mut self, user_id: Uuid) -> EngineResult<i64> {
        let count = self
            .working
            .loans
            .values()
            .filter(|l| l.user_id == user_id && l.status == LoanStatus::Active)
            .count();
        Ok(count as i64)
    }

    async fn lock_reputation(&mut self, user_id: Uuid) -> EngineResult<Option<Reputation>> {
        Ok(self.working.reputations.get(&user_id).cloned())
    }

    async fn update_reputation(&mut self, reputation: &Reputation) -> EngineResult<()> {
        let stored = self
            .working
            .reputations
            .get_mut(&reputation.user_id)
            .ok_or_else(|| {
                EngineError::NotFound(format!(
                    "Reputation for user {} not found",
                    reputation.user_id
                ))
            })?;
        *stored = reputation.clone();
        Ok(())
    }

    async fn append_reputation_event(
        &mut self,
        user_id: Uuid,
        event: &NewReputationEvent,
    ) -> EngineResult<ReputationEvent> {
        self.working.next_event_id += 1;
        let stored = ReputationEvent {
            id: self.working.next_event_id,
            user_id,
            event_type: event.event_type,
            delta: event.delta,
            previous_score: event.previous_score,
            new_score: event.new_score,
            loan_id: event.loan_id,
            reason: event.reason.clone(),
            created_at: Utc::now(),
        };
        self.working.events.push(stored.clone());
        Ok(stored)
    }

    async fn lock_user(&mut self, user_id: Uuid) -> EngineResult<Option<User>> {
        Ok(self.working.users.get(&user_id).cloned())
    }

    async fn set_user_status(&mut self, user_id: Uuid, status: UserStatus) -> EngineResult<()> {
        let user = self
            .working
            .users
            .get_mut(&user_id)
            .ok_or_else(|| EngineError::NotFound(format!("User {} not found", user_id)))?;
        user.status = status;
        user.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> EngineResult<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
