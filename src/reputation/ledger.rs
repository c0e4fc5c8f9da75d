//! Reputation ledger
//!
//! Applies a repayment classification to a user's reputation row: base
//! delta, late-streak blocking, recovery toward the pre-penalty score, and
//! the clean-streak bonus. The arithmetic lives in [`plan_outcome`], which
//! is pure; [`ReputationLedger`] runs it against a locked row inside a unit
//! of work and writes the new row, the audit events, and the block in one go.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::model::{clamp_score, NewReputationEvent, Reputation, ReputationEvent, ReputationEventType};
use crate::error::{EngineError, EngineResult};
use crate::models::UserStatus;
use crate::repayment::RepaymentClassification;
use crate::store::{Store, UnitOfWork};

pub const EARLY_REPAYMENT_DELTA: i32 = 12;
pub const ON_TIME_REPAYMENT_DELTA: i32 = 10;
pub const LATE_REPAYMENT_DELTA: i32 = -5;

/// Penalty for the late repayment that triggers a block
pub const CONSECUTIVE_LATE_DELTA: i32 = -20;

/// Late streak length that blocks borrowing
pub const BLOCKING_LATE_STREAK: i32 = 2;

/// Clean streak length from which recovery applies
pub const RECOVERY_CLEAN_STREAK: i32 = 2;

/// Clean streak length that earns the bonus
pub const BONUS_CLEAN_STREAK: i32 = 3;

pub const CLEAN_STREAK_BONUS: i32 = 10;

/// Number of events returned by the history read
pub const HISTORY_LIMIT: i64 = 50;

/// Everything a single outcome changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomePlan {
    pub reputation: Reputation,
    /// Primary classification event first, then recovery and bonus
    pub events: Vec<NewReputationEvent>,
    pub blocked: bool,
}

/// What callers see after an outcome is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppliedOutcome {
    pub blocked: bool,
    pub score: i32,
}

/// Compute the effect of `classification` on `current`.
///
/// Returns `None` for PARTIAL: a partial payment that reached the ledger is
/// reputation-neutral and nothing is written.
pub fn plan_outcome(
    current: &Reputation,
    classification: RepaymentClassification,
    late_days: i32,
    loan_id: Option<Uuid>,
) -> Option<OutcomePlan> {
    let previous_score = current.score;
    let mut next = current.clone();
    let mut blocked = false;

    let (score_change, event_type, reason) = match classification {
        RepaymentClassification::Partial => return None,
        RepaymentClassification::Early => {
            next.clean_cycle_count += 1;
            next.consecutive_late_count = 0;
            (
                EARLY_REPAYMENT_DELTA,
                ReputationEventType::EarlyRepayment,
                "Loan repaid early".to_string(),
            )
        }
        RepaymentClassification::OnTime => {
            next.clean_cycle_count += 1;
            next.consecutive_late_count = 0;
            (
                ON_TIME_REPAYMENT_DELTA,
                ReputationEventType::OnTimeRepayment,
                "Loan repaid on time".to_string(),
            )
        }
        RepaymentClassification::Late => {
            next.consecutive_late_count += 1;
            next.clean_cycle_count = 0;

            if next.consecutive_late_count == BLOCKING_LATE_STREAK {
                next.max_score_before_last_penalty = Some(previous_score);
                blocked = true;
                (
                    CONSECUTIVE_LATE_DELTA,
                    ReputationEventType::ConsecutiveLateBlock,
                    format!(
                        "Second consecutive late repayment ({} day(s) late); borrowing suspended",
                        late_days
                    ),
                )
            } else {
                (
                    LATE_REPAYMENT_DELTA,
                    ReputationEventType::LateRepayment,
                    format!("Repayment {} day(s) late", late_days),
                )
            }
        }
    };

    let mut new_score = previous_score + score_change;
    let mut events = Vec::new();

    if score_change != 0 {
        events.push(NewReputationEvent {
            event_type,
            delta: score_change,
            previous_score,
            new_score: clamp_score(new_score),
            loan_id,
            reason,
        });
    }

    if classification.is_clean() {
        let cap = next.max_score_before_last_penalty;

        if let Some(cap) = cap {
            if next.clean_cycle_count >= RECOVERY_CLEAN_STREAK {
                let penalty_amount = (cap - score_after_blocking_penalty(cap)).abs();
                let recovery_amount = penalty_amount / 2;
                let capped = (new_score + recovery_amount).min(cap);
                if capped > new_score {
                    push_raise(
                        &mut events,
                        new_score,
                        capped,
                        loan_id,
                        format!(
                            "Recovery after {} clean repayments, capped at {}",
                            next.clean_cycle_count, cap
                        ),
                    );
                    new_score = capped;
                }
            }
        }

        if next.clean_cycle_count == BONUS_CLEAN_STREAK {
            let candidate = new_score + CLEAN_STREAK_BONUS;
            let capped = cap.map_or(candidate, |cap| candidate.min(cap));
            if capped > new_score {
                push_raise(
                    &mut events,
                    new_score,
                    capped,
                    loan_id,
                    format!("Bonus for {} consecutive clean repayments", BONUS_CLEAN_STREAK),
                );
                new_score = capped;
            }
        }
    }

    next.score = clamp_score(new_score);
    next.updated_at = Utc::now();

    Some(OutcomePlan {
        reputation: next,
        events,
        blocked,
    })
}

/// Score left after the blocking penalty was taken from `score_before`.
fn score_after_blocking_penalty(score_before: i32) -> i32 {
    clamp_score(score_before + CONSECUTIVE_LATE_DELTA)
}

/// Record a recovery-typed raise; skipped when clamping leaves nothing to show.
fn push_raise(
    events: &mut Vec<NewReputationEvent>,
    from: i32,
    to: i32,
    loan_id: Option<Uuid>,
    reason: String,
) {
    let previous_score = clamp_score(from);
    let new_score = clamp_score(to);
    if new_score > previous_score {
        events.push(NewReputationEvent {
            event_type: ReputationEventType::Recovery,
            delta: new_score - previous_score,
            previous_score,
            new_score,
            loan_id,
            reason,
        });
    }
}

/// Owner of every reputation write
#[derive(Clone)]
pub struct ReputationLedger {
    store: Arc<dyn Store>,
}

impl ReputationLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Apply an outcome in its own unit of work.
    pub async fn apply_outcome(
        &self,
        user_id: Uuid,
        classification: RepaymentClassification,
        late_days: i32,
        loan_id: Option<Uuid>,
    ) -> EngineResult<AppliedOutcome> {
        let mut uow = self.store.begin().await?;
        let applied =
            Self::apply_outcome_in(uow.as_mut(), user_id, classification, late_days, loan_id)
                .await?;
        uow.commit().await?;
        Ok(applied)
    }

    /// Apply an outcome inside a unit of work the caller already holds.
    ///
    /// Nothing is visible until the caller commits; an error leaves the unit
    /// of work to be dropped, discarding every write made through it.
    pub async fn apply_outcome_in(
        uow: &mut dyn UnitOfWork,
        user_id: Uuid,
        classification: RepaymentClassification,
        late_days: i32,
        loan_id: Option<Uuid>,
    ) -> EngineResult<AppliedOutcome> {
        let current = uow.lock_reputation(user_id).await?.ok_or_else(|| {
            EngineError::NotFound(format!("Reputation for user {} not found", user_id))
        })?;

        let plan = match plan_outcome(&current, classification, late_days, loan_id) {
            Some(plan) => plan,
            None => {
                tracing::debug!(user_id = %user_id, "Partial outcome leaves reputation unchanged");
                return Ok(AppliedOutcome {
                    blocked: false,
                    score: current.score,
                });
            }
        };

        uow.update_reputation(&plan.reputation).await?;
        for event in &plan.events {
            uow.append_reputation_event(user_id, event).await?;
            if event.event_type == ReputationEventType::Recovery {
                tracing::info!(
                    user_id = %user_id,
                    delta = event.delta,
                    new_score = event.new_score,
                    reason = %event.reason,
                    "Reputation recovery applied"
                );
            }
        }

        if plan.blocked {
            uow.set_user_status(user_id, UserStatus::Blocked).await?;
            tracing::warn!(
                user_id = %user_id,
                loan_id = ?loan_id,
                score = plan.reputation.score,
                "User blocked after consecutive late repayments"
            );
        }

        tracing::info!(
            user_id = %user_id,
            loan_id = ?loan_id,
            classification = ?classification,
            previous_score = current.score,
            new_score = plan.reputation.score,
            events = plan.events.len(),
            "Applied repayment outcome to reputation"
        );

        Ok(AppliedOutcome {
            blocked: plan.blocked,
            score: plan.reputation.score,
        })
    }

    pub async fn get_score(&self, user_id: Uuid) -> EngineResult<Reputation> {
        self.store.reputation(user_id).await?.ok_or_else(|| {
            EngineError::NotFound(format!("Reputation for user {} not found", user_id))
        })
    }

    /// Latest events first, at most `HISTORY_LIMIT`
    pub async fn get_history(&self, user_id: Uuid) -> EngineResult<Vec<ReputationEvent>> {
        self.store.reputation_history(user_id, HISTORY_LIMIT).await
    }
}
