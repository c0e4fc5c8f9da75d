//! Repayment service layer - records a repayment and its reputation effect

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::classifier::{classify, days_late, RepaymentClassification, RepaymentOutcome};
use super::extension::{apply_extension, decide, ExtensionDecision};
use crate::error::{EngineError, EngineResult};
use crate::loan::{LoanStatus, Repayment};
use crate::reputation::ReputationLedger;
use crate::store::Store;

/// What a recorded repayment did
#[derive(Debug, Clone, Serialize)]
pub struct RepaymentReceipt {
    pub repayment: Repayment,
    /// LATE for a partial payment escalated after the extension
    pub classification: RepaymentClassification,
    pub late_days: i32,
    pub is_fully_repaid: bool,
    /// Set when this payment spent the loan's one-time extension
    pub extended_due_at: Option<DateTime<Utc>>,
    pub blocked: bool,
}

#[derive(Clone)]
pub struct RepaymentService {
    store: Arc<dyn Store>,
}

impl RepaymentService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Record a repayment against an active loan.
    ///
    /// The repayment row, the loan update and the reputation change commit
    /// together. Any failure, including a missing reputation row, rolls all
    /// of them back.
    pub async fn record_repayment(
        &self,
        loan_id: Uuid,
        amount: i64,
        paid_at: DateTime<Utc>,
    ) -> EngineResult<RepaymentReceipt> {
        if amount <= 0 {
            return Err(EngineError::InvalidState(format!(
                "Repayment amount must be positive, got {}",
                amount
            )));
        }

        let mut uow = self.store.begin().await?;

        let mut loan = uow
            .lock_loan(loan_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Loan {} not found", loan_id)))?;

        match loan.status {
            LoanStatus::Active => {}
            LoanStatus::Repaid => {
                return Err(EngineError::InvalidState(format!(
                    "Loan {} is already repaid",
                    loan_id
                )))
            }
            other => {
                return Err(EngineError::InvalidState(format!(
                    "Loan {} is {:?}; only active loans accept repayments",
                    loan_id, other
                )))
            }
        }

        let prior = uow.repayments_for_loan(loan_id).await?;
        let outcome = classify(&loan, &prior, amount, paid_at)?;

        let repayment = Repayment::new(loan_id, amount, paid_at);
        uow.insert_repayment(&repayment).await?;

        let mut classification = outcome.classification;
        let mut extended_due_at = None;
        let mut late_days = outcome.late_days;
        let mut blocked = false;

        if outcome.classification == RepaymentClassification::Partial {
            // Escalation needs the real lateness of this payment
            let overdue_days = loan.due_at.map_or(0, |due| days_late(due, paid_at));
            let partial = RepaymentOutcome {
                late_days: overdue_days,
                ..outcome
            };

            match decide(&loan, &partial)? {
                ExtensionDecision::Extend { .. } => {
                    extended_due_at = Some(apply_extension(&mut loan)?);
                    uow.update_loan(&loan).await?;
                }
                ExtensionDecision::Escalate { late_days: escalated } => {
                    classification = RepaymentClassification::Late;
                    late_days = escalated;
                    loan.late_days = escalated;
                    uow.update_loan(&loan).await?;

                    tracing::warn!(
                        loan_id = %loan_id,
                        late_days = escalated,
                        "Partial payment after extension escalated to late"
                    );

                    let applied = ReputationLedger::apply_outcome_in(
                        uow.as_mut(),
                        loan.user_id,
                        RepaymentClassification::Late,
                        escalated,
                        Some(loan_id),
                    )
                    .await?;
                    blocked = applied.blocked;
                }
            }
        } else {
            loan.status = LoanStatus::Repaid;
            loan.late_days = outcome.late_days;
            uow.update_loan(&loan).await?;

            let applied = ReputationLedger::apply_outcome_in(
                uow.as_mut(),
                loan.user_id,
                outcome.classification,
                outcome.late_days,
                Some(loan_id),
            )
            .await?;
            blocked = applied.blocked;
        }

        uow.commit().await?;

        tracing::info!(
            loan_id = %loan_id,
            repayment_id = %repayment.id,
            amount,
            classification = ?classification,
            late_days,
            is_fully_repaid = outcome.is_fully_repaid,
            blocked,
            "Repayment recorded"
        );

        Ok(RepaymentReceipt {
            repayment,
            classification,
            late_days,
            is_fully_repaid: outcome.is_fully_repaid,
            extended_due_at,
            blocked,
        })
    }
}
