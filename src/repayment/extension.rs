//! One-time due-date extension for partial payments

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::classifier::{RepaymentClassification, RepaymentOutcome};
use crate::error::{EngineError, EngineResult};
use crate::loan::Loan;

/// How far the first partial payment pushes the due date
pub const PARTIAL_EXTENSION_DAYS: i64 = 3;

/// What happens to a PARTIAL outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ExtensionDecision {
    /// First shortfall: move the due date, no reputation effect
    Extend { new_due_at: DateTime<Utc> },
    /// Shortfall after the extension was spent: treat as LATE
    Escalate { late_days: i32 },
}

/// Decide between extension and escalation for a PARTIAL outcome.
pub fn decide(loan: &Loan, outcome: &RepaymentOutcome) -> EngineResult<ExtensionDecision> {
    if outcome.classification != RepaymentClassification::Partial {
        return Err(EngineError::InvalidState(format!(
            "Extension policy only handles partial payments, got {:?}",
            outcome.classification
        )));
    }

    if loan.partial_extension_used {
        return Ok(ExtensionDecision::Escalate {
            late_days: outcome.late_days.max(1),
        });
    }

    let due_at = current_due_at(loan)?;
    Ok(ExtensionDecision::Extend {
        new_due_at: due_at + Duration::days(PARTIAL_EXTENSION_DAYS),
    })
}

/// Spend the loan's single extension and return the new due date.
pub fn apply_extension(loan: &mut Loan) -> EngineResult<DateTime<Utc>> {
    if loan.partial_extension_used {
        return Err(EngineError::InvalidState(format!(
            "Loan {} already used its partial-payment extension",
            loan.id
        )));
    }

    let new_due_at = current_due_at(loan)? + Duration::days(PARTIAL_EXTENSION_DAYS);
    loan.due_at = Some(new_due_at);
    loan.partial_extension_used = true;

    tracing::info!(
        loan_id = %loan.id,
        new_due_at = %new_due_at,
        "Granted one-time partial payment extension"
    );

    Ok(new_due_at)
}

fn current_due_at(loan: &Loan) -> EngineResult<DateTime<Utc>> {
    loan.due_at.ok_or_else(|| {
        EngineError::InvalidState(format!("Loan {} has no due date to extend", loan.id))
    })
}
