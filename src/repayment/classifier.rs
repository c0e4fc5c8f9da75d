//! Repayment classification
//!
//! Maps a loan's balance and due date plus an incoming payment to one of
//! PARTIAL, EARLY, ON_TIME or LATE. Pure and deterministic: no clock reads,
//! no storage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::loan::{Loan, Repayment};

/// Payments at or before `due_at - 24h` count as early
pub const EARLY_WINDOW_HOURS: i64 = 24;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Behavioral category of a single repayment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepaymentClassification {
    Partial,
    Early,
    OnTime,
    Late,
}

impl RepaymentClassification {
    /// EARLY and ON_TIME are clean cycles
    pub fn is_clean(&self) -> bool {
        matches!(
            self,
            RepaymentClassification::Early | RepaymentClassification::OnTime
        )
    }
}

/// Result of classifying one payment against a loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RepaymentOutcome {
    pub classification: RepaymentClassification,
    pub late_days: i32,
    pub is_fully_repaid: bool,
}

/// Classify `payment_amount` paid at `paid_at` against `loan` and the
/// repayments already recorded for it.
///
/// A payment smaller than the outstanding balance is PARTIAL whatever its
/// timing. Fails with `InvalidState` when the loan has no due date.
pub fn classify(
    loan: &Loan,
    prior_repayments: &[Repayment],
    payment_amount: i64,
    paid_at: DateTime<Utc>,
) -> EngineResult<RepaymentOutcome> {
    let due_at = loan.due_at.ok_or_else(|| {
        EngineError::InvalidState(format!(
            "Loan {} has no due date; cannot classify repayment",
            loan.id
        ))
    })?;

    let total_previously_repaid = prior_repayments
        .iter()
        .try_fold(0i64, |total, r| total.checked_add(r.amount))
        .ok_or_else(|| {
            EngineError::InvalidState(format!(
                "Repayments recorded for loan {} overflow the amount range",
                loan.id
            ))
        })?;
    let outstanding = loan.amount.saturating_sub(total_previously_repaid);

    // Compared against the remainder so no sum with the payment is formed
    if payment_amount < outstanding {
        return Ok(RepaymentOutcome {
            classification: RepaymentClassification::Partial,
            late_days: 0,
            is_fully_repaid: false,
        });
    }

    let early_threshold = due_at - Duration::hours(EARLY_WINDOW_HOURS);

    let (classification, late_days) = if paid_at <= early_threshold {
        (RepaymentClassification::Early, 0)
    } else if paid_at <= due_at {
        (RepaymentClassification::OnTime, 0)
    } else {
        (RepaymentClassification::Late, days_late(due_at, paid_at))
    };

    Ok(RepaymentOutcome {
        classification,
        late_days,
        is_fully_repaid: true,
    })
}

/// Whole days past `due_at`, rounded up; 0 when paid on or before it.
pub fn days_late(due_at: DateTime<Utc>, paid_at: DateTime<Utc>) -> i32 {
    if paid_at <= due_at {
        return 0;
    }
    let overdue_ms = (paid_at - due_at).num_milliseconds();
    let days = (overdue_ms + MILLIS_PER_DAY - 1) / MILLIS_PER_DAY;
    i32::try_from(days.max(1)).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn loan_due(due_at: Option<DateTime<Utc>>) -> Loan {
        let mut loan = Loan::new_active(Uuid::new_v4(), 1000, Utc::now());
        loan.due_at = due_at;
        loan
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_full_payment_a_day_ahead_is_early() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));
        let outcome = classify(&loan, &[], 1000, at(2026, 1, 14, 11, 0)).unwrap();

        assert_eq!(outcome.classification, RepaymentClassification::Early);
        assert_eq!(outcome.late_days, 0);
        assert!(outcome.is_fully_repaid);
    }

    #[test]
    fn test_exactly_24h_before_due_is_early() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));
        let outcome = classify(&loan, &[], 1000, at(2026, 1, 14, 12, 0)).unwrap();
        assert_eq!(outcome.classification, RepaymentClassification::Early);
    }

    #[test]
    fn test_inside_last_day_is_on_time() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));

        let just_inside = at(2026, 1, 14, 12, 1);
        let outcome = classify(&loan, &[], 1000, just_inside).unwrap();
        assert_eq!(outcome.classification, RepaymentClassification::OnTime);

        let at_due = at(2026, 1, 15, 12, 0);
        let outcome = classify(&loan, &[], 1000, at_due).unwrap();
        assert_eq!(outcome.classification, RepaymentClassification::OnTime);
        assert_eq!(outcome.late_days, 0);
    }

    #[test]
    fn test_five_days_after_due_is_late() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));
        let outcome = classify(&loan, &[], 1000, at(2026, 1, 20, 12, 0)).unwrap();

        assert_eq!(outcome.classification, RepaymentClassification::Late);
        assert_eq!(outcome.late_days, 5);
        assert!(outcome.is_fully_repaid);
    }

    #[test]
    fn test_late_days_round_up() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));

        let one_minute_late = at(2026, 1, 15, 12, 1);
        let outcome = classify(&loan, &[], 1000, one_minute_late).unwrap();
        assert_eq!(outcome.late_days, 1);

        let a_day_and_a_bit = at(2026, 1, 16, 13, 0);
        let outcome = classify(&loan, &[], 1000, a_day_and_a_bit).unwrap();
        assert_eq!(outcome.late_days, 2);
    }

    #[test]
    fn test_days_late_is_zero_on_or_before_due() {
        let due = at(2026, 1, 15, 12, 0);
        assert_eq!(days_late(due, at(2026, 1, 1, 0, 0)), 0);
        assert_eq!(days_late(due, due), 0);
        assert_eq!(days_late(due, at(2026, 1, 18, 12, 0)), 3);
    }

    #[test]
    fn test_short_payment_is_partial_regardless_of_timing() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));

        for paid_at in [at(2026, 1, 10, 12, 0), at(2026, 2, 20, 0, 0)] {
            let outcome = classify(&loan, &[], 500, paid_at).unwrap();
            assert_eq!(outcome.classification, RepaymentClassification::Partial);
            assert_eq!(outcome.late_days, 0);
            assert!(!outcome.is_fully_repaid);
        }
    }

    #[test]
    fn test_prior_repayments_reduce_outstanding() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));
        let prior = vec![
            Repayment::new(loan.id, 300, at(2026, 1, 2, 0, 0)),
            Repayment::new(loan.id, 400, at(2026, 1, 3, 0, 0)),
            Repayment::new(loan.id, 200, at(2026, 1, 4, 0, 0)),
        ];

        let outcome = classify(&loan, &prior, 100, at(2026, 1, 10, 0, 0)).unwrap();
        assert_eq!(outcome.classification, RepaymentClassification::Early);
        assert!(outcome.is_fully_repaid);

        let outcome = classify(&loan, &prior, 99, at(2026, 1, 10, 0, 0)).unwrap();
        assert_eq!(outcome.classification, RepaymentClassification::Partial);
    }

    #[test]
    fn test_overpayment_counts_as_full() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));
        let outcome = classify(&loan, &[], 1500, at(2026, 1, 15, 11, 0)).unwrap();
        assert_eq!(outcome.classification, RepaymentClassification::OnTime);
        assert!(outcome.is_fully_repaid);
    }

    #[test]
    fn test_huge_payment_after_partial_is_full_without_overflow() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));
        let prior = vec![Repayment::new(loan.id, 300, at(2026, 1, 2, 0, 0))];

        let outcome = classify(&loan, &prior, i64::MAX, at(2026, 1, 10, 0, 0)).unwrap();
        assert_eq!(outcome.classification, RepaymentClassification::Early);
        assert!(outcome.is_fully_repaid);
    }

    #[test]
    fn test_overflowing_prior_total_is_invalid_state() {
        let loan = loan_due(Some(at(2026, 1, 15, 12, 0)));
        let prior = vec![
            Repayment::new(loan.id, i64::MAX, at(2026, 1, 2, 0, 0)),
            Repayment::new(loan.id, 1, at(2026, 1, 3, 0, 0)),
        ];

        let err = classify(&loan, &prior, 1, at(2026, 1, 10, 0, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn test_missing_due_date_is_invalid_state() {
        let loan = loan_due(None);
        let err = classify(&loan, &[], 1000, Utc::now()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }

    #[test]
    fn test_is_clean() {
        assert!(RepaymentClassification::Early.is_clean());
        assert!(RepaymentClassification::OnTime.is_clean());
        assert!(!RepaymentClassification::Late.is_clean());
        assert!(!RepaymentClassification::Partial.is_clean());
    }
}
