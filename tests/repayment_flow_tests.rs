//! End-to-end repayment recording against the in-memory store

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

use lendscore_server::error::EngineError;
use lendscore_server::loan::{Loan, LoanStatus};
use lendscore_server::models::{User, UserStatus};
use lendscore_server::repayment::{RepaymentClassification, RepaymentService};
use lendscore_server::reputation::{Reputation, ReputationEventType};
use lendscore_server::store::{MemoryStore, Store};
use uuid::Uuid;

fn due() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
}

struct Fixture {
    store: Arc<MemoryStore>,
    service: RepaymentService,
    user_id: Uuid,
}

impl Fixture {
    async fn new(reputation: Option<i32>) -> Self {
        let store = Arc::new(MemoryStore::new(std::time::Duration::from_secs(2)));
        let user = User::new(Uuid::new_v4());
        let user_id = user.id;
        store
            .insert_user(
                user,
                reputation.map(|score| Reputation::with_score(user_id, score)),
            )
            .await
            .unwrap();
        let service = RepaymentService::new(store.clone());
        Self {
            store,
            service,
            user_id,
        }
    }

    async fn loan(&self, amount: i64) -> Uuid {
        let loan = Loan::new_active(self.user_id, amount, due());
        let loan_id = loan.id;
        self.store.insert_loan(loan).await.unwrap();
        loan_id
    }
}

// ============================================================================
// Full repayments
// ============================================================================

#[tokio::test]
async fn test_early_full_repayment_closes_loan() {
    let fx = Fixture::new(Some(50)).await;
    let loan_id = fx.loan(1000).await;

    let receipt = fx
        .service
        .record_repayment(loan_id, 1000, due() - Duration::hours(25))
        .await
        .unwrap();

    assert_eq!(receipt.classification, RepaymentClassification::Early);
    assert_eq!(receipt.late_days, 0);
    assert!(receipt.is_fully_repaid);
    assert!(!receipt.blocked);
    assert_eq!(receipt.extended_due_at, None);

    let loan = fx.store.loan(loan_id).await.unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Repaid);

    let reputation = fx.store.reputation(fx.user_id).await.unwrap().unwrap();
    assert_eq!(reputation.score, 62);

    let history = fx.store.reputation_history(fx.user_id, 10).await.unwrap();
    assert_eq!(history[0].loan_id, Some(loan_id));
}

#[tokio::test]
async fn test_late_repayment_records_late_days() {
    let fx = Fixture::new(Some(50)).await;
    let loan_id = fx.loan(1000).await;

    let receipt = fx
        .service
        .record_repayment(loan_id, 1000, due() + Duration::days(5))
        .await
        .unwrap();

    assert_eq!(receipt.classification, RepaymentClassification::Late);
    assert_eq!(receipt.late_days, 5);

    let loan = fx.store.loan(loan_id).await.unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Repaid);
    assert_eq!(loan.late_days, 5);

    let reputation = fx.store.reputation(fx.user_id).await.unwrap().unwrap();
    assert_eq!(reputation.score, 45);
}

#[tokio::test]
async fn test_two_late_loans_block_the_borrower() {
    let fx = Fixture::new(Some(50)).await;
    let first = fx.loan(1000).await;
    let second = fx.loan(1000).await;

    let receipt = fx
        .service
        .record_repayment(first, 1000, due() + Duration::days(1))
        .await
        .unwrap();
    assert!(!receipt.blocked);

    let receipt = fx
        .service
        .record_repayment(second, 1000, due() + Duration::days(2))
        .await
        .unwrap();
    assert!(receipt.blocked);

    let user = fx.store.user(fx.user_id).await.unwrap().unwrap();
    assert_eq!(user.status, UserStatus::Blocked);
}

#[tokio::test]
async fn test_balance_completed_over_several_payments() {
    let fx = Fixture::new(Some(50)).await;
    let loan_id = fx.loan(1000).await;

    let first = fx
        .service
        .record_repayment(loan_id, 400, due() - Duration::days(5))
        .await
        .unwrap();
    assert_eq!(first.classification, RepaymentClassification::Partial);

    let second = fx
        .service
        .record_repayment(loan_id, 600, due() + Duration::days(1))
        .await
        .unwrap();

    // Due date moved to Jan 18 by the extension, so this is early
    assert_eq!(second.classification, RepaymentClassification::Early);
    assert!(second.is_fully_repaid);

    assert_eq!(fx.store.repayments(loan_id).await.unwrap().len(), 2);
}

// ============================================================================
// Partial payments and the extension
// ============================================================================

#[tokio::test]
async fn test_first_partial_extends_due_date() {
    let fx = Fixture::new(Some(50)).await;
    let loan_id = fx.loan(1000).await;

    let receipt = fx
        .service
        .record_repayment(loan_id, 500, due() - Duration::days(5))
        .await
        .unwrap();

    assert_eq!(receipt.classification, RepaymentClassification::Partial);
    assert!(!receipt.is_fully_repaid);
    assert_eq!(receipt.extended_due_at, Some(due() + Duration::days(3)));

    let loan = fx.store.loan(loan_id).await.unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert!(loan.partial_extension_used);
    assert_eq!(loan.due_at, Some(due() + Duration::days(3)));

    let reputation = fx.store.reputation(fx.user_id).await.unwrap().unwrap();
    assert_eq!(reputation.score, 50);
    assert!(fx
        .store
        .reputation_history(fx.user_id, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_second_partial_escalates_to_late() {
    let fx = Fixture::new(Some(50)).await;
    let loan_id = fx.loan(1000).await;

    fx.service
        .record_repayment(loan_id, 300, due() - Duration::days(5))
        .await
        .unwrap();
    let receipt = fx
        .service
        .record_repayment(loan_id, 300, due() - Duration::days(4))
        .await
        .unwrap();

    assert_eq!(receipt.classification, RepaymentClassification::Late);
    assert_eq!(receipt.late_days, 1);
    assert!(!receipt.is_fully_repaid);
    assert_eq!(receipt.extended_due_at, None);

    let loan = fx.store.loan(loan_id).await.unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.late_days, 1);
    // Extension is spent once
    assert_eq!(loan.due_at, Some(due() + Duration::days(3)));

    let reputation = fx.store.reputation(fx.user_id).await.unwrap().unwrap();
    assert_eq!(reputation.score, 45);
    assert_eq!(reputation.consecutive_late_count, 1);

    let history = fx.store.reputation_history(fx.user_id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].event_type, ReputationEventType::LateRepayment);
}

#[tokio::test]
async fn test_huge_payment_after_partial_settles_loan() {
    let fx = Fixture::new(Some(50)).await;
    let loan_id = fx.loan(1000).await;

    fx.service
        .record_repayment(loan_id, 300, due() - Duration::days(5))
        .await
        .unwrap();
    let receipt = fx
        .service
        .record_repayment(loan_id, i64::MAX, due() - Duration::days(4))
        .await
        .unwrap();

    assert_eq!(receipt.classification, RepaymentClassification::Early);
    assert!(receipt.is_fully_repaid);

    let loan = fx.store.loan(loan_id).await.unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Repaid);
}

#[tokio::test]
async fn test_escalated_partial_uses_actual_lateness() {
    let fx = Fixture::new(Some(50)).await;
    let loan_id = fx.loan(1000).await;

    fx.service
        .record_repayment(loan_id, 300, due() - Duration::days(1))
        .await
        .unwrap();
    // Extended due date is Jan 18 12:00; this is two days past it
    let receipt = fx
        .service
        .record_repayment(loan_id, 100, due() + Duration::days(5))
        .await
        .unwrap();

    assert_eq!(receipt.late_days, 2);
}

// ============================================================================
// Rejections and rollback
// ============================================================================

#[tokio::test]
async fn test_unknown_loan_is_not_found() {
    let fx = Fixture::new(Some(50)).await;

    let err = fx
        .service
        .record_repayment(Uuid::new_v4(), 100, due())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
}

#[tokio::test]
async fn test_repaid_loan_rejects_further_payments() {
    let fx = Fixture::new(Some(50)).await;
    let loan_id = fx.loan(1000).await;

    fx.service
        .record_repayment(loan_id, 1000, due())
        .await
        .unwrap();
    let err = fx
        .service
        .record_repayment(loan_id, 10, due())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::InvalidState(_)));
    assert_eq!(fx.store.repayments(loan_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_non_positive_amount_is_rejected() {
    let fx = Fixture::new(Some(50)).await;
    let loan_id = fx.loan(1000).await;

    for amount in [0, -50] {
        let err = fx
            .service
            .record_repayment(loan_id, amount, due())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidState(_)));
    }
}

#[tokio::test]
async fn test_loan_without_due_date_is_rejected() {
    let fx = Fixture::new(Some(50)).await;
    let mut loan = Loan::new_active(fx.user_id, 1000, due());
    loan.due_at = None;
    let loan_id = loan.id;
    fx.store.insert_loan(loan).await.unwrap();

    let err = fx
        .service
        .record_repayment(loan_id, 1000, due())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
    assert!(fx.store.repayments(loan_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_reputation_rolls_back_everything() {
    let fx = Fixture::new(None).await;
    let loan_id = fx.loan(1000).await;

    let err = fx
        .service
        .record_repayment(loan_id, 1000, due())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));

    let loan = fx.store.loan(loan_id).await.unwrap().unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert!(fx.store.repayments(loan_id).await.unwrap().is_empty());
}
