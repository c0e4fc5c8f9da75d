//! Loan models consumed by the repayment engine
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Loan status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoanStatus {
    Pending,
    Active,
    Repaid,
    Defaulted,
    Liquidated,
}

/// Loan model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Loan {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Principal in minor units, fixed at creation
    pub amount: i64,
    /// Moved at most once, by the partial-payment extension
    pub due_at: Option<DateTime<Utc>>,
    pub partial_extension_used: bool,
    pub status: LoanStatus,
    pub late_days: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// An active loan with no repayments, as the origination flow hands it over
    pub fn new_active(user_id: Uuid, amount: i64, due_at: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            due_at: Some(due_at),
            partial_extension_used: false,
            status: LoanStatus::Active,
            late_days: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Repayment model (immutable once written)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Repayment {
    pub id: Uuid,
    pub loan_id: Uuid,
    pub amount: i64,
    pub paid_at: DateTime<Utc>,
}

impl Repayment {
    pub fn new(loan_id: Uuid, amount: i64, paid_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            amount,
            paid_at,
        }
    }
}

/// Request to record a repayment
#[derive(Debug, Deserialize, Validate)]
pub struct RepaymentRequest {
    pub loan_id: Uuid,
    /// Minor units, capped well below `i64::MAX`
    #[validate(range(min = 1, max = 1000000000000000))]
    pub amount: i64,
    /// Defaults to the time the request is received
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}
