//! Reputation rows and the append-only audit trail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lowest score a user can hold
pub const MIN_SCORE: i32 = 0;

/// Highest score a user can hold
pub const MAX_SCORE: i32 = 100;

/// Score a fresh reputation row starts from
pub const DEFAULT_SCORE: i32 = 50;

/// Per-user reputation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reputation {
    pub user_id: Uuid,
    /// Always within `MIN_SCORE..=MAX_SCORE`
    pub score: i32,
    pub consecutive_late_count: i32,
    pub clean_cycle_count: i32,
    /// Score observed right before the last blocking penalty; caps recovery
    pub max_score_before_last_penalty: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl Reputation {
    pub fn new(user_id: Uuid) -> Self {
        Self::with_score(user_id, DEFAULT_SCORE)
    }

    pub fn with_score(user_id: Uuid, score: i32) -> Self {
        Self {
            user_id,
            score: clamp_score(score),
            consecutive_late_count: 0,
            clean_cycle_count: 0,
            max_score_before_last_penalty: None,
            updated_at: Utc::now(),
        }
    }
}

pub fn clamp_score(score: i32) -> i32 {
    score.clamp(MIN_SCORE, MAX_SCORE)
}

/// Audit event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reputation_event_type", rename_all = "snake_case")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReputationEventType {
    EarlyRepayment,
    OnTimeRepayment,
    PartialRepayment,
    LateRepayment,
    ConsecutiveLateBlock,
    Recovery,
    Unblock,
}

/// Persisted audit event
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ReputationEvent {
    pub id: i64,
    pub user_id: Uuid,
    pub event_type: ReputationEventType,
    pub delta: i32,
    pub previous_score: i32,
    pub new_score: i32,
    pub loan_id: Option<Uuid>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

/// Audit event before it is written
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewReputationEvent {
    pub event_type: ReputationEventType,
    pub delta: i32,
    pub previous_score: i32,
    pub new_score: i32,
    pub loan_id: Option<Uuid>,
    pub reason: String,
}
