//! Borrowing eligibility and the unblock transition

use std::sync::Arc;
use uuid::Uuid;

use super::model::{NewReputationEvent, ReputationEventType};
use crate::error::{EngineError, EngineResult};
use crate::models::UserStatus;
use crate::store::Store;

#[derive(Clone)]
pub struct BlockingGate {
    store: Arc<dyn Store>,
}

impl BlockingGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Whether the origination path may open a new loan for this user
    pub async fn is_eligible(&self, user_id: Uuid) -> EngineResult<bool> {
        let user = self
            .store
            .user(user_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("User {} not found", user_id)))?;
        Ok(user.status != UserStatus::Blocked)
    }

    /// Move a blocked user back to ACTIVE.
    ///
    /// Returns `false` without writing anything when the user is not blocked
    /// or still has an ACTIVE loan. The score is left as it is.
    pub async fn attempt_unblock(&self, user_id: Uuid) -> EngineResult<bool> {
        let mut uow = self.store.begin().await?;

        let reputation = uow.lock_reputation(user_id).await?;
        let user = match uow.lock_user(user_id).await? {
            Some(user) => user,
            None => {
                tracing::debug!(user_id = %user_id, "Unblock skipped: user not found");
                return Ok(false);
            }
        };

        if user.status != UserStatus::Blocked {
            tracing::debug!(user_id = %user_id, status = ?user.status, "Unblock skipped: user not blocked");
            return Ok(false);
        }

        let active_loans = uow.count_active_loans(user_id).await?;
        if active_loans > 0 {
            tracing::info!(
                user_id = %user_id,
                active_loans,
                "Unblock refused: active loans outstanding"
            );
            return Ok(false);
        }

        let reputation = match reputation {
            Some(reputation) => reputation,
            None => {
                tracing::warn!(user_id = %user_id, "Unblock skipped: blocked user has no reputation");
                return Ok(false);
            }
        };

        uow.set_user_status(user_id, UserStatus::Active).await?;
        uow.append_reputation_event(
            user_id,
            &NewReputationEvent {
                event_type: ReputationEventType::Unblock,
                delta: 0,
                previous_score: reputation.score,
                new_score: reputation.score,
                loan_id: None,
                reason: "Account unblocked".to_string(),
            },
        )
        .await?;
        uow.commit().await?;

        tracing::info!(user_id = %user_id, score = reputation.score, "User unblocked");
        Ok(true)
    }
}
