//! Reputation read handlers

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::ApiResponse;
use crate::reputation::{Reputation, ReputationEvent, ReputationLedger};

/// GET /api/reputation/:user_id - Current score and streak counters
pub async fn get_reputation(
    State(ledger): State<Arc<ReputationLedger>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Reputation>>> {
    let reputation = ledger.get_score(user_id).await?;
    Ok(Json(ApiResponse::ok(reputation)))
}

/// GET /api/reputation/:user_id/history - Audit events, newest first
pub async fn get_reputation_history(
    State(ledger): State<Arc<ReputationLedger>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<ReputationEvent>>>> {
    let history = ledger.get_history(user_id).await?;
    Ok(Json(ApiResponse::ok(history)))
}
