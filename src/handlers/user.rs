//! User eligibility and unblock handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::models::ApiResponse;
use crate::reputation::BlockingGate;

#[derive(Debug, Serialize)]
pub struct EligibilityResponse {
    pub user_id: Uuid,
    pub eligible: bool,
}

#[derive(Debug, Serialize)]
pub struct UnblockResponse {
    pub user_id: Uuid,
    pub unblocked: bool,
}

/// GET /api/users/:user_id/eligibility - Whether a new loan may be originated
pub async fn get_eligibility(
    State(gate): State<Arc<BlockingGate>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<EligibilityResponse>>> {
    let eligible = gate.is_eligible(user_id).await?;
    Ok(Json(ApiResponse::ok(EligibilityResponse { user_id, eligible })))
}

/// POST /api/users/:user_id/unblock - Lift a block once no loan is active
pub async fn unblock_user(
    State(gate): State<Arc<BlockingGate>>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<UnblockResponse>>> {
    let unblocked = gate.attempt_unblock(user_id).await?;
    Ok(Json(ApiResponse::ok(UnblockResponse { user_id, unblocked })))
}
