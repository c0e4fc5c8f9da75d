//! Repayment API handlers

use axum::{extract::State, Json};
use chrono::Utc;
use std::sync::Arc;
use validator::Validate;

use crate::error::ApiResult;
use crate::loan::RepaymentRequest;
use crate::models::ApiResponse;
use crate::repayment::{RepaymentReceipt, RepaymentService};

/// POST /api/repayments - Record a repayment against a loan
pub async fn record_repayment(
    State(repayment_service): State<Arc<RepaymentService>>,
    Json(request): Json<RepaymentRequest>,
) -> ApiResult<Json<ApiResponse<RepaymentReceipt>>> {
    request.validate()?;

    let paid_at = request.paid_at.unwrap_or_else(Utc::now);
    let receipt = repayment_service
        .record_repayment(request.loan_id, request.amount, paid_at)
        .await?;

    Ok(Json(ApiResponse::ok(receipt)))
}
