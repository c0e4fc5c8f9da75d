//! Repayment route definitions

use axum::{routing::post, Router};

use crate::handlers::record_repayment;
use crate::state::AppState;

pub fn repayment_routes() -> Router<AppState> {
    Router::new().route("/api/repayments", post(record_repayment))
}
