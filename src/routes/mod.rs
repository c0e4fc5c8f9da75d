//! Route definitions for the lending engine API

mod repayment;
mod reputation;
mod user;

use axum::{routing::get, Router};

use crate::handlers::health_check;
use crate::middleware;
use crate::state::AppState;

pub use repayment::repayment_routes;
pub use reputation::reputation_routes;
pub use user::user_routes;

/// Every route plus tracing and security headers; CORS and HSTS are left
/// to the binary since they depend on deployment config.
pub fn app_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(repayment_routes())
        .merge(reputation_routes())
        .merge(user_routes())
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}
