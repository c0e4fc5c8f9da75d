//! Reputation route definitions

use axum::{routing::get, Router};

use crate::handlers::{get_reputation, get_reputation_history};
use crate::state::AppState;

pub fn reputation_routes() -> Router<AppState> {
    Router::new()
        .route("/api/reputation/:user_id", get(get_reputation))
        .route("/api/reputation/:user_id/history", get(get_reputation_history))
}
