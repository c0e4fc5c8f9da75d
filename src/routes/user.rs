//! User route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{get_eligibility, unblock_user};
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users/:user_id/eligibility", get(get_eligibility))
        .route("/api/users/:user_id/unblock", post(unblock_user))
}
