//! HTTP surface tests over the in-memory store

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use lendscore_server::loan::Loan;
use lendscore_server::models::{User, UserStatus};
use lendscore_server::reputation::Reputation;
use lendscore_server::routes::app_router;
use lendscore_server::state::AppState;
use lendscore_server::store::{MemoryStore, Store};

async fn setup(status: UserStatus) -> (Router, Arc<MemoryStore>, Uuid) {
    let store = Arc::new(MemoryStore::new(std::time::Duration::from_secs(2)));
    let mut user = User::new(Uuid::new_v4());
    user.status = status;
    let user_id = user.id;
    store
        .insert_user(user, Some(Reputation::new(user_id)))
        .await
        .unwrap();
    let app = app_router(AppState::new(store.clone()));
    (app, store, user_id)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: String) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_healthy() {
    let (app, _, _) = setup(UserStatus::Active).await;
    let (status, body) = send(app, get("/health".to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_record_repayment_endpoint() {
    let (app, store, user_id) = setup(UserStatus::Active).await;
    let loan = Loan::new_active(user_id, 1000, Utc::now() + Duration::days(7));
    let loan_id = loan.id;
    store.insert_loan(loan).await.unwrap();

    let (status, body) = send(
        app,
        post_json(
            "/api/repayments",
            json!({ "loan_id": loan_id, "amount": 1000 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["classification"], "EARLY");
    assert_eq!(body["data"]["is_fully_repaid"], true);
}

#[tokio::test]
async fn test_zero_amount_fails_validation() {
    let (app, _, _) = setup(UserStatus::Active).await;

    let (status, body) = send(
        app,
        post_json(
            "/api/repayments",
            json!({ "loan_id": Uuid::new_v4(), "amount": 0 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_amount_beyond_cap_fails_validation() {
    let (app, _, _) = setup(UserStatus::Active).await;

    let (status, body) = send(
        app,
        post_json(
            "/api/repayments",
            json!({ "loan_id": Uuid::new_v4(), "amount": i64::MAX }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_loan_returns_404() {
    let (app, _, _) = setup(UserStatus::Active).await;

    let (status, _) = send(
        app,
        post_json(
            "/api/repayments",
            json!({ "loan_id": Uuid::new_v4(), "amount": 10 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_reputation_and_history() {
    let (app, _, user_id) = setup(UserStatus::Active).await;

    let (status, body) = send(app.clone(), get(format!("/api/reputation/{}", user_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["score"], 50);

    let (status, body) = send(app, get(format!("/api/reputation/{}/history", user_id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_eligibility_and_unblock() {
    let (app, store, user_id) = setup(UserStatus::Blocked).await;

    let (status, body) = send(
        app.clone(),
        get(format!("/api/users/{}/eligibility", user_id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["eligible"], false);

    let (status, body) = send(
        app.clone(),
        post_json(&format!("/api/users/{}/unblock", user_id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["unblocked"], true);

    let (_, body) = send(app, get(format!("/api/users/{}/eligibility", user_id))).await;
    assert_eq!(body["data"]["eligible"], true);

    let user = store.user(user_id).await.unwrap().unwrap();
    assert_eq!(user.status, UserStatus::Active);
}

#[tokio::test]
async fn test_responses_carry_request_id_and_security_headers() {
    let (app, _, _) = setup(UserStatus::Active).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-request-id"], "abc-123");
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["cache-control"], "no-store");
}
