//! End-to-end tests for the order lifecycle state machine: the happy path,
//! illegal transitions, write protection of the lifecycle columns, and the
//! concurrency guarantee on duplicate transitions.

mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use common::{assert_json, TestApp};
use framery_api::errors::ServiceError;
use serde_json::{json, Value};
use uuid::Uuid;

fn order_payload(frame_id: Uuid) -> Value {
    json!({
        "customer_name": "Grace Hopper",
        "customer_email": "grace@example.com",
        "description": "Maple frame for a 30x40 chart",
        "price": "120.50",
        "frame_id": frame_id
    })
}

async fn create_order(app: &TestApp, frame_id: Uuid) -> Value {
    let response = app
        .request(Method::POST, "/api/v1/orders", Some(order_payload(frame_id)))
        .await;
    let body = assert_json(response, StatusCode::CREATED).await;
    body["data"].clone()
}

fn parse_ts(value: &Value) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value.as_str().expect("timestamp string"))
        .expect("rfc3339 timestamp")
        .with_timezone(&Utc)
}

#[tokio::test]
async fn new_orders_start_with_null_lifecycle_fields() {
    let app = TestApp::new().await;
    let frame = app.seed_frame("Maple 20mm", None).await;

    let order = create_order(&app, frame.id).await;

    assert_eq!(order["state"], "new");
    assert!(order["paid_for_on"].is_null());
    assert!(order["completed_on"].is_null());
    assert_eq!(order["version"], 1);
}

#[tokio::test]
async fn full_lifecycle_pay_then_complete() {
    let app = TestApp::new().await;
    let frame = app.seed_frame("Walnut 25mm", None).await;
    let order = create_order(&app, frame.id).await;
    let id = order["id"].as_str().unwrap();

    // Pay: state advances and paid_for_on is stamped; completed_on untouched.
    let response = app
        .request(Method::POST, &format!("/api/v1/orders/{id}/pay"), None)
        .await;
    let paid = assert_json(response, StatusCode::OK).await;
    assert_eq!(paid["data"]["state"], "paid");
    assert!(!paid["data"]["paid_for_on"].is_null());
    assert!(paid["data"]["completed_on"].is_null());
    let paid_for_on = parse_ts(&paid["data"]["paid_for_on"]);

    // Complete: terminal state, completed_on stamped no earlier than payment.
    let response = app
        .request(Method::POST, &format!("/api/v1/orders/{id}/complete"), None)
        .await;
    let completed = assert_json(response, StatusCode::OK).await;
    assert_eq!(completed["data"]["state"], "completed");
    assert!(!completed["data"]["completed_on"].is_null());

    let completed_on = parse_ts(&completed["data"]["completed_on"]);
    assert!(completed_on >= paid_for_on);
    assert!(completed_on <= Utc::now());

    // paid_for_on was set exactly once and survived the second transition.
    assert_eq!(
        parse_ts(&completed["data"]["paid_for_on"]),
        paid_for_on
    );
}

#[tokio::test]
async fn complete_from_new_is_rejected() {
    let app = TestApp::new().await;
    let frame = app.seed_frame("Oak 15mm", None).await;
    let order = create_order(&app, frame.id).await;
    let id = order["id"].as_str().unwrap();

    let response = app
        .request(Method::POST, &format!("/api/v1/orders/{id}/complete"), None)
        .await;
    let body = assert_json(response, StatusCode::CONFLICT).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("Cannot complete an order in state 'new'"));

    // The order is left completely unmodified.
    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{id}"), None)
        .await;
    let fetched = assert_json(response, StatusCode::OK).await;
    assert_eq!(fetched["data"]["state"], "new");
    assert!(fetched["data"]["completed_on"].is_null());
    assert_eq!(fetched["data"]["version"], 1);
}

#[tokio::test]
async fn double_pay_is_rejected_and_timestamp_unchanged() {
    let app = TestApp::new().await;
    let frame = app.seed_frame("Cherry 20mm", None).await;
    let order = create_order(&app, frame.id).await;
    let id = order["id"].as_str().unwrap();

    let response = app
        .request(Method::POST, &format!("/api/v1/orders/{id}/pay"), None)
        .await;
    let first = assert_json(response, StatusCode::OK).await;
    let first_paid_on = first["data"]["paid_for_on"].clone();
    assert!(!first_paid_on.is_null());

    let response = app
        .request(Method::POST, &format!("/api/v1/orders/{id}/pay"), None)
        .await;
    assert_json(response, StatusCode::CONFLICT).await;

    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{id}"), None)
        .await;
    let fetched = assert_json(response, StatusCode::OK).await;
    assert_eq!(fetched["data"]["state"], "paid");
    assert_eq!(fetched["data"]["paid_for_on"], first_paid_on);
}

#[tokio::test]
async fn concurrent_pays_have_exactly_one_winner() {
    let app = TestApp::new().await;
    let frame = app.seed_frame("Ash 30mm", None).await;
    let order = create_order(&app, frame.id).await;
    let id: Uuid = order["id"].as_str().unwrap().parse().unwrap();

    let lifecycle = app.state.services.lifecycle.clone();
    let (a, b) = tokio::join!(lifecycle.pay(id), lifecycle.pay(id));

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent pay must win");

    let loser = if a.is_err() { a } else { b };
    assert!(matches!(
        loser,
        Err(ServiceError::InvalidTransition { .. })
    ));

    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{id}"), None)
        .await;
    let fetched = assert_json(response, StatusCode::OK).await;
    assert_eq!(fetched["data"]["state"], "paid");
    assert!(!fetched["data"]["paid_for_on"].is_null());
    assert_eq!(fetched["data"]["version"], 2);
}

#[tokio::test]
async fn generic_update_cannot_touch_lifecycle_fields() {
    let app = TestApp::new().await;
    let frame = app.seed_frame("Pine 10mm", None).await;
    let order = create_order(&app, frame.id).await;
    let id = order["id"].as_str().unwrap();

    // A payload smuggling every protected field alongside a legitimate edit.
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{id}"),
            Some(json!({
                "description": "Now with conservation glass",
                "state": "completed",
                "paid_for_on": "2024-01-01T00:00:00Z",
                "completed_on": "2024-01-02T00:00:00Z"
            })),
        )
        .await;
    let updated = assert_json(response, StatusCode::OK).await;

    // The legitimate edit landed; the protected fields did not move.
    assert_eq!(updated["data"]["description"], "Now with conservation glass");
    assert_eq!(updated["data"]["state"], "new");
    assert!(updated["data"]["paid_for_on"].is_null());
    assert!(updated["data"]["completed_on"].is_null());

    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{id}"), None)
        .await;
    let fetched = assert_json(response, StatusCode::OK).await;
    assert_eq!(fetched["data"]["state"], "new");
    assert!(fetched["data"]["paid_for_on"].is_null());
    assert!(fetched["data"]["completed_on"].is_null());
}

#[tokio::test]
async fn create_rejects_missing_required_fields() {
    let app = TestApp::new().await;
    let frame = app.seed_frame("Birch 12mm", None).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "customer_name": "",
                "customer_email": "not-an-email",
                "description": "Something",
                "price": "10.00",
                "frame_id": frame.id
            })),
        )
        .await;
    let body = assert_json(response, StatusCode::BAD_REQUEST).await;

    let message = body["message"].as_str().unwrap();
    assert!(message.contains("customer_name"));
    assert!(message.contains("customer_email"));
}

#[tokio::test]
async fn create_rejects_unknown_frame() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(order_payload(Uuid::new_v4())),
        )
        .await;
    let body = assert_json(response, StatusCode::BAD_REQUEST).await;
    assert!(body["message"].as_str().unwrap().contains("frame_id"));
}

#[tokio::test]
async fn update_rejects_unknown_assignee() {
    let app = TestApp::new().await;
    let frame = app.seed_frame("Elm 18mm", None).await;
    let order = create_order(&app, frame.id).await;
    let id = order["id"].as_str().unwrap();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/orders/{id}"),
            Some(json!({ "assigned_to": Uuid::new_v4() })),
        )
        .await;
    let body = assert_json(response, StatusCode::BAD_REQUEST).await;
    assert!(body["message"].as_str().unwrap().contains("assigned_to"));
}

#[tokio::test]
async fn transitions_on_missing_orders_return_not_found() {
    let app = TestApp::new().await;
    let missing = Uuid::new_v4();

    for uri in [
        format!("/api/v1/orders/{missing}/pay"),
        format!("/api/v1/orders/{missing}/complete"),
    ] {
        let response = app.request(Method::POST, &uri, None).await;
        assert_json(response, StatusCode::NOT_FOUND).await;
    }

    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{missing}"), None)
        .await;
    assert_json(response, StatusCode::NOT_FOUND).await;
}
