// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for billing webhook handling.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

fn webhook_request(auth: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/revenuecat")
        .header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn test_webhook_rejects_missing_secret() {
    let (app, _) = common::create_test_app();

    let event = json!({ "event": { "type": "RENEWAL", "app_user_id": "u1", "product_id": "p", "id": "e1" } });
    let response = app.oneshot(webhook_request(None, event)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_rejects_wrong_secret() {
    let (app, _) = common::create_test_app();

    let event = json!({ "event": { "type": "RENEWAL", "app_user_id": "u1", "product_id": "p", "id": "e1" } });
    let response = app
        .oneshot(webhook_request(Some("wrong_secret"), event))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_drops_payload_without_event() {
    let (app, _) = common::create_test_app();

    // Invalid events are dropped with 200: the provider owns redelivery and
    // must not keep resending garbage.
    let response = app
        .oneshot(webhook_request(
            Some("test_webhook_secret"),
            json!({ "something": "else" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_drops_event_missing_required_fields() {
    let (app, _) = common::create_test_app();

    // No event id.
    let event = json!({ "event": { "type": "RENEWAL", "app_user_id": "u1", "product_id": "p" } });
    let response = app
        .oneshot(webhook_request(Some("test_webhook_secret"), event))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_ignores_unhandled_event_type() {
    let (app, _) = common::create_test_app();

    // The mock db errors on any use; a 200 proves TEST events never reach
    // storage.
    let event = json!({ "event": { "type": "TEST", "app_user_id": "u1", "id": "e1" } });
    let response = app
        .oneshot(webhook_request(Some("test_webhook_secret"), event))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_webhook_storage_failure_returns_5xx() {
    let (app, _) = common::create_test_app();

    // A well-formed event against the erroring mock store: 5xx tells the
    // provider to redeliver (which dedup makes safe).
    let event = json!({
        "event": {
            "type": "INITIAL_PURCHASE",
            "app_user_id": "u1",
            "product_id": "tastetrek_personal_monthly",
            "expiration_at_ms": 1_700_000_000_000_i64,
            "id": "e1"
        }
    });
    let response = app
        .oneshot(webhook_request(Some("test_webhook_secret"), event))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
