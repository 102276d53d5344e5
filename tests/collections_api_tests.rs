// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guest-scoped collection flows through the HTTP facade (offline: the
//! local store backs everything, the remote mock is never touched).

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

const GUEST: &str = "guest-test-device";

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn guest_get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-guest-id", GUEST)
        .body(Body::empty())
        .unwrap()
}

fn guest_send(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-guest-id", GUEST)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn guest_empty(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-guest-id", GUEST)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_guest_shopping_list_flow() {
    let (app, _) = common::create_test_app();

    // Add three items as a batch.
    let response = app
        .clone()
        .oneshot(guest_send(
            "POST",
            "/api/collections/shopping_list/batch",
            json!({
                "items": [
                    { "name": "eggs", "measure": "12", "recipe_id": "r1", "recipe_name": "Shakshuka" },
                    { "name": "tomatoes", "measure": "4", "recipe_id": "r1", "recipe_name": "Shakshuka" },
                    { "name": "paprika", "measure": "1 tsp", "recipe_id": "r1", "recipe_name": "Shakshuka" }
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let ids = body_json(response).await["ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(ids.len(), 3);

    // List: ready, three unchecked items with their payloads intact.
    let response = app
        .clone()
        .oneshot(guest_get("/api/collections/shopping_list"))
        .await
        .unwrap();
    let listing = body_json(response).await;
    assert_eq!(listing["status"], "ready");
    let items = listing["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|i| i["checked"] == false));
    assert!(items.iter().any(|i| i["name"] == "paprika" && i["measure"] == "1 tsp"));

    // Toggle one, clear checked: exactly that one goes away.
    let response = app
        .clone()
        .oneshot(guest_empty(
            "POST",
            &format!("/api/collections/shopping_list/{}/toggle", ids[0]),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(guest_empty("POST", "/api/collections/shopping_list/clear-checked"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["removed"], 1);

    let response = app
        .clone()
        .oneshot(guest_get("/api/collections/shopping_list"))
        .await
        .unwrap();
    let listing = body_json(response).await;
    let items = listing["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i["id"] != ids[0].as_str()));

    // Clear all.
    let response = app
        .clone()
        .oneshot(guest_empty("DELETE", "/api/collections/shopping_list"))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["removed"], 2);
}

#[tokio::test]
async fn test_pantry_merges_on_normalized_name() {
    let (app, _) = common::create_test_app();

    let response = app
        .clone()
        .oneshot(guest_send(
            "POST",
            "/api/collections/pantry",
            json!({ "name": "Chickpeas", "display_name": "Chickpeas", "measure": "1 can" }),
        ))
        .await
        .unwrap();
    let first_id = body_json(response).await["id"].as_str().unwrap().to_string();

    // Same ingredient, different case: merged, not duplicated.
    let response = app
        .clone()
        .oneshot(guest_send(
            "POST",
            "/api/collections/pantry",
            json!({ "name": "chickpeas", "measure": "2 cans" }),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["id"], first_id.as_str());

    let response = app
        .clone()
        .oneshot(guest_get("/api/collections/pantry"))
        .await
        .unwrap();
    let listing = body_json(response).await;
    let items = listing["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["measure"], "2 cans");
}

#[tokio::test]
async fn test_checked_ops_only_on_shopping_list() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(guest_empty("POST", "/api/collections/pantry/clear-checked"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_rejects_empty_name() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(guest_send(
            "POST",
            "/api/collections/favorites",
            json!({ "name": "  " }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remove_missing_item_is_not_found() {
    let (app, _) = common::create_test_app();

    let response = app
        .oneshot(guest_empty("DELETE", "/api/collections/shopping_list/nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
