// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook route for billing provider (RevenueCat) events.
//!
//! This layer is a handler, not a caller: the provider owns redelivery.
//! Invalid payloads and unknown users are logged and dropped with 200 so
//! the provider stops resending garbage; storage failures return 5xx so
//! the provider retries, which the audit-log dedup makes safe.

use crate::db::firestore::EventDisposition;
use crate::services::reconciler::{BillingEvent, EventKind};
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Webhook routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/revenuecat", post(handle_event))
}

/// Wire envelope: `{ "event": { ... } }`.
#[derive(Deserialize, Debug)]
struct WebhookEnvelope {
    event: Option<WireEvent>,
}

/// Loosely-typed wire event; required fields are enforced in
/// [`parse_event`], not by serde, so a missing field is reported as the
/// specific validation failure it is.
#[derive(Deserialize, Debug)]
struct WireEvent {
    #[serde(rename = "type")]
    event_type: Option<String>,
    app_user_id: Option<String>,
    product_id: Option<String>,
    expiration_at_ms: Option<i64>,
    original_app_user_id: Option<String>,
    id: Option<String>,
}

/// Outcome of boundary validation.
#[derive(Debug)]
enum ParsedWebhook {
    Event(BillingEvent),
    /// Type we do not act on (TEST, TRANSFER, ...)
    Ignored(String),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Validate the wire payload into a typed billing event.
fn parse_event(envelope: WebhookEnvelope) -> Result<ParsedWebhook, String> {
    let event = envelope.event.ok_or("missing event object")?;

    let event_type = non_empty(event.event_type).ok_or("missing event type")?;
    let Some(kind) = EventKind::parse(&event_type) else {
        return Ok(ParsedWebhook::Ignored(event_type));
    };

    let id = non_empty(event.id).ok_or("missing event id")?;
    let app_user_id = non_empty(event.app_user_id).ok_or("missing app_user_id")?;
    let product_id = non_empty(event.product_id);

    if kind.is_grant() && product_id.is_none() {
        return Err(format!("missing product_id for {}", kind.as_str()));
    }

    Ok(ParsedWebhook::Event(BillingEvent {
        id,
        kind,
        app_user_id,
        product_id,
        expiration_at_ms: event.expiration_at_ms,
        original_app_user_id: non_empty(event.original_app_user_id),
    }))
}

/// Handle an incoming billing event (POST).
async fn handle_event(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    // Shared-secret check, constant time.
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    let expected = state.config.revenuecat_webhook_secret.as_bytes();
    if !bool::from(provided.as_bytes().ct_eq(expected)) {
        tracing::warn!("Security Alert: Webhook authorization mismatch");
        return StatusCode::UNAUTHORIZED;
    }

    let envelope: WebhookEnvelope = match serde_json::from_value(payload) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!(error = %e, "Failed to parse webhook payload");
            return StatusCode::OK; // Drop; the provider owns redelivery
        }
    };

    let event = match parse_event(envelope) {
        Ok(ParsedWebhook::Event(event)) => event,
        Ok(ParsedWebhook::Ignored(event_type)) => {
            tracing::debug!(event_type = %event_type, "Ignoring unhandled billing event type");
            return StatusCode::OK;
        }
        Err(reason) => {
            tracing::warn!(reason = %reason, "Invalid webhook event dropped");
            return StatusCode::OK;
        }
    };

    match state.db.apply_billing_event(&event).await {
        Ok(EventDisposition::Processed { outcome }) => {
            tracing::info!(event_id = %event.id, outcome, "Webhook event applied");
            StatusCode::OK
        }
        Ok(EventDisposition::Duplicate) | Ok(EventDisposition::UnknownUser) => StatusCode::OK,
        Err(e) => {
            // Storage failure: surface 5xx so the provider redelivers.
            tracing::error!(event_id = %event.id, error = %e, "Failed to apply webhook event");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
