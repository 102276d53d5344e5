// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guest identity routes: id issuance, pending purchase intents, and the
//! migration retry endpoint.

use crate::error::{AppError, Result};
use crate::middleware::auth::{CurrentUser, GUEST_ID_HEADER};
use crate::models::{PurchaseIntent, SubscriptionType};
use crate::time_utils::now_ms;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::HeaderMap,
    routing::post,
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Public guest routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/guest", post(create_guest))
        .route("/api/guest/purchases", post(record_purchase))
}

/// Routes requiring a valid session (middleware applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/guest/migrate", post(migrate))
}

fn guest_id_from(headers: &HeaderMap) -> Result<String> {
    headers
        .get(GUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::BadRequest(format!("Missing {} header", GUEST_ID_HEADER)))
}

#[derive(Deserialize)]
pub struct CreateGuestRequest {
    guest_id: Option<String>,
}

#[derive(Serialize)]
pub struct GuestResponse {
    pub guest_id: String,
    pub created_at: i64,
    pub pending_purchases: usize,
}

/// Mint or echo a guest identity.
///
/// Idempotent: posting an existing id returns the same profile until
/// migration destroys it.
async fn create_guest(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateGuestRequest>,
) -> Result<Json<GuestResponse>> {
    let profile = state.guests.get_or_create(payload.guest_id.as_deref());

    Ok(Json(GuestResponse {
        guest_id: profile.guest_id,
        created_at: profile.created_at,
        pending_purchases: profile.pending_purchases.len(),
    }))
}

#[derive(Deserialize)]
pub struct RecordPurchaseRequest {
    subscription_type: SubscriptionType,
    transaction_id: String,
    amount_cents: u32,
    /// Defaults to now
    purchase_date: Option<i64>,
}

#[derive(Serialize)]
pub struct RecordPurchaseResponse {
    pub success: bool,
    pub pending_purchases: usize,
}

/// Record a purchase made while unauthenticated; it is replayed against
/// the account at migration.
async fn record_purchase(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<RecordPurchaseRequest>,
) -> Result<Json<RecordPurchaseResponse>> {
    let guest_id = guest_id_from(&headers)?;

    if payload.transaction_id.trim().is_empty() {
        return Err(AppError::BadRequest(
            "transaction_id must not be empty".to_string(),
        ));
    }

    state.guests.record_pending_purchase(
        &guest_id,
        PurchaseIntent {
            subscription_type: payload.subscription_type,
            transaction_id: payload.transaction_id,
            amount_cents: payload.amount_cents,
            purchase_date: payload.purchase_date.unwrap_or_else(now_ms),
        },
    );

    let profile = state.guests.get_or_create(Some(&guest_id));
    Ok(Json(RecordPurchaseResponse {
        success: true,
        pending_purchases: profile.pending_purchases.len(),
    }))
}

#[derive(Deserialize)]
pub struct MigrateRequest {
    guest_id: String,
}

#[derive(Serialize)]
pub struct MigrateResponse {
    /// False when there was no guest profile left to migrate
    pub migrated: bool,
    pub items_copied: usize,
    pub purchases_linked: usize,
}

/// Retry endpoint for a migration that did not complete at login.
async fn migrate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<MigrateRequest>,
) -> Result<Json<MigrateResponse>> {
    let summary = state
        .guests
        .migrate(&payload.guest_id, &user.user_id)
        .await?;

    Ok(Json(MigrateResponse {
        migrated: summary.migrated,
        items_copied: summary.items_copied,
        purchases_linked: summary.purchases_linked,
    }))
}
