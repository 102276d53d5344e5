// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Entitlement and quota routes: profile, usage status, metered-feature
//! increments, and the reward country unlock.

use crate::entitlements::{self, Feature, MeteredFeature};
use crate::error::{AppError, Result};
use crate::middleware::auth::{resolve_scope, CurrentUser};
use crate::models::Tier;
use crate::services::quota::{self, QuotaStatus};
use crate::services::Scope;
use crate::time_utils::now_ms;
use crate::AppState;
use axum::{
    extract::{Json, State},
    http::HeaderMap,
    routing::{get, post},
    Extension, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Public routes (usage status also serves guests).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/usage", get(usage_status))
}

/// Routes requiring a valid session (middleware applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/usage/increment", post(increment_usage))
        .route("/api/countries/unlock", post(unlock_country))
}

// ─── User Profile ────────────────────────────────────────────

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<crate::routes::auth::UserResponse>> {
    let profile = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(crate::routes::auth::UserResponse::from(&profile)))
}

// ─── Usage Status ────────────────────────────────────────────

/// Tier, per-feature entitlements, quota snapshots, and the unlock ledger.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/lib/generated/")
)]
pub struct UsageStatusResponse {
    pub tier: String,
    /// feature name -> allowed, straight from the entitlement matrix
    pub features: BTreeMap<String, bool>,
    pub ai: QuotaStatus,
    pub travel: QuotaStatus,
    pub unlocked_countries: Vec<String>,
}

fn feature_map(tier: Tier) -> BTreeMap<String, bool> {
    Feature::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), entitlements::can_access_feature(tier, *f)))
        .collect()
}

/// Usage status for the caller's scope. Guests get the guest tier's view
/// without a database read.
async fn usage_status(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<UsageStatusResponse>> {
    let scope = resolve_scope(&state, &jar, &headers).await?;

    let response = match scope {
        Scope::Guest(_) => UsageStatusResponse {
            tier: Tier::Guest.as_str().to_string(),
            features: feature_map(Tier::Guest),
            ai: QuotaStatus {
                allowed: false,
                remaining: 0,
                limit: 0,
            },
            travel: QuotaStatus {
                allowed: false,
                remaining: 0,
                limit: 0,
            },
            unlocked_countries: Vec::new(),
        },
        Scope::User(user_id) => {
            let user = state
                .db
                .get_user(&user_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
            let now = now_ms();

            let mut unlocked: Vec<String> = user.unlocked_countries.iter().cloned().collect();
            unlocked.sort();

            UsageStatusResponse {
                tier: user.tier.as_str().to_string(),
                features: feature_map(user.tier),
                ai: quota::usage_status(&user, MeteredFeature::AiRecipes, now),
                travel: quota::usage_status(&user, MeteredFeature::TravelPlanning, now),
                unlocked_countries: unlocked,
            }
        }
    };

    Ok(Json(response))
}

// ─── Metered Features ────────────────────────────────────────

#[derive(Deserialize)]
pub struct IncrementRequest {
    /// "ai_recipes" or "travel_planning"
    feature: String,
}

/// Spend one metered invocation. Fails fast with `UpgradeRequired` or
/// `QuotaExceeded` before any feature work happens.
async fn increment_usage(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<IncrementRequest>,
) -> Result<Json<QuotaStatus>> {
    let feature = MeteredFeature::from_str(&payload.feature)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown feature: {}", payload.feature)))?;

    let status = state.db.increment_usage(&user.user_id, feature).await?;
    Ok(Json(status))
}

// ─── Country Unlock Ledger ───────────────────────────────────

#[derive(Deserialize)]
pub struct UnlockRequest {
    country: String,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/lib/generated/")
)]
pub struct UnlockResponse {
    pub unlocked: bool,
    /// False when the country was already in the ledger (repeat reward
    /// callbacks are expected and harmless)
    pub newly_unlocked: bool,
}

/// Add a reward-unlocked country to the caller's ledger. Idempotent.
async fn unlock_country(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(payload): Json<UnlockRequest>,
) -> Result<Json<UnlockResponse>> {
    let country = payload.country.trim();
    if country.is_empty() {
        return Err(AppError::BadRequest("country must not be empty".to_string()));
    }

    let newly_unlocked = state.db.unlock_country(&user.user_id, country).await?;
    Ok(Json(UnlockResponse {
        unlocked: true,
        newly_unlocked,
    }))
}
