// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Usage quota tracking for metered features.
//!
//! Period reset is computed lazily from `(now - anchor) >= period` at read
//! time — no background timer, and the math stays correct across process
//! suspension. These functions are pure over the user record; the atomic
//! server-side read-modify-write lives in
//! [`FirestoreDb::increment_usage`](crate::db::FirestoreDb).

use crate::entitlements::{daily_limit, MeteredFeature};
use crate::error::AppError;
use crate::models::User;
use crate::time_utils::MS_PER_DAY;
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Rolling quota period.
pub const PERIOD_MS: i64 = MS_PER_DAY;

/// Snapshot of a metered feature's quota for one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/lib/generated/")
)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
}

fn period_elapsed(user: &User, now_ms: i64) -> bool {
    now_ms - user.last_usage_reset >= PERIOD_MS
}

/// Count used in the current period, treating an elapsed period as zero.
fn effective_count(user: &User, feature: MeteredFeature, now_ms: i64) -> u32 {
    if period_elapsed(user, now_ms) {
        return 0;
    }
    match feature {
        MeteredFeature::AiRecipes => user.daily_ai_count,
        MeteredFeature::TravelPlanning => user.daily_travel_count,
    }
}

/// Current quota state without mutating anything.
pub fn usage_status(user: &User, feature: MeteredFeature, now_ms: i64) -> QuotaStatus {
    let limit = daily_limit(user.tier, feature);
    let count = effective_count(user, feature, now_ms);
    QuotaStatus {
        allowed: count < limit,
        remaining: limit.saturating_sub(count),
        limit,
    }
}

/// Check-and-increment in one step.
///
/// A limit of zero means the tier is not entitled at all
/// (`UpgradeRequired`); an exhausted limit is `QuotaExceeded`. On success
/// the counters (and, across a period boundary, the anchor) are updated in
/// place for the caller to persist.
pub fn apply_increment(
    user: &mut User,
    feature: MeteredFeature,
    now_ms: i64,
) -> Result<QuotaStatus, AppError> {
    let limit = daily_limit(user.tier, feature);
    if limit == 0 {
        return Err(AppError::UpgradeRequired(feature.as_str()));
    }

    let elapsed = period_elapsed(user, now_ms);
    let count = if elapsed {
        0
    } else {
        effective_count(user, feature, now_ms)
    };

    if count >= limit {
        return Err(AppError::QuotaExceeded {
            feature: feature.as_str(),
            limit,
        });
    }

    if elapsed {
        // Both counters share the anchor; a new period resets them together.
        user.daily_ai_count = 0;
        user.daily_travel_count = 0;
        user.last_usage_reset = now_ms;
    }

    let new_count = count + 1;
    match feature {
        MeteredFeature::AiRecipes => user.daily_ai_count = new_count,
        MeteredFeature::TravelPlanning => user.daily_travel_count = new_count,
    }

    Ok(QuotaStatus {
        allowed: new_count < limit,
        remaining: limit - new_count,
        limit,
    })
}
