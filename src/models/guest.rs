// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guest identity accumulated before authentication.
//!
//! The profile holds identity and pending purchase intents; the guest's
//! pending collection data lives in the local store under the same guest
//! id, so every item has exactly one owner at any time.

use crate::models::user::SubscriptionType;
use serde::{Deserialize, Serialize};

/// Anonymous on-device identity. Destroyed (not cleared) after migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestProfile {
    pub guest_id: String,
    pub created_at: i64,
    /// Purchases made while unauthenticated, replayed at migration
    #[serde(default)]
    pub pending_purchases: Vec<PurchaseIntent>,
}

impl GuestProfile {
    pub fn new(guest_id: String, now: i64) -> Self {
        Self {
            guest_id,
            created_at: now,
            pending_purchases: Vec::new(),
        }
    }
}

/// A purchase completed on-device before the user had an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseIntent {
    pub subscription_type: SubscriptionType,
    /// Store transaction id, unique across the system
    pub transaction_id: String,
    pub amount_cents: u32,
    /// Epoch ms
    pub purchase_date: i64,
}
