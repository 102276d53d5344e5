// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Billing records: purchases and the webhook audit log.

use crate::models::user::SubscriptionType;
use serde::{Deserialize, Serialize};

/// Lifecycle of a purchase record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PurchaseStatus {
    /// Transitions are one-directional except `completed -> refunded`.
    pub fn can_transition(self, to: PurchaseStatus) -> bool {
        use PurchaseStatus::*;
        match (self, to) {
            (Pending, Completed) | (Pending, Failed) => true,
            (Completed, Refunded) => true,
            (from, to) => from == to,
        }
    }
}

/// A recorded purchase, keyed by `transaction_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub transaction_id: String,
    pub user_id: String,
    pub subscription_type: SubscriptionType,
    pub status: PurchaseStatus,
    pub amount_cents: u32,
    pub currency: String,
    /// Epoch ms
    pub purchase_date: i64,
}

/// Audit-log entry for a processed billing webhook event.
///
/// Keyed by the provider's event id; existence of the document is the
/// dedup test for at-least-once delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAuditRecord {
    pub event_id: String,
    pub user_id: String,
    pub event_type: String,
    #[serde(default)]
    pub product_id: Option<String>,
    /// What the reconciler did: "applied", "stale", "not_expired", ...
    pub outcome: String,
    pub received_at: i64,
}
