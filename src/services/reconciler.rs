// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription reconciler: applies billing-provider webhook events to a
//! user's tier and expiry.
//!
//! Delivery is at-least-once and possibly reordered, so the state machine
//! is written to converge: grants only advance `subscription_end_date`
//! monotonically, downgrades are derived from wall-clock expiry, and the
//! caller dedups event ids against the audit log before applying.
//!
//! This module is pure — it takes the current user state and an event and
//! returns what should change. Storage, dedup, and atomicity live in
//! [`FirestoreDb::apply_billing_event`](crate::db::FirestoreDb).

use crate::models::{SubscriptionType, Tier, User};
use crate::time_utils::MS_PER_DAY;

/// Window granted when a purchase event carries no explicit expiry.
pub const EXPIRY_FALLBACK_MS: i64 = 30 * MS_PER_DAY;

/// Billing event types we act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    InitialPurchase,
    Renewal,
    Uncancellation,
    Cancellation,
    Expiration,
}

impl EventKind {
    /// Parse the provider's type string. Unknown types return `None` and
    /// are ignored upstream.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INITIAL_PURCHASE" => Some(EventKind::InitialPurchase),
            "RENEWAL" => Some(EventKind::Renewal),
            "UNCANCELLATION" => Some(EventKind::Uncancellation),
            "CANCELLATION" => Some(EventKind::Cancellation),
            "EXPIRATION" => Some(EventKind::Expiration),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::InitialPurchase => "INITIAL_PURCHASE",
            EventKind::Renewal => "RENEWAL",
            EventKind::Uncancellation => "UNCANCELLATION",
            EventKind::Cancellation => "CANCELLATION",
            EventKind::Expiration => "EXPIRATION",
        }
    }

    /// Events that grant or extend access.
    pub fn is_grant(self) -> bool {
        matches!(
            self,
            EventKind::InitialPurchase | EventKind::Renewal | EventKind::Uncancellation
        )
    }
}

/// A validated billing event, decoupled from the wire payload.
#[derive(Debug, Clone)]
pub struct BillingEvent {
    /// Provider event id — the dedup key
    pub id: String,
    pub kind: EventKind,
    /// Durable user identity
    pub app_user_id: String,
    /// Present on grant events; tier and period are derived from it
    pub product_id: Option<String>,
    /// Epoch ms
    pub expiration_at_ms: Option<i64>,
    pub original_app_user_id: Option<String>,
}

/// Subscription fields to write when a grant applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionPatch {
    pub tier: Tier,
    pub subscription_type: SubscriptionType,
    pub subscription_end_date: i64,
}

/// Result of evaluating one event against the current user state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Grant: write the patch.
    Applied(SubscriptionPatch),
    /// Subscription over: drop to free/free.
    Downgraded,
    /// Nothing to change; the label names why.
    NoOp(&'static str),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Applied(_) => "applied",
            Outcome::Downgraded => "downgraded",
            Outcome::NoOp(reason) => reason,
        }
    }
}

/// Derive the billing period from the product id, keeping the user's
/// current period when the id names none.
fn derive_subscription_type(product_id: &str, current: SubscriptionType) -> SubscriptionType {
    if product_id.contains("weekly") {
        SubscriptionType::Weekly
    } else if product_id.contains("monthly") {
        SubscriptionType::Monthly
    } else if product_id.contains("yearly") {
        SubscriptionType::Yearly
    } else {
        current
    }
}

/// Derive the tier from the product id. Personal is the fallback for any
/// paid product that does not name pro.
fn derive_tier(product_id: &str) -> Tier {
    if product_id.contains("pro") {
        Tier::Pro
    } else {
        Tier::Personal
    }
}

/// Evaluate one billing event against the user's current subscription.
///
/// Grants apply only if the derived end date is not older than the current
/// one (monotonic advance), which makes out-of-order delivery converge to
/// the in-order result. Cancellation before expiry only disables auto-renew;
/// access persists until the expiry passes, at which point either a late
/// CANCELLATION or the EXPIRATION event downgrades — whichever arrives.
pub fn apply_event(user: &User, event: &BillingEvent, now_ms: i64) -> Outcome {
    match event.kind {
        EventKind::InitialPurchase | EventKind::Renewal | EventKind::Uncancellation => {
            let product_id = event.product_id.as_deref().unwrap_or("");
            let new_end = event
                .expiration_at_ms
                .unwrap_or(now_ms + EXPIRY_FALLBACK_MS);

            if let Some(current_end) = user.subscription_end_date {
                if new_end < current_end {
                    return Outcome::NoOp("stale_expiry");
                }
            }

            Outcome::Applied(SubscriptionPatch {
                tier: derive_tier(product_id),
                subscription_type: derive_subscription_type(product_id, user.subscription_type),
                subscription_end_date: new_end,
            })
        }
        EventKind::Expiration => Outcome::Downgraded,
        EventKind::Cancellation => match event.expiration_at_ms {
            Some(expiry) if now_ms > expiry => Outcome::Downgraded,
            _ => Outcome::NoOp("not_expired"),
        },
    }
}

/// Billing-provider customer id to link, if the user has none yet.
pub fn link_customer_id(user: &User, event: &BillingEvent) -> Option<String> {
    if user.revenuecat_customer_id.is_some() {
        return None;
    }
    event.original_app_user_id.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: i64 = MS_PER_DAY;

    fn test_user(end_date: Option<i64>) -> User {
        let mut user = User::new(
            "u1".to_string(),
            "u1@example.com".to_string(),
            String::new(),
            None,
            0,
        );
        user.subscription_end_date = end_date;
        user
    }

    fn event(kind: EventKind, product: &str, expiry: Option<i64>) -> BillingEvent {
        BillingEvent {
            id: "evt-1".to_string(),
            kind,
            app_user_id: "u1".to_string(),
            product_id: Some(product.to_string()),
            expiration_at_ms: expiry,
            original_app_user_id: None,
        }
    }

    #[test]
    fn test_initial_purchase_derives_tier_and_type() {
        let user = test_user(None);
        let outcome = apply_event(
            &user,
            &event(EventKind::InitialPurchase, "tastetrek_pro_yearly", Some(100 * DAY)),
            0,
        );
        assert_eq!(
            outcome,
            Outcome::Applied(SubscriptionPatch {
                tier: Tier::Pro,
                subscription_type: SubscriptionType::Yearly,
                subscription_end_date: 100 * DAY,
            })
        );
    }

    #[test]
    fn test_non_pro_product_falls_back_to_personal() {
        let user = test_user(None);
        let outcome = apply_event(
            &user,
            &event(EventKind::Renewal, "tastetrek_monthly", Some(40 * DAY)),
            0,
        );
        match outcome {
            Outcome::Applied(patch) => {
                assert_eq!(patch.tier, Tier::Personal);
                assert_eq!(patch.subscription_type, SubscriptionType::Monthly);
            }
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_expiry_uses_fallback_window() {
        let user = test_user(None);
        let now = 5 * DAY;
        let outcome = apply_event(&user, &event(EventKind::InitialPurchase, "personal_weekly", None), now);
        match outcome {
            Outcome::Applied(patch) => {
                assert_eq!(patch.subscription_end_date, now + EXPIRY_FALLBACK_MS);
                assert_eq!(patch.subscription_type, SubscriptionType::Weekly);
            }
            other => panic!("expected Applied, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_order_delivery_converges() {
        // RENEWAL(T2) then INITIAL_PURCHASE(T1), T1 < T2: the stale initial
        // purchase must not roll the end date back.
        let t1 = 30 * DAY;
        let t2 = 60 * DAY;

        let mut user = test_user(None);
        let renewal = event(EventKind::Renewal, "personal_monthly", Some(t2));
        let initial = event(EventKind::InitialPurchase, "personal_monthly", Some(t1));

        // Reordered delivery.
        if let Outcome::Applied(patch) = apply_event(&user, &renewal, 0) {
            user.subscription_end_date = Some(patch.subscription_end_date);
        }
        assert_eq!(apply_event(&user, &initial, 0), Outcome::NoOp("stale_expiry"));
        assert_eq!(user.subscription_end_date, Some(t2));

        // In-order delivery reaches the same final state.
        let mut user2 = test_user(None);
        for evt in [&initial, &renewal] {
            if let Outcome::Applied(patch) = apply_event(&user2, evt, 0) {
                user2.subscription_end_date = Some(patch.subscription_end_date);
            }
        }
        assert_eq!(user2.subscription_end_date, Some(t2));
    }

    #[test]
    fn test_equal_expiry_still_applies() {
        // "Not older" means an equal end date applies, so a redelivered
        // grant that escaped the id dedup is still harmless.
        let user = test_user(Some(30 * DAY));
        let outcome = apply_event(
            &user,
            &event(EventKind::Renewal, "personal_monthly", Some(30 * DAY)),
            0,
        );
        assert!(matches!(outcome, Outcome::Applied(_)));
    }

    #[test]
    fn test_expiration_downgrades_unconditionally() {
        let user = test_user(Some(100 * DAY));
        let outcome = apply_event(&user, &event(EventKind::Expiration, "", None), 0);
        assert_eq!(outcome, Outcome::Downgraded);
    }

    #[test]
    fn test_cancellation_before_expiry_keeps_access() {
        let user = test_user(Some(10 * DAY));
        let outcome = apply_event(
            &user,
            &event(EventKind::Cancellation, "personal_monthly", Some(10 * DAY)),
            5 * DAY,
        );
        assert_eq!(outcome, Outcome::NoOp("not_expired"));
    }

    #[test]
    fn test_cancellation_after_expiry_downgrades() {
        let user = test_user(Some(10 * DAY));
        let outcome = apply_event(
            &user,
            &event(EventKind::Cancellation, "personal_monthly", Some(10 * DAY)),
            11 * DAY,
        );
        assert_eq!(outcome, Outcome::Downgraded);
    }

    #[test]
    fn test_late_cancellation_after_expiration_is_stable() {
        // An EXPIRATION already downgraded the user; a late CANCELLATION
        // re-derives the same free/free state, so ordering cannot diverge.
        let mut user = test_user(Some(10 * DAY));
        user.tier = Tier::Free;
        user.subscription_type = SubscriptionType::Free;

        let outcome = apply_event(
            &user,
            &event(EventKind::Cancellation, "personal_monthly", Some(10 * DAY)),
            20 * DAY,
        );
        assert_eq!(outcome, Outcome::Downgraded);
    }

    #[test]
    fn test_unknown_event_type_is_unparsed() {
        assert_eq!(EventKind::parse("TEST"), None);
        assert_eq!(EventKind::parse("PRODUCT_CHANGE"), None);
        assert_eq!(EventKind::parse("RENEWAL"), Some(EventKind::Renewal));
    }

    #[test]
    fn test_customer_id_linked_once() {
        let mut evt = event(EventKind::InitialPurchase, "personal_monthly", None);
        evt.original_app_user_id = Some("rc-cust-1".to_string());

        let user = test_user(None);
        assert_eq!(link_customer_id(&user, &evt), Some("rc-cust-1".to_string()));

        let mut linked = test_user(None);
        linked.revenuecat_customer_id = Some("rc-cust-1".to_string());
        assert_eq!(link_customer_id(&linked, &evt), None);
    }
}
