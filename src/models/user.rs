//! User model for storage and API.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Subscription tier governing feature access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Guest,
    Free,
    Personal,
    Pro,
}

impl Tier {
    /// Tiers with an active paid subscription.
    pub fn is_premium(self) -> bool {
        matches!(self, Tier::Personal | Tier::Pro)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Guest => "guest",
            Tier::Free => "free",
            Tier::Personal => "personal",
            Tier::Pro => "pro",
        }
    }
}

/// Billing period of the active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    Free,
    Weekly,
    Monthly,
    Yearly,
}

impl SubscriptionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionType::Free => "free",
            SubscriptionType::Weekly => "weekly",
            SubscriptionType::Monthly => "monthly",
            SubscriptionType::Yearly => "yearly",
        }
    }

    /// Nominal period length, used when a purchase carries no explicit expiry.
    pub fn period_ms(self) -> i64 {
        match self {
            SubscriptionType::Free => 0,
            SubscriptionType::Weekly => 7 * crate::time_utils::MS_PER_DAY,
            SubscriptionType::Monthly => 30 * crate::time_utils::MS_PER_DAY,
            SubscriptionType::Yearly => 365 * crate::time_utils::MS_PER_DAY,
        }
    }
}

/// User profile stored in Firestore.
///
/// `tier`, `subscription_type` and `subscription_end_date` are written on
/// the billing path only by the subscription reconciler; the unlock ledger
/// owns `unlocked_countries`; the quota tracker owns the usage counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Random hex document ID
    pub id: String,
    pub email: String,
    /// PBKDF2 salted hash, `hex(salt)$hex(hash)`
    pub password_hash: String,
    pub name: Option<String>,
    pub tier: Tier,
    pub subscription_type: SubscriptionType,
    /// Epoch ms; None until a first purchase is seen
    #[serde(default)]
    pub subscription_start_date: Option<i64>,
    /// Epoch ms; None means no subscription window recorded
    #[serde(default)]
    pub subscription_end_date: Option<i64>,
    /// Reward-unlocked regions (set semantics, grows monotonically)
    #[serde(default)]
    pub unlocked_countries: HashSet<String>,
    /// Metered-feature counters for the current period
    #[serde(default)]
    pub daily_ai_count: u32,
    #[serde(default)]
    pub daily_travel_count: u32,
    /// Period anchor for the counters above (epoch ms)
    #[serde(default)]
    pub last_usage_reset: i64,
    /// Billing-provider customer id, linked on first webhook
    #[serde(default)]
    pub revenuecat_customer_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    /// Fresh free-tier user with zeroed counters.
    pub fn new(id: String, email: String, password_hash: String, name: Option<String>, now: i64) -> Self {
        Self {
            id,
            email,
            password_hash,
            name,
            tier: Tier::Free,
            subscription_type: SubscriptionType::Free,
            subscription_start_date: None,
            subscription_end_date: None,
            unlocked_countries: HashSet::new(),
            daily_ai_count: 0,
            daily_travel_count: 0,
            last_usage_reset: 0,
            revenuecat_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
