// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guest identity and one-way migration into the remote store.
//!
//! Migration is copy-then-delete: every pending item and purchase is
//! written remotely with a deterministic document id, and the guest
//! profile is destroyed only after all copies confirmed. A retry after a
//! partial failure re-upserts the same documents, so nothing duplicates.
//! Concurrent migration of the same guest is prevented by a per-guest
//! single-flight lock; this is the only cross-store operation that needs
//! one.

use crate::db::{FirestoreDb, LocalStore};
use crate::error::AppError;
use crate::models::collection::natural_key;
use crate::models::{
    CollectionItem, CollectionKind, GuestProfile, NewCollectionItem, PurchaseIntent,
    PurchaseRecord, PurchaseStatus,
};
use crate::time_utils::now_ms;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use ring::rand::{SecureRandom, SystemRandom};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What a completed migration moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSummary {
    /// False when there was no guest profile to migrate (no-op).
    pub migrated: bool,
    pub items_copied: usize,
    pub purchases_linked: usize,
}

impl MigrationSummary {
    fn noop() -> Self {
        Self {
            migrated: false,
            items_copied: 0,
            purchases_linked: 0,
        }
    }
}

/// Guest identity manager and migration coordinator.
#[derive(Clone)]
pub struct GuestService {
    local: LocalStore,
    remote: FirestoreDb,
    /// Per-guest single-flight locks
    migration_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    /// Users whose migration is currently copying (read by the facade)
    in_flight_users: Arc<DashMap<String, String>>,
}

impl GuestService {
    pub fn new(local: LocalStore, remote: FirestoreDb) -> Self {
        Self {
            local,
            remote,
            migration_locks: Arc::new(DashMap::new()),
            in_flight_users: Arc::new(DashMap::new()),
        }
    }

    // ─── Guest Identity ──────────────────────────────────────────

    /// Return the existing profile for `guest_id`, or create one.
    ///
    /// Idempotent: the same id always maps to the same profile until
    /// migration destroys it. With no id, a fresh identity is minted.
    pub fn get_or_create(&self, guest_id: Option<&str>) -> GuestProfile {
        match guest_id {
            Some(id) => self.local.ensure_profile(id),
            None => {
                let rng = SystemRandom::new();
                let mut bytes = [0u8; 12];
                rng.fill(&mut bytes).expect("system RNG unavailable");
                let id = format!("guest-{}", URL_SAFE_NO_PAD.encode(bytes));
                self.local.ensure_profile(&id)
            }
        }
    }

    /// Record a purchase made while unauthenticated, to be replayed at
    /// migration.
    pub fn record_pending_purchase(&self, guest_id: &str, intent: PurchaseIntent) {
        tracing::info!(
            guest_id,
            transaction_id = %intent.transaction_id,
            "Recorded pending guest purchase"
        );
        self.local.push_pending_purchase(guest_id, intent);
    }

    /// Merge pending collection data into the guest's local collections.
    pub fn record_pending_data(
        &self,
        guest_id: &str,
        kind: CollectionKind,
        items: Vec<NewCollectionItem>,
    ) -> Vec<String> {
        self.local.add_many(guest_id, kind, items)
    }

    /// Whether a migration targeting `user_id` is currently copying.
    pub fn migration_in_flight(&self, user_id: &str) -> bool {
        self.in_flight_users.contains_key(user_id)
    }

    // ─── Migration ───────────────────────────────────────────────

    /// Move everything the guest accumulated into the remote store under
    /// `user_id`, then destroy the guest profile.
    ///
    /// Calling again after success is a no-op (the profile is gone);
    /// calling while another migration of the same guest runs fails with
    /// `MigrationInProgress`; calling after a mid-copy failure retries
    /// safely.
    pub async fn migrate(
        &self,
        guest_id: &str,
        user_id: &str,
    ) -> Result<MigrationSummary, AppError> {
        let lock = self
            .migration_locks
            .entry(guest_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock
            .try_lock_owned()
            .map_err(|_| AppError::MigrationInProgress)?;

        let Some(profile) = self.local.profile(guest_id) else {
            tracing::debug!(guest_id, "No guest profile to migrate (no-op)");
            return Ok(MigrationSummary::noop());
        };

        if self.remote.get_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        self.in_flight_users
            .insert(user_id.to_string(), guest_id.to_string());
        let result = self.copy_to_remote(&profile, user_id).await;
        self.in_flight_users.remove(user_id);

        match result {
            Ok(summary) => {
                // Delete only after every copy confirmed.
                self.local.purge_guest(guest_id);
                tracing::info!(
                    guest_id,
                    user_id,
                    items = summary.items_copied,
                    purchases = summary.purchases_linked,
                    "Guest migration complete"
                );
                Ok(summary)
            }
            Err(e) => {
                tracing::warn!(guest_id, user_id, error = %e, "Guest migration failed mid-copy");
                Err(AppError::MigrationFailed(e.to_string()))
            }
        }
    }

    /// Copy phase: collections first, then purchase replay.
    async fn copy_to_remote(
        &self,
        profile: &GuestProfile,
        user_id: &str,
    ) -> Result<MigrationSummary, AppError> {
        let mut items_copied = 0;

        for kind in CollectionKind::ALL {
            let local_items = self.local.list(&profile.guest_id, kind);
            if local_items.is_empty() {
                continue;
            }

            // Skip items whose natural key already exists remotely
            // (e.g. a pantry ingredient the account already has).
            let existing_keys: HashSet<String> = match kind {
                CollectionKind::Pantry | CollectionKind::Favorites => self
                    .remote
                    .list_items(kind, user_id)
                    .await?
                    .iter()
                    .filter_map(|item| natural_key(kind, item))
                    .collect(),
                _ => HashSet::new(),
            };

            let records: Vec<CollectionItem> = local_items
                .into_iter()
                .filter(|item| {
                    natural_key(kind, item).is_none_or(|key| !existing_keys.contains(&key))
                })
                .map(|item| CollectionItem {
                    // Deterministic id: replays upsert the same document.
                    id: format!("{}_{}", user_id, item.id),
                    owner_id: user_id.to_string(),
                    ..item
                })
                .collect();

            items_copied += records.len();
            self.remote.upsert_items(kind, &records).await?;
        }

        let mut purchases_linked = 0;
        for intent in &profile.pending_purchases {
            if self.replay_purchase(user_id, intent).await? {
                purchases_linked += 1;
            }
        }

        Ok(MigrationSummary {
            migrated: true,
            items_copied,
            purchases_linked,
        })
    }

    /// Link one pending purchase. Returns false if the transaction id was
    /// already recorded (earlier attempt or another device).
    async fn replay_purchase(
        &self,
        user_id: &str,
        intent: &PurchaseIntent,
    ) -> Result<bool, AppError> {
        if self.remote.get_purchase(&intent.transaction_id).await?.is_some() {
            return Ok(false);
        }

        let record = PurchaseRecord {
            transaction_id: intent.transaction_id.clone(),
            user_id: user_id.to_string(),
            subscription_type: intent.subscription_type,
            status: PurchaseStatus::Completed,
            amount_cents: intent.amount_cents,
            currency: "USD".to_string(),
            purchase_date: intent.purchase_date,
        };
        self.remote.upsert_purchase(&record).await?;

        // Extend the subscription window only forward; the tier itself is
        // written when the provider's webhook for this customer arrives.
        let new_end = intent.purchase_date + intent.subscription_type.period_ms();
        if let Some(mut user) = self.remote.get_user(user_id).await? {
            if new_end > user.subscription_end_date.unwrap_or(0) {
                user.subscription_type = intent.subscription_type;
                user.subscription_start_date = Some(intent.purchase_date);
                user.subscription_end_date = Some(new_end);
                user.updated_at = now_ms();
                self.remote.upsert_user(&user).await?;
            }
        }

        Ok(true)
    }

    #[cfg(test)]
    pub(crate) fn hold_lock_for_test(
        &self,
        guest_id: &str,
    ) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = self
            .migration_locks
            .entry(guest_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.try_lock_owned().expect("lock already held")
    }

    #[cfg(test)]
    pub(crate) fn mark_in_flight_for_test(&self, user_id: &str, guest_id: &str) {
        self.in_flight_users
            .insert(user_id.to_string(), guest_id.to_string());
    }
}
