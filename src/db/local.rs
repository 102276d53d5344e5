// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Device-scoped local store for unauthenticated use.
//!
//! Key-value-backed collections plus guest profiles, scoped by guest id.
//! Mirrors the remote store's CRUD contract so the facade can dispatch to
//! either without the caller noticing. Only the migration manager may
//! destroy a guest's data.

use crate::db::new_doc_id;
use crate::models::{
    collection::natural_key, CollectionItem, CollectionKind, GuestProfile, NewCollectionItem,
    PurchaseIntent,
};
use crate::time_utils::now_ms;
use dashmap::DashMap;
use std::sync::Arc;

/// In-process key-value store for guest-owned state.
#[derive(Clone, Default)]
pub struct LocalStore {
    items: Arc<DashMap<(String, CollectionKind), Vec<CollectionItem>>>,
    profiles: Arc<DashMap<String, GuestProfile>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Guest Profiles ──────────────────────────────────────────

    /// Fetch a guest profile, if one exists.
    pub fn profile(&self, guest_id: &str) -> Option<GuestProfile> {
        self.profiles.get(guest_id).map(|p| p.clone())
    }

    /// Create the profile for `guest_id` if absent, returning a copy.
    pub fn ensure_profile(&self, guest_id: &str) -> GuestProfile {
        self.profiles
            .entry(guest_id.to_string())
            .or_insert_with(|| GuestProfile::new(guest_id.to_string(), now_ms()))
            .clone()
    }

    /// Append a purchase intent without touching other profile fields.
    pub fn push_pending_purchase(&self, guest_id: &str, intent: PurchaseIntent) {
        let mut entry = self
            .profiles
            .entry(guest_id.to_string())
            .or_insert_with(|| GuestProfile::new(guest_id.to_string(), now_ms()));
        entry.pending_purchases.push(intent);
    }

    /// Destroy the guest profile and every collection it owns.
    ///
    /// Called exactly once per guest, after migration confirmed success.
    pub fn purge_guest(&self, guest_id: &str) {
        self.profiles.remove(guest_id);
        for kind in CollectionKind::ALL {
            self.items.remove(&(guest_id.to_string(), kind));
        }
    }

    // ─── Collection Items ────────────────────────────────────────

    pub fn list(&self, guest_id: &str, kind: CollectionKind) -> Vec<CollectionItem> {
        self.items
            .get(&(guest_id.to_string(), kind))
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Add one item; pantry adds merge into an existing item with the same
    /// normalized name instead of duplicating it.
    pub fn add(&self, guest_id: &str, kind: CollectionKind, new_item: NewCollectionItem) -> String {
        self.ensure_profile(guest_id);
        let item = new_item.into_item(kind, new_doc_id(), guest_id.to_string(), now_ms());

        let mut entry = self
            .items
            .entry((guest_id.to_string(), kind))
            .or_default();

        if let Some(key) = natural_key(kind, &item) {
            if let Some(existing) = entry
                .iter_mut()
                .find(|i| natural_key(kind, i).as_deref() == Some(key.as_str()))
            {
                existing.measure = item.measure;
                return existing.id.clone();
            }
        }

        let id = item.id.clone();
        entry.push(item);
        id
    }

    pub fn add_many(
        &self,
        guest_id: &str,
        kind: CollectionKind,
        new_items: Vec<NewCollectionItem>,
    ) -> Vec<String> {
        new_items
            .into_iter()
            .map(|item| self.add(guest_id, kind, item))
            .collect()
    }

    /// Remove an item by id. Returns whether anything was removed.
    pub fn remove(&self, guest_id: &str, kind: CollectionKind, item_id: &str) -> bool {
        let Some(mut entry) = self.items.get_mut(&(guest_id.to_string(), kind)) else {
            return false;
        };
        let before = entry.len();
        entry.retain(|i| i.id != item_id);
        entry.len() != before
    }

    /// Flip an item's checked flag. Returns whether the item was found.
    pub fn toggle_checked(&self, guest_id: &str, kind: CollectionKind, item_id: &str) -> bool {
        let Some(mut entry) = self.items.get_mut(&(guest_id.to_string(), kind)) else {
            return false;
        };
        match entry.iter_mut().find(|i| i.id == item_id) {
            Some(item) => {
                item.checked = !item.checked;
                true
            }
            None => false,
        }
    }

    /// Remove every checked item. Returns the number removed.
    pub fn clear_checked(&self, guest_id: &str, kind: CollectionKind) -> usize {
        let Some(mut entry) = self.items.get_mut(&(guest_id.to_string(), kind)) else {
            return 0;
        };
        let before = entry.len();
        entry.retain(|i| !i.checked);
        before - entry.len()
    }

    /// Remove every item in the collection. Returns the number removed.
    pub fn clear_all(&self, guest_id: &str, kind: CollectionKind) -> usize {
        self.items
            .remove(&(guest_id.to_string(), kind))
            .map(|(_, v)| v.len())
            .unwrap_or(0)
    }
}
