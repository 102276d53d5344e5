// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Unified collection facade.
//!
//! One CRUD surface over the four user collections, dispatching each call
//! to the local (guest) or remote (authenticated) store. The scope is
//! resolved per call by the route layer, so sign-in and sign-out are
//! observed on the very next operation without a reload.

use crate::db::{FirestoreDb, LocalStore};
use crate::error::AppError;
use crate::models::{CollectionItem, CollectionKind, NewCollectionItem};
use crate::services::guest::GuestService;

/// Which store owns the caller's collections for this call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Unauthenticated: device-scoped local store
    Guest(String),
    /// Valid session: server-authoritative remote store
    User(String),
}

impl Scope {
    pub fn owner_id(&self) -> &str {
        match self {
            Scope::Guest(id) | Scope::User(id) => id,
        }
    }
}

/// Result of a `list` call.
///
/// `Loading` is distinct from an empty list: it means the remote state is
/// not yet knowable (a migration for this user is still copying), so
/// callers never render a false empty state.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing {
    Loading,
    Ready(Vec<CollectionItem>),
}

/// Facade over the local and remote collection stores.
#[derive(Clone)]
pub struct CollectionFacade {
    local: LocalStore,
    remote: FirestoreDb,
    guests: GuestService,
}

impl CollectionFacade {
    pub fn new(local: LocalStore, remote: FirestoreDb, guests: GuestService) -> Self {
        Self {
            local,
            remote,
            guests,
        }
    }

    pub async fn list(&self, scope: &Scope, kind: CollectionKind) -> Result<Listing, AppError> {
        match scope {
            Scope::Guest(guest_id) => Ok(Listing::Ready(self.local.list(guest_id, kind))),
            Scope::User(user_id) => {
                if self.guests.migration_in_flight(user_id) {
                    return Ok(Listing::Loading);
                }
                Ok(Listing::Ready(self.remote.list_items(kind, user_id).await?))
            }
        }
    }

    pub async fn add(
        &self,
        scope: &Scope,
        kind: CollectionKind,
        item: NewCollectionItem,
    ) -> Result<String, AppError> {
        match scope {
            Scope::Guest(guest_id) => Ok(self.local.add(guest_id, kind, item)),
            Scope::User(user_id) => self.remote.add_item(kind, user_id, item).await,
        }
    }

    /// Add a batch; remotely the batch commits atomically.
    pub async fn add_many(
        &self,
        scope: &Scope,
        kind: CollectionKind,
        items: Vec<NewCollectionItem>,
    ) -> Result<Vec<String>, AppError> {
        match scope {
            Scope::Guest(guest_id) => Ok(self.local.add_many(guest_id, kind, items)),
            Scope::User(user_id) => self.remote.add_items(kind, user_id, items).await,
        }
    }

    pub async fn remove(
        &self,
        scope: &Scope,
        kind: CollectionKind,
        item_id: &str,
    ) -> Result<(), AppError> {
        match scope {
            Scope::Guest(guest_id) => {
                if self.local.remove(guest_id, kind, item_id) {
                    Ok(())
                } else {
                    Err(AppError::NotFound(format!("Item {} not found", item_id)))
                }
            }
            Scope::User(user_id) => self.remote.remove_item(kind, user_id, item_id).await,
        }
    }

    pub async fn toggle_checked(
        &self,
        scope: &Scope,
        kind: CollectionKind,
        item_id: &str,
    ) -> Result<(), AppError> {
        Self::require_checked(kind)?;
        match scope {
            Scope::Guest(guest_id) => {
                if self.local.toggle_checked(guest_id, kind, item_id) {
                    Ok(())
                } else {
                    Err(AppError::NotFound(format!("Item {} not found", item_id)))
                }
            }
            Scope::User(user_id) => {
                self.remote.toggle_item_checked(kind, user_id, item_id).await
            }
        }
    }

    /// Remove every checked item. Returns the number removed.
    pub async fn clear_checked(
        &self,
        scope: &Scope,
        kind: CollectionKind,
    ) -> Result<usize, AppError> {
        Self::require_checked(kind)?;
        match scope {
            Scope::Guest(guest_id) => Ok(self.local.clear_checked(guest_id, kind)),
            Scope::User(user_id) => self.remote.clear_checked(kind, user_id).await,
        }
    }

    /// Remove every item. Returns the number removed.
    pub async fn clear_all(
        &self,
        scope: &Scope,
        kind: CollectionKind,
    ) -> Result<usize, AppError> {
        match scope {
            Scope::Guest(guest_id) => Ok(self.local.clear_all(guest_id, kind)),
            Scope::User(user_id) => self.remote.clear_all(kind, user_id).await,
        }
    }

    fn require_checked(kind: CollectionKind) -> Result<(), AppError> {
        if kind.tracks_checked() {
            Ok(())
        } else {
            Err(AppError::BadRequest(format!(
                "Collection {} does not track checked state",
                kind.as_str()
            )))
        }
    }
}
