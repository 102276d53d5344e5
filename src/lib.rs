// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! TasteTrek backend: tiered entitlements and dual-backend collection sync.
//!
//! This crate decides, per call, whether a user's mutable collections are
//! backed by the device-scoped local store or the server-authoritative
//! remote store, resolves feature and quota access from the subscription
//! tier, and reconciles tier state against billing-provider webhooks.

pub mod config;
pub mod db;
pub mod entitlements;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{FirestoreDb, LocalStore};
use services::{CollectionFacade, GuestService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub local: LocalStore,
    pub guests: GuestService,
    pub facade: CollectionFacade,
}

impl AppState {
    /// Wire the stores, guest manager, and facade together.
    pub fn new(config: Config, db: FirestoreDb) -> Self {
        let local = LocalStore::new();
        let guests = GuestService::new(local.clone(), db.clone());
        let facade = CollectionFacade::new(local.clone(), db.clone(), guests.clone());
        Self {
            config,
            db,
            local,
            guests,
            facade,
        }
    }
}
