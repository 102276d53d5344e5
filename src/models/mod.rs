// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod billing;
pub mod collection;
pub mod guest;
pub mod session;
pub mod user;

pub use billing::{PurchaseRecord, PurchaseStatus, WebhookAuditRecord};
pub use collection::{CollectionItem, CollectionKind, NewCollectionItem};
pub use guest::{GuestProfile, PurchaseIntent};
pub use session::Session;
pub use user::{SubscriptionType, Tier, User};
