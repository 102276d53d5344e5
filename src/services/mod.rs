// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod facade;
pub mod guest;
pub mod quota;
pub mod reconciler;

pub use facade::{CollectionFacade, Listing, Scope};
pub use guest::{GuestService, MigrationSummary};
pub use quota::QuotaStatus;
pub use reconciler::BillingEvent;
