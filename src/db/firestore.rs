// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile, tier, usage counters, unlock ledger)
//! - Sessions (opaque token records, digest-keyed)
//! - Collection items (shopping list, pantry, favorites, history)
//! - Purchases and the billing webhook audit log
//!
//! Multi-document invariants (quota check-and-increment, webhook dedup,
//! bulk adds) are enforced with Firestore transactions.

use crate::db::{collections, new_doc_id};
use crate::entitlements::MeteredFeature;
use crate::error::AppError;
use crate::models::collection::natural_key;
use crate::models::{
    CollectionItem, CollectionKind, NewCollectionItem, PurchaseRecord, Session, User,
    WebhookAuditRecord,
};
use crate::services::quota::{self, QuotaStatus};
use crate::services::reconciler::{self, BillingEvent, Outcome};
use crate::time_utils::now_ms;
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// What happened to an inbound billing event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventDisposition {
    /// Event id already in the audit log; nothing changed.
    Duplicate,
    /// `app_user_id` resolved to no user; the event is dropped.
    UnknownUser,
    /// Event was evaluated and logged; `outcome` names what it did.
    Processed { outcome: &'static str },
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by document id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Look up a user by email (unique by construction at sign-up).
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = email.to_string();
        let matches: Vec<User> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.for_all([q.field("email").eq(email.clone())]))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(matches.into_iter().next())
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Session Operations ──────────────────────────────────────

    /// Store a session under its token digest.
    pub async fn create_session(&self, session: &Session) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SESSIONS)
            .document_id(&session.token_digest)
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Fetch a session by token digest.
    pub async fn get_session(&self, token_digest: &str) -> Result<Option<Session>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(token_digest)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a session (sign-out).
    pub async fn delete_session(&self, token_digest: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::SESSIONS)
            .document_id(token_digest)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Collection Item Operations ──────────────────────────────

    /// List a user's items in one collection, newest first.
    pub async fn list_items(
        &self,
        kind: CollectionKind,
        owner_id: &str,
    ) -> Result<Vec<CollectionItem>, AppError> {
        let owner = owner_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(kind.as_str())
            .filter(move |q| q.for_all([q.field("owner_id").eq(owner.clone())]))
            .order_by([("added_at", firestore::FirestoreQueryDirection::Descending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add a single item. Kinds with a natural key merge into the existing
    /// item instead of duplicating it.
    pub async fn add_item(
        &self,
        kind: CollectionKind,
        owner_id: &str,
        new_item: NewCollectionItem,
    ) -> Result<String, AppError> {
        let mut ids = self.add_items(kind, owner_id, vec![new_item]).await?;
        // add_items returns exactly one id per input item
        ids.pop()
            .ok_or_else(|| AppError::Database("add_items returned no id".to_string()))
    }

    /// Add a batch of items in a single transaction.
    ///
    /// The batch is the unit of atomicity (e.g. adding an entire recipe's
    /// ingredients): either every write commits or none do. Returns one item
    /// id per input, in order; inputs that merged into an existing item
    /// return that item's id.
    pub async fn add_items(
        &self,
        kind: CollectionKind,
        owner_id: &str,
        new_items: Vec<NewCollectionItem>,
    ) -> Result<Vec<String>, AppError> {
        if new_items.is_empty() {
            return Ok(Vec::new());
        }
        let now = now_ms();

        // Existing items are only needed for kinds that dedup on a natural key.
        let existing = match kind {
            CollectionKind::Pantry | CollectionKind::Favorites => {
                self.list_items(kind, owner_id).await?
            }
            _ => Vec::new(),
        };

        let mut to_write: Vec<CollectionItem> = Vec::new();
        let mut ids = Vec::with_capacity(new_items.len());

        for new_item in new_items {
            let mut item = new_item.into_item(kind, new_doc_id(), owner_id.to_string(), now);

            if let Some(key) = natural_key(kind, &item) {
                if let Some(prev) = existing
                    .iter()
                    .find(|i| natural_key(kind, i).as_deref() == Some(key.as_str()))
                {
                    let mut merged = prev.clone();
                    merged.measure = item.measure.clone();
                    ids.push(merged.id.clone());
                    to_write.push(merged);
                    continue;
                }
                if let Some(prev) = to_write
                    .iter()
                    .find(|i| natural_key(kind, i).as_deref() == Some(key.as_str()))
                {
                    // Duplicate within the batch itself.
                    ids.push(prev.id.clone());
                    continue;
                }
                // Deterministic document id from the natural key, so a
                // concurrent insert of the same ingredient upserts one doc.
                let safe_key = urlencoding::encode(&key);
                item.id = format!("{}_{}", owner_id, safe_key);
            }

            ids.push(item.id.clone());
            to_write.push(item);
        }

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for item in &to_write {
            self.get_client()?
                .fluent()
                .update()
                .in_col(kind.as_str())
                .document_id(&item.id)
                .object(item)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add item to transaction: {}", e))
                })?;
        }

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(
            collection = kind.as_str(),
            owner_id,
            count = to_write.len(),
            "Items added"
        );

        Ok(ids)
    }

    /// Fetch a single item by id.
    pub async fn get_item(
        &self,
        kind: CollectionKind,
        item_id: &str,
    ) -> Result<Option<CollectionItem>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(kind.as_str())
            .obj()
            .one(item_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an item after verifying ownership.
    pub async fn remove_item(
        &self,
        kind: CollectionKind,
        owner_id: &str,
        item_id: &str,
    ) -> Result<(), AppError> {
        let item = self.get_item(kind, item_id).await?;
        match item {
            Some(item) if item.owner_id == owner_id => {}
            // Missing and not-owned are indistinguishable to the caller.
            _ => return Err(AppError::NotFound(format!("Item {} not found", item_id))),
        }

        self.get_client()?
            .fluent()
            .delete()
            .from(kind.as_str())
            .document_id(item_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Flip an item's checked flag inside a transaction.
    pub async fn toggle_item_checked(
        &self,
        kind: CollectionKind,
        owner_id: &str,
        item_id: &str,
    ) -> Result<(), AppError> {
        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let item = self.get_item(kind, item_id).await?;
        let mut item = match item {
            Some(item) if item.owner_id == owner_id => item,
            _ => {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!("Item {} not found", item_id)));
            }
        };

        item.checked = !item.checked;

        self.get_client()?
            .fluent()
            .update()
            .in_col(kind.as_str())
            .document_id(item_id)
            .object(&item)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add item to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;
        Ok(())
    }

    /// Delete every checked item in a collection. Returns the number deleted.
    pub async fn clear_checked(
        &self,
        kind: CollectionKind,
        owner_id: &str,
    ) -> Result<usize, AppError> {
        let owner = owner_id.to_string();
        let checked_items: Vec<CollectionItem> = self
            .get_client()?
            .fluent()
            .select()
            .from(kind.as_str())
            .filter(move |q| {
                q.for_all([
                    q.field("owner_id").eq(owner.clone()),
                    q.field("checked").eq(true),
                ])
            })
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let count = checked_items.len();
        self.batch_delete(&checked_items, kind.as_str(), |item: &CollectionItem| {
            item.id.clone()
        })
        .await?;

        tracing::debug!(collection = kind.as_str(), owner_id, count, "Cleared checked items");
        Ok(count)
    }

    /// Delete every item in a collection. Returns the number deleted.
    pub async fn clear_all(
        &self,
        kind: CollectionKind,
        owner_id: &str,
    ) -> Result<usize, AppError> {
        let items = self.list_items(kind, owner_id).await?;
        let count = items.len();
        self.batch_delete(&items, kind.as_str(), |item: &CollectionItem| {
            item.id.clone()
        })
        .await?;

        tracing::debug!(collection = kind.as_str(), owner_id, count, "Cleared collection");
        Ok(count)
    }

    /// Upsert pre-built items (migration path), with bounded concurrency.
    ///
    /// Document ids are the items' ids; deterministic ids make replays
    /// after a partial failure idempotent.
    pub async fn upsert_items(
        &self,
        kind: CollectionKind,
        records: &[CollectionItem],
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(records.to_vec())
            .map(|record| async move {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(kind.as_str())
                    .document_id(&record.id)
                    .object(&record)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }

    // ─── Purchase Operations ─────────────────────────────────────

    /// Get a purchase record by store transaction id.
    pub async fn get_purchase(
        &self,
        transaction_id: &str,
    ) -> Result<Option<PurchaseRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PURCHASES)
            .obj()
            .one(transaction_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a purchase record, keyed by transaction id.
    pub async fn upsert_purchase(&self, purchase: &PurchaseRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PURCHASES)
            .document_id(&purchase.transaction_id)
            .object(purchase)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Atomic Quota Increment ──────────────────────────────────

    /// Check-and-increment a metered feature counter in one transaction.
    ///
    /// Two concurrent requests cannot both pass the limit check: Firestore
    /// retries the transaction with fresh data on conflict.
    pub async fn increment_usage(
        &self,
        user_id: &str,
        feature: MeteredFeature,
    ) -> Result<QuotaStatus, AppError> {
        let now = now_ms();

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let user = self.get_user(user_id).await?;
        let mut user = match user {
            Some(user) => user,
            None => {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!("User {} not found", user_id)));
            }
        };

        let status = match quota::apply_increment(&mut user, feature, now) {
            Ok(status) => status,
            Err(err) => {
                // Over limit or not entitled: nothing to write.
                let _ = transaction.rollback().await;
                return Err(err);
            }
        };

        user.updated_at = now;
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add user to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::debug!(
            user_id,
            feature = feature.as_str(),
            remaining = status.remaining,
            "Usage incremented"
        );

        Ok(status)
    }

    // ─── Country Unlock Ledger ───────────────────────────────────

    /// Add a country to the user's unlock set.
    ///
    /// Returns `true` if newly unlocked, `false` if it was already present
    /// (repeat reward callbacks are a no-op).
    pub async fn unlock_country(
        &self,
        user_id: &str,
        country: &str,
    ) -> Result<bool, AppError> {
        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        let user = self.get_user(user_id).await?;
        let mut user = match user {
            Some(user) => user,
            None => {
                let _ = transaction.rollback().await;
                return Err(AppError::NotFound(format!("User {} not found", user_id)));
            }
        };

        if user.unlocked_countries.contains(country) {
            tracing::debug!(user_id, country, "Country already unlocked (idempotent skip)");
            let _ = transaction.rollback().await;
            return Ok(false);
        }

        user.unlocked_countries.insert(country.to_string());
        user.updated_at = now_ms();

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(&user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add user to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(user_id, country, "Country unlocked");
        Ok(true)
    }

    // ─── Billing Event Application ───────────────────────────────

    /// Apply an inbound billing event: dedup against the audit log, run the
    /// reconciler, and commit the user patch plus the audit record together.
    pub async fn apply_billing_event(
        &self,
        event: &BillingEvent,
    ) -> Result<EventDisposition, AppError> {
        let now = now_ms();

        // 1. Dedup: an already-logged event id is a no-op under
        //    at-least-once delivery.
        let logged: Option<WebhookAuditRecord> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::WEBHOOK_EVENTS)
            .obj()
            .one(&event.id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if logged.is_some() {
            tracing::info!(event_id = %event.id, "Billing event already processed (idempotent skip)");
            return Ok(EventDisposition::Duplicate);
        }

        // 2. Resolve the user. An unresolvable user is dropped, not retried:
        //    the billing provider owns redelivery.
        let user = match self.get_user(&event.app_user_id).await? {
            Some(user) => user,
            None => {
                tracing::warn!(
                    event_id = %event.id,
                    app_user_id = %event.app_user_id,
                    "Billing event for unknown user"
                );
                return Ok(EventDisposition::UnknownUser);
            }
        };

        // 3. Evaluate the pure state machine, then commit the patch and the
        //    audit record atomically.
        let outcome = reconciler::apply_event(&user, event, now);

        let mut updated = user.clone();
        let mut changed = false;

        if let Some(customer_id) = reconciler::link_customer_id(&user, event) {
            updated.revenuecat_customer_id = Some(customer_id);
            changed = true;
        }

        if let Outcome::Applied(ref patch) = outcome {
            updated.tier = patch.tier;
            updated.subscription_type = patch.subscription_type;
            updated.subscription_end_date = Some(patch.subscription_end_date);
            if updated.subscription_start_date.is_none() {
                updated.subscription_start_date = Some(now);
            }
            changed = true;
        } else if let Outcome::Downgraded = outcome {
            updated.tier = crate::models::Tier::Free;
            updated.subscription_type = crate::models::SubscriptionType::Free;
            changed = true;
        }

        let audit = WebhookAuditRecord {
            event_id: event.id.clone(),
            user_id: user.id.clone(),
            event_type: event.kind.as_str().to_string(),
            product_id: event.product_id.clone(),
            outcome: outcome.label().to_string(),
            received_at: now,
        };

        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        if changed {
            updated.updated_at = now;
            self.get_client()?
                .fluent()
                .update()
                .in_col(collections::USERS)
                .document_id(&updated.id)
                .object(&updated)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add user to transaction: {}", e))
                })?;
        }

        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::WEBHOOK_EVENTS)
            .document_id(&audit.event_id)
            .object(&audit)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add audit record to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            event_id = %event.id,
            user_id = %user.id,
            event_type = event.kind.as_str(),
            outcome = outcome.label(),
            "Billing event processed"
        );

        Ok(EventDisposition::Processed {
            outcome: outcome.label(),
        })
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}
