// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Generic mutable-collection items (shopping list, pantry, favorites,
//! recipe history).
//!
//! One item shape serves all four collections; which payload fields are
//! populated and which natural key (if any) dedups inserts varies per
//! [`CollectionKind`].

use serde::{Deserialize, Serialize};

/// The four user-mutable collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    ShoppingList,
    Pantry,
    Favorites,
    RecipeHistory,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 4] = [
        CollectionKind::ShoppingList,
        CollectionKind::Pantry,
        CollectionKind::Favorites,
        CollectionKind::RecipeHistory,
    ];

    /// Firestore collection name / route path segment.
    pub fn as_str(self) -> &'static str {
        match self {
            CollectionKind::ShoppingList => "shopping_list",
            CollectionKind::Pantry => "pantry",
            CollectionKind::Favorites => "favorites",
            CollectionKind::RecipeHistory => "recipe_history",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "shopping_list" => Some(CollectionKind::ShoppingList),
            "pantry" => Some(CollectionKind::Pantry),
            "favorites" => Some(CollectionKind::Favorites),
            "recipe_history" => Some(CollectionKind::RecipeHistory),
            _ => None,
        }
    }

    /// Only the shopping list tracks a checked flag.
    pub fn tracks_checked(self) -> bool {
        matches!(self, CollectionKind::ShoppingList)
    }
}

/// A single collection item.
///
/// `owner_id` is a user id in the remote store and a guest id in the local
/// store — never both at once; migration transfers ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: String,
    pub owner_id: String,
    /// Normalized (lowercased) for pantry items
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub measure: Option<String>,
    #[serde(default)]
    pub recipe_id: Option<String>,
    #[serde(default)]
    pub recipe_name: Option<String>,
    #[serde(default)]
    pub checked: bool,
    pub added_at: i64,
}

/// Caller-supplied payload for an insert; id/owner/timestamps are assigned
/// by the owning store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCollectionItem {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub measure: Option<String>,
    #[serde(default)]
    pub recipe_id: Option<String>,
    #[serde(default)]
    pub recipe_name: Option<String>,
}

impl NewCollectionItem {
    /// Materialize an item for a store, normalizing the name for kinds
    /// that dedup on it.
    pub fn into_item(self, kind: CollectionKind, id: String, owner_id: String, now: i64) -> CollectionItem {
        let name = match kind {
            CollectionKind::Pantry => self.name.trim().to_lowercase(),
            _ => self.name,
        };
        CollectionItem {
            id,
            owner_id,
            name,
            display_name: self.display_name,
            measure: self.measure,
            recipe_id: self.recipe_id,
            recipe_name: self.recipe_name,
            checked: false,
            added_at: now,
        }
    }
}

/// Natural key used by the remote store to dedup inserts, where one exists.
pub fn natural_key(kind: CollectionKind, item: &CollectionItem) -> Option<String> {
    match kind {
        CollectionKind::Pantry => Some(item.name.trim().to_lowercase()),
        CollectionKind::Favorites => item.recipe_id.clone(),
        CollectionKind::ShoppingList | CollectionKind::RecipeHistory => None,
    }
}
