// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Collection CRUD routes backed by the unified facade.
//!
//! These routes are not behind the auth middleware: the facade serves
//! guests (via the `X-Guest-Id` header) and authenticated users alike, and
//! the backing store is chosen per call from whatever credentials the
//! request carries.

use crate::error::{AppError, Result};
use crate::middleware::auth::resolve_scope;
use crate::models::{CollectionItem, CollectionKind, NewCollectionItem};
use crate::services::Listing;
use crate::AppState;
use axum::{
    extract::{Json, Path, State},
    http::HeaderMap,
    routing::{delete, get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/collections/{kind}",
            get(list).post(add).delete(clear_all),
        )
        .route("/api/collections/{kind}/batch", post(add_many))
        .route("/api/collections/{kind}/clear-checked", post(clear_checked))
        .route("/api/collections/{kind}/{id}", delete(remove))
        .route("/api/collections/{kind}/{id}/toggle", post(toggle_checked))
}

fn parse_kind(raw: &str) -> Result<CollectionKind> {
    CollectionKind::from_str(raw)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown collection: {}", raw)))
}

/// One collection item as the client sees it.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/lib/generated/")
)]
pub struct ItemResponse {
    pub id: String,
    pub name: String,
    pub display_name: Option<String>,
    pub measure: Option<String>,
    pub recipe_id: Option<String>,
    pub recipe_name: Option<String>,
    pub checked: bool,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub added_at: i64,
}

impl From<CollectionItem> for ItemResponse {
    fn from(item: CollectionItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            display_name: item.display_name,
            measure: item.measure,
            recipe_id: item.recipe_id,
            recipe_name: item.recipe_name,
            checked: item.checked,
            added_at: item.added_at,
        }
    }
}

/// `status` is "loading" (remote state not yet knowable — distinct from an
/// empty list) or "ready" with items present.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/lib/generated/")
)]
pub struct ListResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemResponse>>,
}

async fn list(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<ListResponse>> {
    let kind = parse_kind(&kind)?;
    let scope = resolve_scope(&state, &jar, &headers).await?;

    let response = match state.facade.list(&scope, kind).await? {
        Listing::Loading => ListResponse {
            status: "loading".to_string(),
            items: None,
        },
        Listing::Ready(items) => ListResponse {
            status: "ready".to_string(),
            items: Some(items.into_iter().map(ItemResponse::from).collect()),
        },
    };
    Ok(Json(response))
}

#[derive(Serialize)]
pub struct AddResponse {
    pub id: String,
}

async fn add(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(item): Json<NewCollectionItem>,
) -> Result<Json<AddResponse>> {
    let kind = parse_kind(&kind)?;
    let scope = resolve_scope(&state, &jar, &headers).await?;

    if item.name.trim().is_empty() {
        return Err(AppError::BadRequest("Item name must not be empty".to_string()));
    }

    let id = state.facade.add(&scope, kind, item).await?;
    Ok(Json(AddResponse { id }))
}

#[derive(Deserialize)]
pub struct AddManyRequest {
    items: Vec<NewCollectionItem>,
}

#[derive(Serialize)]
pub struct AddManyResponse {
    pub ids: Vec<String>,
}

/// Batch insert; for authenticated users the batch is atomic (all the
/// ingredients of a recipe land together or not at all).
async fn add_many(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(payload): Json<AddManyRequest>,
) -> Result<Json<AddManyResponse>> {
    let kind = parse_kind(&kind)?;
    let scope = resolve_scope(&state, &jar, &headers).await?;

    if payload.items.iter().any(|i| i.name.trim().is_empty()) {
        return Err(AppError::BadRequest("Item name must not be empty".to_string()));
    }

    let ids = state.facade.add_many(&scope, kind, payload.items).await?;
    Ok(Json(AddManyResponse { ids }))
}

#[derive(Serialize)]
pub struct MutationResponse {
    pub success: bool,
}

async fn remove(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<MutationResponse>> {
    let kind = parse_kind(&kind)?;
    let scope = resolve_scope(&state, &jar, &headers).await?;

    state.facade.remove(&scope, kind, &id).await?;
    Ok(Json(MutationResponse { success: true }))
}

async fn toggle_checked(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<MutationResponse>> {
    let kind = parse_kind(&kind)?;
    let scope = resolve_scope(&state, &jar, &headers).await?;

    state.facade.toggle_checked(&scope, kind, &id).await?;
    Ok(Json(MutationResponse { success: true }))
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

async fn clear_checked(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<ClearResponse>> {
    let kind = parse_kind(&kind)?;
    let scope = resolve_scope(&state, &jar, &headers).await?;

    let removed = state.facade.clear_checked(&scope, kind).await?;
    Ok(Json(ClearResponse { removed }))
}

async fn clear_all(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Json<ClearResponse>> {
    let kind = parse_kind(&kind)?;
    let scope = resolve_scope(&state, &jar, &headers).await?;

    let removed = state.facade.clear_all(&scope, kind).await?;
    Ok(Json(ClearResponse { removed }))
}
