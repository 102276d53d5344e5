// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Email/password authentication routes.
//!
//! Sign-up and sign-in issue a fresh opaque session token (cookie + body)
//! and, when the client presents a guest id, run guest migration inline so
//! the account's collections are complete before the first facade read.

use crate::error::{AppError, Result};
use crate::middleware::auth::{digest_token, generate_token, hash_password, verify_password, SESSION_COOKIE};
use crate::models::{Session, User};
use crate::time_utils::{now_ms, MS_PER_DAY};
use crate::AppState;
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const SESSION_TTL_DAYS: i64 = 30;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/signout", post(sign_out))
}

#[derive(Deserialize, Validate)]
pub struct SignUpRequest {
    #[validate(email)]
    email: String,
    #[validate(length(min = 8))]
    password: String,
    name: Option<String>,
    /// Device guest identity to migrate into the new account
    guest_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SignInRequest {
    email: String,
    password: String,
    guest_id: Option<String>,
}

/// Public view of a user.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: Option<String>,
    pub tier: String,
    pub subscription_type: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub subscription_end_date: Option<i64>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
            tier: user.tier.as_str().to_string(),
            subscription_type: user.subscription_type.as_str().to_string(),
            subscription_end_date: user.subscription_end_date,
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/lib/generated/")
)]
pub struct AuthResponse {
    pub token: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub expires_at: i64,
    pub user: UserResponse,
    /// True when a guest id was supplied but its migration did not
    /// complete; the client should retry via /api/guest/migrate.
    pub migration_pending: bool,
}

/// Create a new account, migrating any guest state the device accumulated.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<SignUpRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    payload
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let email = payload.email.trim().to_lowercase();
    if state.db.get_user_by_email(&email).await?.is_some() {
        return Err(AppError::BadRequest("Email already registered".to_string()));
    }

    let now = now_ms();
    let user = User::new(
        crate::db::new_doc_id(),
        email,
        hash_password(&payload.password),
        payload.name,
        now,
    );
    state.db.upsert_user(&user).await?;
    tracing::info!(user_id = %user.id, "User created");

    finish_login(&state, jar, user, payload.guest_id).await
}

/// Sign in, re-issuing a session (never refreshing one in place).
async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<SignInRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let email = payload.email.trim().to_lowercase();
    let user = state
        .db
        .get_user_by_email(&email)
        .await?
        .filter(|user| verify_password(&payload.password, &user.password_hash))
        .ok_or(AppError::Unauthenticated)?;

    finish_login(&state, jar, user, payload.guest_id).await
}

/// Issue the session, set the cookie, and run inline guest migration.
async fn finish_login(
    state: &AppState,
    jar: CookieJar,
    user: User,
    guest_id: Option<String>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let now = now_ms();
    let token = generate_token();
    let session = Session {
        token_digest: digest_token(&token),
        user_id: user.id.clone(),
        expires_at: now + SESSION_TTL_DAYS * MS_PER_DAY,
        created_at: now,
    };
    state.db.create_session(&session).await?;

    // Inline migration: a failure leaves the guest profile intact and only
    // flags the response; the login itself has already succeeded.
    let mut migration_pending = false;
    if let Some(guest_id) = guest_id {
        match state.guests.migrate(&guest_id, &user.id).await {
            Ok(summary) => {
                tracing::debug!(
                    user_id = %user.id,
                    items = summary.items_copied,
                    "Inline guest migration done"
                );
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Inline guest migration incomplete");
                migration_pending = true;
            }
        }
    }

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(SESSION_TTL_DAYS))
        .build();

    let response = AuthResponse {
        token,
        expires_at: session.expires_at,
        user: UserResponse::from(&user),
        migration_pending,
    };

    Ok((jar.add(cookie), Json(response)))
}

#[derive(Serialize)]
pub struct SignOutResponse {
    pub success: bool,
}

/// Delete the session named by the presented token.
async fn sign_out(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: axum::http::HeaderMap,
) -> Result<(CookieJar, Json<SignOutResponse>)> {
    if let Some(token) = crate::middleware::auth::extract_token(&jar, &headers) {
        state.db.delete_session(&digest_token(&token)).await?;
    }

    Ok((
        jar.remove(Cookie::from(SESSION_COOKIE)),
        Json(SignOutResponse { success: true }),
    ))
}
