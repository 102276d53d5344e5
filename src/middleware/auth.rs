// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication.
//!
//! Tokens are opaque random strings; the server stores only their SHA-256
//! digest. Validity is re-checked against the sessions collection on every
//! call — there is no cached "is valid" flag, so the staleness window is
//! bounded by the session TTL alone.

use crate::error::AppError;
use crate::services::Scope;
use crate::time_utils::now_ms;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Cookie carrying the session token.
pub const SESSION_COOKIE: &str = "tastetrek_token";

/// Header carrying the anonymous device identity for unauthenticated calls.
pub const GUEST_ID_HEADER: &str = "x-guest-id";

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const CREDENTIAL_LEN: usize = 32;

/// Authenticated user extracted from a validated session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: String,
}

/// Pull the session token from the cookie, falling back to a Bearer header.
pub fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.to_string())
}

/// Validate a raw token against the sessions collection.
///
/// Unknown tokens are `Unauthenticated`; a known-but-expired session is
/// `StaleSession` so clients can tell re-login apart from a bad request.
pub async fn validate_session(state: &AppState, token: &str) -> Result<String, AppError> {
    let session = state
        .db
        .get_session(&digest_token(token))
        .await?
        .ok_or(AppError::Unauthenticated)?;

    if !session.is_valid(now_ms()) {
        return Err(AppError::StaleSession);
    }

    Ok(session.user_id)
}

/// Resolve the caller's scope, re-evaluated per call so sign-in and
/// sign-out are observed on the next operation.
///
/// A presented token must validate — an expired session is an error, never
/// a silent fall-back to the guest store. Without a token, the guest
/// header names the local scope.
pub async fn resolve_scope(
    state: &AppState,
    jar: &CookieJar,
    headers: &HeaderMap,
) -> Result<Scope, AppError> {
    if let Some(token) = extract_token(jar, headers) {
        let user_id = validate_session(state, &token).await?;
        return Ok(Scope::User(user_id));
    }

    headers
        .get(GUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| Scope::Guest(s.to_string()))
        .ok_or(AppError::Unauthenticated)
}

/// Middleware that requires a valid session.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token =
        extract_token(&jar, request.headers()).ok_or(AppError::Unauthenticated)?;
    let user_id = validate_session(&state, &token).await?;

    request.extensions_mut().insert(CurrentUser { user_id });
    Ok(next.run(request).await)
}

// ─── Token & Credential Crypto ───────────────────────────────────

/// Generate an opaque 32-byte session token, hex-encoded.
pub fn generate_token() -> String {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes).expect("system RNG unavailable");
    hex::encode(bytes)
}

/// SHA-256 digest of a token, hex-encoded. Used as the session document id
/// so a database read never exposes a usable credential.
pub fn digest_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Hash a password with PBKDF2-HMAC-SHA256 and a random salt.
///
/// Stored form: `hex(salt)$hex(hash)`.
pub fn hash_password(password: &str) -> String {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).expect("system RNG unavailable");

    let mut hash = [0u8; CREDENTIAL_LEN];
    ring::pbkdf2::derive(
        ring::pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(PBKDF2_ITERATIONS).expect("iterations are nonzero"),
        &salt,
        password.as_bytes(),
        &mut hash,
    );

    format!("{}${}", hex::encode(salt), hex::encode(hash))
}

/// Verify a password against its stored hash (constant-time inside ring).
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };

    ring::pbkdf2::verify(
        ring::pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(PBKDF2_ITERATIONS).expect("iterations are nonzero"),
        &salt,
        password.as_bytes(),
        &hash,
    )
    .is_ok()
}
