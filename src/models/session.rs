// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Opaque session tokens backed by Firestore.
//!
//! The raw token is handed to the client once; the server stores only a
//! SHA-256 digest (the document ID), so a database read never exposes a
//! usable credential. Sessions expire by TTL and are re-issued at login,
//! never refreshed in place.

use serde::{Deserialize, Serialize};

/// Session record stored under document id `sha256_hex(token)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Digest of the opaque token (duplicated from the document ID for queries)
    pub token_digest: String,
    pub user_id: String,
    /// Epoch ms; valid iff `now <= expires_at`
    pub expires_at: i64,
    pub created_at: i64,
}

impl Session {
    pub fn is_valid(&self, now_ms: i64) -> bool {
        now_ms <= self.expires_at
    }
}
