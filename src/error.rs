// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// No session on an operation that needs one (and no guest identity).
    #[error("Authentication required")]
    Unauthenticated,

    /// A token was presented but its session has expired.
    #[error("Session expired")]
    StaleSession,

    /// Metered feature over its limit for the current period.
    #[error("Quota exceeded for {feature}: {limit} per day")]
    QuotaExceeded { feature: &'static str, limit: u32 },

    /// The tier lacks the entitlement for this feature.
    #[error("Upgrade required for {0}")]
    UpgradeRequired(&'static str),

    /// A migration for this guest is already running.
    #[error("Migration already in progress")]
    MigrationInProgress,

    /// Migration failed mid-copy; the guest profile is retained for retry.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Webhook payload missing required fields or naming an unknown user.
    #[error("Invalid webhook event: {0}")]
    InvalidWebhookEvent(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated", None),
            AppError::StaleSession => (StatusCode::UNAUTHORIZED, "stale_session", None),
            AppError::QuotaExceeded { feature, limit } => (
                StatusCode::TOO_MANY_REQUESTS,
                "quota_exceeded",
                Some(format!("{}: {} per day", feature, limit)),
            ),
            AppError::UpgradeRequired(feature) => (
                StatusCode::FORBIDDEN,
                "upgrade_required",
                Some((*feature).to_string()),
            ),
            AppError::MigrationInProgress => {
                (StatusCode::CONFLICT, "migration_in_progress", None)
            }
            AppError::MigrationFailed(msg) => {
                tracing::error!(error = %msg, "Guest migration failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "migration_failed",
                    Some(msg.clone()),
                )
            }
            AppError::InvalidWebhookEvent(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_webhook_event",
                Some(msg.clone()),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
