// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for clock access and timestamp formatting.
//!
//! The billing provider and the mobile client both speak epoch
//! milliseconds, so that is the canonical timestamp unit everywhere.

use chrono::{DateTime, SecondsFormat, Utc};

pub const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Current time as epoch milliseconds.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}
