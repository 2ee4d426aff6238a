//! Monthly API key usage counter.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Request counter for one API key in one calendar month.
///
/// Exactly one row exists per `(api_key, creation_month)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKeyUsage {
    /// The key's public value.
    pub api_key: String,
    /// Requests recorded this month.
    pub request_count: i64,
    /// First day of the month the counter belongs to.
    pub creation_month: NaiveDate,
    /// When the row was first written.
    pub created_at: DateTime<Utc>,
}

/// Truncate a date to the first day of its month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}
