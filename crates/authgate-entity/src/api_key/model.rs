//! API key entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An issued API key with its rate and monthly request ceilings.
///
/// Rows are owned by the key management flow; quota accounting only reads
/// them and flips `is_monthly_request_limit_reached`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    /// Unique key identifier.
    pub id: Uuid,
    /// Public key value presented by clients; usage rows reference it.
    pub app_id: String,
    /// Requests per second allowed for the key.
    pub rps_limit: i32,
    /// Requests allowed per calendar month (`0` = unlimited).
    pub monthly_request_limit: i64,
    /// Whether the current month's usage reached the monthly limit.
    pub is_monthly_request_limit_reached: bool,
    /// When the key was created.
    pub created_at: DateTime<Utc>,
    /// When the key was last updated.
    pub updated_at: DateTime<Utc>,
}
